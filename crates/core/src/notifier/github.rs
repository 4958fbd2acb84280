//! GitHub REST notifier: check runs on the commit and a comment on the pull request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{CheckRun, Comment, Notifier, NotifierError, PublishSummary};
use crate::config::NotifierConfig;

/// Name of the check run created on published commits.
pub const CHECK_NAME: &str = "prpkg";

pub struct GithubNotifier {
    client: Client,
    api_url: String,
    token: String,
    bot_login: String,
}

impl GithubNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self, NotifierError> {
        let client = Client::builder()
            .user_agent(concat!("prpkg/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            bot_login: config.bot_login.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .header("x-github-api-version", "2022-11-28")
    }

    /// Send and map non-success statuses. 404 becomes `NotFound`.
    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, NotifierError> {
        let response = self.authorized(builder).send().await?;
        let status = response.status();
        if status == 404 {
            return Err(NotifierError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, NotifierError> {
        response
            .json()
            .await
            .map_err(|e| NotifierError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CheckRunResponse {
    id: u64,
    head_sha: String,
}

#[derive(Debug, Deserialize)]
struct CheckRunList {
    check_runs: Vec<CheckRunResponse>,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    state: String,
}

#[derive(Debug, Deserialize)]
struct CommentUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    id: u64,
    user: CommentUser,
}

impl From<CheckRunResponse> for CheckRun {
    fn from(r: CheckRunResponse) -> Self {
        CheckRun {
            id: r.id,
            commit: r.head_sha,
        }
    }
}

impl From<CommentResponse> for Comment {
    fn from(r: CommentResponse) -> Self {
        Comment {
            id: r.id,
            author: r.user.login,
        }
    }
}

/// Markdown listing of the published packages and templates.
pub fn render_summary(summary: &PublishSummary) -> String {
    let short = summary.commit.chars().take(7).collect::<String>();
    let mut body = format!("Packages published for commit `{short}`\n");

    for package in &summary.packages {
        body.push_str(&format!("\n```\nnpm i {}\n```\n", package.url));
    }
    if !summary.templates.is_empty() {
        body.push('\n');
        for template in &summary.templates {
            body.push_str(&format!("- [{}]({})\n", template.name, template.url));
        }
    }
    body
}

#[async_trait]
impl Notifier for GithubNotifier {
    async fn installation_exists(&self, owner: &str, repo: &str) -> Result<bool, NotifierError> {
        let request = self
            .client
            .get(self.url(&format!("/repos/{owner}/{repo}/installation")));
        match self.send(request, "installation").await {
            Ok(_) => Ok(true),
            Err(NotifierError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find_check(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
    ) -> Result<Option<CheckRun>, NotifierError> {
        let request = self
            .client
            .get(self.url(&format!("/repos/{owner}/{repo}/commits/{commit}/check-runs")))
            .query(&[("check_name", CHECK_NAME)]);
        let list: CheckRunList = Self::parse(self.send(request, "check runs").await?).await?;
        Ok(list.check_runs.into_iter().next().map(CheckRun::from))
    }

    async fn create_check(&self, summary: &PublishSummary) -> Result<CheckRun, NotifierError> {
        debug!(
            "Creating check run for {}/{}@{}",
            summary.owner, summary.repo, summary.commit
        );
        let request = self
            .client
            .post(self.url(&format!(
                "/repos/{}/{}/check-runs",
                summary.owner, summary.repo
            )))
            .json(&json!({
                "name": CHECK_NAME,
                "head_sha": summary.commit,
                "status": "completed",
                "conclusion": "success",
                "output": {
                    "title": format!("{} package(s) published", summary.packages.len()),
                    "summary": render_summary(summary),
                },
            }));
        let created: CheckRunResponse = Self::parse(self.send(request, "check run").await?).await?;
        Ok(created.into())
    }

    async fn pull_request_open(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<bool, NotifierError> {
        let request = self
            .client
            .get(self.url(&format!("/repos/{owner}/{repo}/pulls/{number}")));
        match self.send(request, "pull request").await {
            Ok(response) => {
                let pr: PullRequestResponse = Self::parse(response).await?;
                Ok(pr.state == "open")
            }
            Err(NotifierError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find_bot_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Option<Comment>, NotifierError> {
        let request = self
            .client
            .get(self.url(&format!("/repos/{owner}/{repo}/issues/{number}/comments")))
            .query(&[("per_page", "100")]);
        let comments: Vec<CommentResponse> =
            Self::parse(self.send(request, "comments").await?).await?;
        Ok(comments
            .into_iter()
            .find(|c| c.user.login.eq_ignore_ascii_case(&self.bot_login))
            .map(Comment::from))
    }

    async fn create_comment(
        &self,
        number: u64,
        summary: &PublishSummary,
    ) -> Result<Comment, NotifierError> {
        let request = self
            .client
            .post(self.url(&format!(
                "/repos/{}/{}/issues/{number}/comments",
                summary.owner, summary.repo
            )))
            .json(&json!({ "body": render_summary(summary) }));
        let created: CommentResponse = Self::parse(self.send(request, "comment").await?).await?;
        Ok(created.into())
    }

    async fn update_comment(
        &self,
        comment_id: u64,
        summary: &PublishSummary,
    ) -> Result<Comment, NotifierError> {
        let request = self
            .client
            .patch(self.url(&format!(
                "/repos/{}/{}/issues/comments/{comment_id}",
                summary.owner, summary.repo
            )))
            .json(&json!({ "body": render_summary(summary) }));
        let updated: CommentResponse = Self::parse(self.send(request, "comment").await?).await?;
        Ok(updated.into())
    }
}
