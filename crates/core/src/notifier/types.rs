use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What to do with the pull request comment after a publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentPolicy {
    /// Never comment.
    Off,
    /// Append a new comment on every publish.
    Create,
    /// Edit the single existing bot comment, creating it if absent.
    #[default]
    Update,
}

impl FromStr for CommentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "false" => Ok(CommentPolicy::Off),
            "create" => Ok(CommentPolicy::Create),
            "update" | "" => Ok(CommentPolicy::Update),
            other => Err(format!("unknown comment policy: {other}")),
        }
    }
}

/// Presentation flags supplied by the publishing client.
///
/// Only `comment` is interpreted here; the rest is handed to the notifier untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresentationFlags {
    pub comment: CommentPolicy,
    pub compact: bool,
    pub bin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedPackage {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedTemplate {
    pub name: String,
    pub url: String,
}

/// Everything a notifier needs to describe a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub owner: String,
    pub repo: String,
    pub commit: String,
    pub git_ref: String,
    pub packages: Vec<PublishedPackage>,
    pub templates: Vec<PublishedTemplate>,
    pub flags: PresentationFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRun {
    pub id: u64,
    pub commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: u64,
    pub author: String,
}
