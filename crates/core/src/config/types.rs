use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication for maintenance endpoints (`/retain`, `/workflow`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared secret, required when method = "secret".
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    Secret,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("prpkg.db")
}

/// Publish pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    /// Payload ceiling for repositories not on the whitelist.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u64,
    /// Plain-text allow-list of `owner/repo` lines exempt from the ceiling.
    #[serde(default)]
    pub whitelist_path: Option<PathBuf>,
    /// How long a loaded whitelist is trusted before the file is re-read.
    #[serde(default = "default_whitelist_ttl")]
    pub whitelist_ttl_secs: u64,
    /// Prefix for public URLs in publish responses. Empty means relative URLs.
    #[serde(default)]
    pub public_url: String,
    /// Form target of generated template launch documents.
    #[serde(default = "default_template_launch_url")]
    pub template_launch_url: String,
    /// Timeout for each notifier call made while publishing.
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            whitelist_path: None,
            whitelist_ttl_secs: default_whitelist_ttl(),
            public_url: String::new(),
            template_launch_url: default_template_launch_url(),
            notify_timeout_secs: default_notify_timeout(),
        }
    }
}

fn default_max_payload_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_whitelist_ttl() -> u64 {
    3600
}

fn default_template_launch_url() -> String {
    "https://stackblitz.com/run".to_string()
}

fn default_notify_timeout() -> u64 {
    10
}

/// Retention sweep configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Objects older than this are deleted unconditionally.
    #[serde(default = "default_hard_expiry_months")]
    pub hard_expiry_months: u32,
    /// Objects older than this that were not downloaded within the same window are deleted.
    #[serde(default = "default_idle_months")]
    pub idle_months: u32,
    /// Pages walked by the incremental sweep queued after each publish.
    #[serde(default = "default_incremental_pages")]
    pub incremental_pages: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            hard_expiry_months: default_hard_expiry_months(),
            idle_months: default_idle_months(),
            incremental_pages: default_incremental_pages(),
        }
    }
}

fn default_page_size() -> u32 {
    500
}

fn default_hard_expiry_months() -> u32 {
    6
}

fn default_idle_months() -> u32 {
    1
}

fn default_incremental_pages() -> u32 {
    1
}

/// npm registry configuration (compact URL resolution)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            timeout_secs: default_registry_timeout(),
        }
    }
}

fn default_registry_url() -> String {
    "https://registry.npmjs.org".to_string()
}

fn default_registry_timeout() -> u64 {
    5
}

/// Source-hosting API configuration (check runs and PR comments)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub token: String,
    /// Login of the account that authors comments, used to find prior comments.
    pub bot_login: String,
    #[serde(default = "default_notifier_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_notifier_timeout() -> u64 {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub publish: PublishConfig,
    pub retention: RetentionConfig,
    pub registry: RegistryConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifier: Option<SanitizedNotifierConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub secret_configured: bool,
}

/// Sanitized notifier config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifierConfig {
    pub api_url: String,
    pub bot_login: String,
    pub token_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::Secret => "secret".to_string(),
                },
                secret_configured: config
                    .auth
                    .secret
                    .as_deref()
                    .is_some_and(|s| !s.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            publish: config.publish.clone(),
            retention: config.retention.clone(),
            registry: config.registry.clone(),
            notifier: config.notifier.as_ref().map(|n| SanitizedNotifierConfig {
                api_url: n.api_url.clone(),
                bot_login: n.bot_login.clone(),
                token_configured: !n.token.is_empty(),
                timeout_secs: n.timeout_secs,
            }),
        }
    }
}
