pub mod artifact;
pub mod auth;
pub mod background;
pub mod config;
pub mod cursor;
pub mod download;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod publish;
pub mod registry;
pub mod resolver;
pub mod retention;
pub mod testing;
pub mod whitelist;
pub mod workflow;

/// How long a store waits on a locked database file shared with other stores.
pub(crate) const SQLITE_BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

pub use artifact::{
    ArtifactError, ArtifactMeta, ArtifactStore, CommitPrefix, PackageKey, SqliteArtifactStore,
    TemplateKey,
};
pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, NoneAuthenticator,
};
pub use background::{create_background_system, BackgroundHandle, BackgroundJob, BackgroundWorker};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, DatabaseConfig, NotifierConfig, PublishConfig, RegistryConfig, RetentionConfig,
    SanitizedConfig, ServerConfig,
};
pub use cursor::{Cursor, CursorError, CursorStore, SqliteCursorStore};
pub use download::{DownloadError, DownloadIndex, SqliteDownloadIndex};
pub use error::{ServiceError, ServiceResult};
pub use notifier::{CommentPolicy, GithubNotifier, Notifier, NotifierError, PresentationFlags};
pub use publish::{PublishRequest, PublishResponse, PublishService, PublishSettings};
pub use registry::{NpmRegistryClient, PackageRegistry, RegistryError};
pub use resolver::{Resolution, ResolvedArtifact, ResolverService};
pub use retention::{RetentionManager, SweepOptions, SweepReport};
pub use whitelist::{AllowList, FileWhitelist, Whitelist};
pub use workflow::{
    RegisterWorkflowRequest, SqliteWorkflowRegistry, WorkflowError, WorkflowRegistry,
    WorkflowTicket,
};
