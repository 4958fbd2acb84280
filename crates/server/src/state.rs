use std::sync::Arc;
use std::time::Duration;

use prpkg_core::{
    ArtifactStore, Authenticator, BackgroundHandle, Config, CursorStore, DownloadIndex, Notifier,
    PackageRegistry, PublishService, PublishSettings, ResolverService, RetentionManager,
    SanitizedConfig, Whitelist, WorkflowRegistry,
};

/// Persistent namespaces shared by the services.
#[derive(Clone)]
pub struct Stores {
    pub workflows: Arc<dyn WorkflowRegistry>,
    pub cursors: Arc<dyn CursorStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub downloads: Arc<dyn DownloadIndex>,
}

/// External collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn PackageRegistry>,
    /// `None` when `[notifier]` is not configured.
    pub notifier: Option<Arc<dyn Notifier>>,
    pub whitelist: Arc<dyn Whitelist>,
}

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    stores: Stores,
    resolver: ResolverService,
    publisher: PublishService,
    retention: Arc<RetentionManager>,
    background: BackgroundHandle,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        stores: Stores,
        collaborators: Collaborators,
        retention: Arc<RetentionManager>,
        background: BackgroundHandle,
    ) -> Self {
        let resolver = ResolverService::new(
            Arc::clone(&stores.cursors),
            Arc::clone(&stores.artifacts),
            collaborators.registry,
            background.clone(),
            Duration::from_secs(config.registry.timeout_secs),
        );
        let publisher = PublishService::new(
            Arc::clone(&stores.workflows),
            Arc::clone(&stores.cursors),
            Arc::clone(&stores.artifacts),
            collaborators.whitelist,
            collaborators.notifier,
            background.clone(),
            PublishSettings::from(&config.publish),
        );

        Self {
            config,
            authenticator,
            stores,
            resolver,
            publisher,
            retention,
            background,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn workflows(&self) -> &dyn WorkflowRegistry {
        self.stores.workflows.as_ref()
    }

    pub fn artifacts(&self) -> &dyn ArtifactStore {
        self.stores.artifacts.as_ref()
    }

    pub fn resolver(&self) -> &ResolverService {
        &self.resolver
    }

    pub fn publisher(&self) -> &PublishService {
        &self.publisher
    }

    pub fn retention(&self) -> Arc<RetentionManager> {
        Arc::clone(&self.retention)
    }

    pub fn background(&self) -> &BackgroundHandle {
        &self.background
    }
}
