use std::sync::Arc;

use steadydancer_core::layout::DataLayout;
use steadydancer_core::paths::PathResolver;
use steadydancer_queue::TaskQueue;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable; all infrastructure is passed in explicitly so tests
/// can construct the state with temp directories and a scripted queue.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: steadydancer_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// On-disk layout under the configured data root.
    pub layout: Arc<DataLayout>,
    /// Resolver for user-supplied path strings.
    pub resolver: Arc<PathResolver>,
    /// External task queue client.
    pub queue: Arc<dyn TaskQueue>,
}

impl AppState {
    /// Build state from a config, pool, and queue implementation.
    pub fn new(
        pool: steadydancer_db::DbPool,
        config: ServerConfig,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        let layout = Arc::new(DataLayout::new(config.data_root.clone()));
        let resolver = Arc::new(PathResolver::new(config.repo_root.clone()));
        Self {
            pool,
            config: Arc::new(config),
            layout,
            resolver,
            queue,
        }
    }
}
