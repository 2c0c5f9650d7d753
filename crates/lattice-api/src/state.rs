use std::sync::Arc;

use lattice_db::Database;
use lattice_push::registry::PushRegistry;

use crate::error::ApiError;
use crate::media::MediaPipeline;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub registry: PushRegistry,
    pub media: Arc<dyn MediaPipeline>,
    pub jwt_secret: String,
}

/// Run blocking SQLite work off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
        .map_err(ApiError::from)
}
