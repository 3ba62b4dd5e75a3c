//! Application state management

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::data::DataLoader;
use crate::pipeline::Session;

use super::ServerConfig;

/// Application state shared across handlers.
///
/// Stage handlers hold the session write lock for their whole duration, so
/// the four stages never interleave. The lock is shared so a stage can carry
/// its guard onto the blocking pool.
pub struct AppState {
    pub config: ServerConfig,
    pub session: Arc<RwLock<Session>>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            session: Arc::new(RwLock::new(Session::new().with_loader(DataLoader::new()))),
            started_at: chrono::Utc::now(),
        }
    }
}
