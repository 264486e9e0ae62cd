use std::sync::Arc;

use crate::infra::{aliases::DbPool, config::AppConfig};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub config: Arc<AppConfig>,
}
