use sqlx::PgPool;
use std::sync::Arc;

use crate::db::store::PgStore;
use crate::services::processor::VerificationProcessor;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub store: Arc<PgStore>,
    pub processor: Arc<VerificationProcessor>,
}

impl AppState {
    pub fn new(db: PgPool, store: Arc<PgStore>, processor: Arc<VerificationProcessor>) -> Self {
        Self {
            db,
            store,
            processor,
        }
    }
}
