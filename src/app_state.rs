use crate::repositories::{JobRepositoryTrait, PgJobRepository};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobRepositoryTrait>,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self::with_repository(Arc::new(PgJobRepository::new(pool)))
    }

    pub fn with_repository(jobs: Arc<dyn JobRepositoryTrait>) -> Self {
        Self { jobs }
    }
}
