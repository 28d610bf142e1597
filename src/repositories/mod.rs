pub mod job;
pub mod memory;
pub mod query;

use async_trait::async_trait;
use thiserror::Error;

use crate::entities::{Job, JobPatch, NewJob};

pub use job::PgJobRepository;
pub use memory::InMemoryJobStore;
pub use query::{JobQuery, SortOrder};

#[derive(Error, Debug)]
pub enum StoreError {
    /// Another record already owns this link.
    #[error("a job with link {link} already exists")]
    UniquenessViolation { link: String },

    #[error("job {0} not found")]
    NotFound(i64),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Write side used by the ingestion pipeline and the import tool.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find_by_link(&self, link: &str) -> Result<Option<Job>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::UniquenessViolation`]
    /// when the link is already taken.
    async fn insert(&self, job: &NewJob) -> Result<Job, StoreError>;
}

/// Read/maintenance side behind the HTTP API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueryService: Send + Sync {
    async fn list(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Job>, StoreError>;

    async fn update(&self, id: i64, patch: JobPatch) -> Result<Job, StoreError>;

    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Everything the API needs from one backing store.
pub trait JobRepositoryTrait: JobStore + JobQueryService {}

impl<T: JobStore + JobQueryService> JobRepositoryTrait for T {}
