//! Listing ingestion: extraction, normalization, deduplication and the
//! paginated run that ties them together.

pub mod assemble;
pub mod dates;
pub mod dedup;
pub mod extract;
pub mod pipeline;
pub mod selectors;

pub use assemble::{
    AssembleError, assemble, compose_location, infer_job_type, retain_storable_tags,
};
pub use dates::normalize_posting_date;
pub use dedup::Deduplicator;
pub use extract::{FieldExtractor, LocationParts, RawListing};
pub use pipeline::{IngestError, IngestSettings, RunSummary, StopReason, run_ingestion};
pub use selectors::SelectorSet;
