pub mod client;
pub mod decode;
pub mod errors;

pub use client::{FetchedPage, HttpFetcher};
pub use errors::FetchError;
