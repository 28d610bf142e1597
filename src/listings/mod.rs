//! HTTP read/maintenance API over stored job records.

pub mod dtos;
pub mod handlers;
