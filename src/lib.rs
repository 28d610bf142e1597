pub mod app;
pub mod app_state;
pub mod config;
pub mod driver;
pub mod entities;
pub mod fetcher;
pub mod health;
pub mod ingest;
pub mod interchange;
pub mod listings;
pub mod repositories;
