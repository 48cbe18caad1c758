//! Multi-source job aggregation engine.
//!
//! Three subsystems: a polite HTTP fetch layer ([`http`]), a pluggable
//! scraper set ([`scraper`]), and a scheduler / deduplicating writer
//! ([`scheduler`]) backed by a [`repository::JobRepository`]. [`admin`]
//! exposes status/runs/trigger over HTTP, depending only on the repository
//! and scheduler.

pub mod admin;
pub mod config;
pub mod error;
pub mod experience;
pub mod fingerprint;
pub mod http;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod scraper;
pub mod text;

pub use config::Config;
pub use error::{AggregatorError, Result};
