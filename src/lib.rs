//! Repopulse - commit-by-commit repository quality auditing
//!
//! Audits the complete code snapshot at each selected commit (not the
//! diff), scores security and complexity per file, persists the results,
//! and answers trend and review queries over the stored history.

pub mod analyzers;
pub mod audit;
pub mod cli;
pub mod config;
pub mod connector;
pub mod error;
pub mod handlers;
pub mod models;
pub mod query;
pub mod review;
pub mod sampling;
pub mod store;
