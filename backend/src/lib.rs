//! Artifact Curator - Backend Library
//!
//! Community curation pipeline: submissions move through community voting
//! and expert review, and verified artifacts are pinned to a content store
//! and anchored on a ledger.

#[macro_use]
mod macros;

pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
