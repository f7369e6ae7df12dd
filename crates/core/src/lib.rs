//! Core types and configuration for the multi-timeframe pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Bar and timeframe types, loaded series and the merged table
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
