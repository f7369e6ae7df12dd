//! Data ingestion for the multi-timeframe pipeline.
//!
//! This crate handles:
//! - Raw bar source reading and schema checks
//! - Timestamp derivation, sorting and de-duplication
//! - Log-return computation
//! - The merged table artifact

pub mod loader;
pub mod merged_csv;
pub mod returns;
pub mod source;

pub use loader::{BarLoader, LoadReport, LoadedSeries};
pub use merged_csv::{read_merged, read_merged_file, write_merged, write_merged_file};
pub use returns::{log_return, log_returns};
pub use source::{read_raw_bar_file, read_raw_bars, RawBar};
