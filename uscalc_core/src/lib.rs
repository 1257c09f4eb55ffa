#![forbid(unsafe_code)]

//! Core domain model and logic for the ultrasound output calculator.
//!
//! This crate provides:
//! - Domain types (raw inputs, validated input set, derived metrics)
//! - Validation and unit normalization
//! - The derivation engine and display formatting
//! - Copy-to-clipboard and CSV batch evaluation
//! - The versioned offline asset cache

pub mod types;
pub mod error;
pub mod physics;
pub mod validate;
pub mod engine;
pub mod format;
pub mod clipboard;
pub mod batch;
pub mod cache;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use engine::{advisories, compute, evaluate, Evaluation};
pub use format::{Readout, UNAVAILABLE};
pub use clipboard::{copy_results, results_text, Clipboard, CommandClipboard, CopyOutcome};
pub use batch::{evaluate_csv, evaluate_csv_file, BatchSummary};
