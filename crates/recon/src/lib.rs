//! `tally-recon`: three-source redemption reconciliation engine.
//!
//! Pure engine crate: receives parsed point-of-sale and rewards-program
//! records, returns a classified match report. No CLI dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod report;
pub mod scoring;
pub mod similarity;

pub use config::ReconConfig;
pub use engine::{load_csv_records, load_input, run, run_with_scorer};
pub use error::ReconError;
pub use model::{MatchResult, ReconInput, ReconciliationReport, Record, Source};
pub use scoring::{ConfidenceScorer, DistanceConfidence, RatioConfidence, ThresholdConfidence};
