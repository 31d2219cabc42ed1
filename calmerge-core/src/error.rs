//! Error types for calmerge operations.
//!
//! Fetch and expansion errors are recovered inside the engine (logged, then
//! collapsed to "no events"). Only [`EngineError`] reaches callers.

use thiserror::Error;

/// A single feed could not be retrieved or parsed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed returned status {0}")]
    Status(u16),

    #[error("Feed request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid feed URL '{0}'")]
    InvalidUrl(String),

    #[error("ICS parse error: {0}")]
    Parse(String),
}

/// A recurrence rule could not be evaluated.
#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Failures in the aggregation path itself. These are surfaced to callers.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid window: start {start} is after end {end}")]
    InvalidWindow { start: String, end: String },

    #[error("Aggregation failed: {0}")]
    Aggregation(String),
}

pub type FetchResult<T> = Result<T, FetchError>;
pub type ExpansionResult<T> = Result<T, ExpansionError>;
pub type EngineResult<T> = Result<T, EngineError>;
