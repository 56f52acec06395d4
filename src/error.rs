//! Error types for configuration, input and provider failures.

use thiserror::Error;

use crate::handlers::Mode;
use crate::providers::Provider;

/// Errors raised by the comparison pipeline.
///
/// Configuration and input variants are fatal for a run. Provider request
/// failures (`Http`, `RouteNotFound`, `MalformedResponse`) are absorbed by
/// the collector and never reach the caller.
#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("unsupported API provider: {0}")]
    UnknownProvider(String),

    #[error("input is missing required column `{0}`")]
    MissingColumn(String),

    #[error("{provider} does not support {mode} requests")]
    UnsupportedMode { provider: Provider, mode: Mode },

    #[error("invalid coordinates `{0}`, expected `lat,lng`")]
    InvalidCoordinates(String),

    #[error("invalid date or time `{0}`")]
    InvalidTime(String),

    #[error("unknown time zone `{0}`")]
    InvalidTimeZone(String),

    #[error("at least one departure time must be provided")]
    NoDepartureTimes,

    #[error("{provider} returned status {status}: {message}")]
    Http {
        provider: Provider,
        status: u16,
        message: String,
    },

    #[error("no route found between origin and destination")]
    RouteNotFound,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ComparisonError>;
