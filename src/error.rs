use thiserror::Error;

/// Errors that escape the probe layer.
///
/// Transport and protocol failures against the search API never show up here:
/// the search client folds them into a failed `SearchResponse`.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Required configuration missing or malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// Fixture store could not be reached or queried
    #[error("fixture store error: {0}")]
    FixtureStore(String),

    /// A single alert sink failed to deliver
    #[error("alert delivery via {sink} failed: {message}")]
    Delivery { sink: String, message: String },
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
