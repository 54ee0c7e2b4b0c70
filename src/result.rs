use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one executed check.
///
/// `error` is set whenever `success` is false. `details` is informational and
/// never feeds pass/fail decisions outside the probe that produced it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ProbeResult {
    pub fn passed(name: impl Into<String>, duration_ms: u64) -> ProbeResult {
        ProbeResult {
            name: name.into(),
            success: true,
            duration_ms,
            error: None,
            details: None,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> ProbeResult {
        ProbeResult {
            name: name.into(),
            success: false,
            duration_ms,
            error: Some(error.into()),
            details: None,
        }
    }

    /// Build a result from a success flag, filling in `fallback_error` when the
    /// check failed without saying why.
    pub fn from_outcome(
        name: impl Into<String>,
        success: bool,
        duration_ms: u64,
        error: Option<String>,
        fallback_error: &str,
    ) -> ProbeResult {
        if success {
            ProbeResult::passed(name, duration_ms)
        } else {
            let error = error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| fallback_error.to_string());
            ProbeResult::failed(name, duration_ms, error)
        }
    }

    pub fn with_details(mut self, details: Value) -> ProbeResult {
        self.details = Some(details);
        self
    }
}
