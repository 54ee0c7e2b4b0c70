use std::fmt;

use serde::{Deserialize, Serialize};

use crate::result::ProbeResult;

/// Aggregate over one completed run. Built once, never merged across runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// `passed / total`, or 0 for an empty run.
    pub success_rate: f64,
    pub total_duration_ms: u64,
    pub results: Vec<ProbeResult>,
    pub failures: Vec<ProbeResult>,
}

/// Reduce a run's results into a report. Order is preserved in both lists.
pub fn aggregate(results: &[ProbeResult]) -> RunReport {
    let total = results.len();
    let passed = results.iter().filter(|r| r.success).count();
    let success_rate = if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64
    };

    RunReport {
        total,
        passed,
        failed: total - passed,
        success_rate,
        total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
        results: results.to_vec(),
        failures: results.iter().filter(|r| !r.success).cloned().collect(),
    }
}

impl RunReport {
    pub fn is_healthy(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn success_percent(&self) -> f64 {
        self.success_rate * 100.0
    }

    /// One-line summary used in logs and alert headers.
    pub fn summary(&self) -> String {
        format!(
            "{}/{} probes passed ({:.1}%), {} failed, {}ms total",
            self.passed,
            self.total,
            self.success_percent(),
            self.failed,
            self.total_duration_ms
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for result in &self.results {
            let mark = if result.success { "PASS" } else { "FAIL" };
            write!(f, "  [{mark}] {} ({}ms)", result.name, result.duration_ms)?;
            if let Some(error) = &result.error {
                write!(f, ": {error}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
