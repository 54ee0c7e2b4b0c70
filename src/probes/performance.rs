use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use super::{Probe, ProbeContext, elapsed_ms};
use crate::result::ProbeResult;
use crate::search::SearchResponse;

pub const PERFORMANCE: &str = "Performance";

pub fn performance_probe_name(strategy: &str) -> String {
    format!("Performance: {strategy}")
}

/// Judge one timed call. `measured_ms` is our own wall-clock reading; the
/// server's self-reported timing is kept in details only.
///
/// The ceiling is inclusive.
pub fn evaluate_latency(
    strategy: &str,
    response: &SearchResponse,
    measured_ms: u64,
    expected_ms: u64,
) -> ProbeResult {
    let name = performance_probe_name(strategy);
    let details = json!({
        "strategy": strategy,
        "measuredMs": measured_ms,
        "expectedMs": expected_ms,
        "serverTotalMs": response.server_total_ms(),
    });

    let result = if !response.success {
        ProbeResult::from_outcome(
            name,
            false,
            measured_ms,
            response.error.clone(),
            "search reported failure",
        )
    } else if measured_ms > expected_ms {
        ProbeResult::failed(
            name,
            measured_ms,
            format!("took {measured_ms}ms, expected at most {expected_ms}ms"),
        )
    } else {
        ProbeResult::passed(name, measured_ms)
    };
    result.with_details(details)
}

pub struct PerformanceProbe;

#[async_trait]
impl Probe for PerformanceProbe {
    fn name(&self) -> &str {
        PERFORMANCE
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        let settings = &ctx.settings;
        let request = settings
            .default_query
            .to_request()
            .with_device_id(settings.device_id.clone())
            .without_fallbacks();

        let mut results = Vec::with_capacity(settings.performance_targets.len());
        for target in &settings.performance_targets {
            let start = Instant::now();
            let outcome = ctx
                .api
                .invoke(&target.strategy, &request, settings.performance_timeout)
                .await;
            let measured_ms = elapsed_ms(start);

            let result = match outcome {
                Ok(response) => {
                    evaluate_latency(&target.strategy, &response, measured_ms, target.expected_ms)
                }
                Err(e) => ProbeResult::failed(
                    performance_probe_name(&target.strategy),
                    measured_ms,
                    format!("{e:#}"),
                ),
            };
            results.push(result);
        }
        Ok(results)
    }
}
