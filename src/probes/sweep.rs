use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use super::{Probe, ProbeContext, elapsed_ms};
use crate::result::ProbeResult;

pub const STRATEGY_SWEEP: &str = "Strategy Sweep";

pub fn strategy_probe_name(strategy: &str) -> String {
    format!("Strategy: {strategy}")
}

/// One request per remaining strategy, issued one after another so calls do
/// not contend with each other.
pub struct StrategySweepProbe;

#[async_trait]
impl Probe for StrategySweepProbe {
    fn name(&self) -> &str {
        STRATEGY_SWEEP
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        let settings = &ctx.settings;
        let request = settings
            .default_query
            .to_request()
            .with_device_id(settings.device_id.clone())
            .without_fallbacks();

        let mut results = Vec::with_capacity(settings.sweep_strategies.len());
        for strategy in &settings.sweep_strategies {
            let name = strategy_probe_name(strategy);
            let start = Instant::now();
            let outcome = ctx
                .api
                .invoke(strategy, &request, settings.functional_timeout)
                .await;
            let duration_ms = elapsed_ms(start);

            let result = match outcome {
                Ok(response) => ProbeResult::from_outcome(
                    name,
                    response.success,
                    duration_ms,
                    response.error.clone(),
                    "search reported failure",
                )
                .with_details(json!({
                    "itemCount": response.item_count(),
                    "source": response.source,
                    "serverTotalMs": response.server_total_ms(),
                })),
                Err(e) => ProbeResult::failed(name, duration_ms, format!("{e:#}")),
            };
            results.push(result);
        }
        Ok(results)
    }
}
