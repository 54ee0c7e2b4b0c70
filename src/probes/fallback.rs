use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use super::{Probe, ProbeContext, elapsed_ms};
use crate::result::ProbeResult;
use crate::search::strategies;

pub const FALLBACK_CHAIN: &str = "Fallback Chain";

/// Lets the API walk its own fallback chain and checks it honours the hop cap.
pub struct FallbackChainProbe;

#[async_trait]
impl Probe for FallbackChainProbe {
    fn name(&self) -> &str {
        FALLBACK_CHAIN
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        let settings = &ctx.settings;
        let request = settings
            .default_query
            .to_request()
            .with_device_id(settings.device_id.clone())
            .with_fallbacks(settings.max_fallbacks);

        let start = Instant::now();
        let outcome = ctx
            .api
            .invoke(strategies::WATERFALL, &request, settings.functional_timeout)
            .await;
        let duration_ms = elapsed_ms(start);

        let result = match outcome {
            Ok(response) => {
                let hops = response.fallback_hops();
                let within_cap = hops <= settings.max_fallbacks as usize;
                let error = if response.success && !within_cap {
                    Some(format!(
                        "fallback chain took {hops} hops, limit is {}",
                        settings.max_fallbacks
                    ))
                } else {
                    response.error.clone()
                };

                ProbeResult::from_outcome(
                    FALLBACK_CHAIN,
                    response.success && within_cap,
                    duration_ms,
                    error,
                    "search reported failure",
                )
                .with_details(json!({
                    "fallbackUsed": response.fallback_used,
                    "fallbackChain": response.fallback_chain,
                    "source": response.source,
                    "originalStrategy": response.original_strategy,
                    "itemCount": response.item_count(),
                }))
            }
            Err(e) => ProbeResult::failed(FALLBACK_CHAIN, duration_ms, format!("{e:#}")),
        };
        Ok(vec![result])
    }
}
