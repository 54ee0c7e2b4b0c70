use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use super::{Probe, ProbeContext, elapsed_ms};
use crate::fixtures::FixtureFilter;
use crate::result::ProbeResult;

pub const API_HEALTH: &str = "API Health";
pub const FIXTURE_CONNECTIVITY: &str = "Fixture Connectivity";

pub struct ApiHealthProbe;

#[async_trait]
impl Probe for ApiHealthProbe {
    fn name(&self) -> &str {
        API_HEALTH
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        let start = Instant::now();
        let outcome = ctx.api.health_check(ctx.settings.health_timeout).await;
        let duration_ms = elapsed_ms(start);

        let result = match outcome {
            Ok(true) => ProbeResult::passed(API_HEALTH, duration_ms),
            Ok(false) => ProbeResult::failed(
                API_HEALTH,
                duration_ms,
                "health endpoint did not answer with a 2xx status",
            ),
            Err(e) => ProbeResult::failed(API_HEALTH, duration_ms, format!("{e:#}")),
        };
        Ok(vec![result])
    }
}

pub struct FixtureConnectivityProbe;

#[async_trait]
impl Probe for FixtureConnectivityProbe {
    fn name(&self) -> &str {
        FIXTURE_CONNECTIVITY
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        let start = Instant::now();
        let outcome = ctx.fixtures.recent(&FixtureFilter::unexpired(), 1).await;
        let duration_ms = elapsed_ms(start);

        let result = match outcome {
            Ok(fixtures) => match fixtures.into_iter().next() {
                Some(sample) => ProbeResult::passed(FIXTURE_CONNECTIVITY, duration_ms)
                    .with_details(json!({
                        "id": sample.id.to_hex(),
                        "prompt": sample.prompt,
                    })),
                None => ProbeResult::failed(
                    FIXTURE_CONNECTIVITY,
                    duration_ms,
                    "fixture store returned no recent sample",
                ),
            },
            Err(e) => ProbeResult::failed(FIXTURE_CONNECTIVITY, duration_ms, format!("{e:#}")),
        };
        Ok(vec![result])
    }
}
