use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{Probe, ProbeContext, elapsed_ms};
use crate::fixtures::FixtureFilter;
use crate::result::ProbeResult;
use crate::search::SearchResponse;

pub const PRIMARY_STRATEGY: &str = "Primary Strategy";
pub const VECTOR_STRATEGY: &str = "Vector Strategy";

const NO_USABLE_FIXTURE: &str =
    "no valid fixture available for testing: need an unexpired entry with non-empty result data";

fn response_details(response: &SearchResponse, tested_query: &str) -> serde_json::Value {
    json!({
        "itemCount": response.item_count(),
        "timing": response.timing,
        "source": response.source,
        "cacheHit": response.cache_hit(),
        "testedQuery": tested_query,
    })
}

/// Replays a recorded query against the low-latency cache strategy.
///
/// Needs a fixture that is unexpired and has recorded results; without one the
/// probe fails rather than passing vacuously, and the API is never called.
pub struct PrimaryStrategyProbe;

#[async_trait]
impl Probe for PrimaryStrategyProbe {
    fn name(&self) -> &str {
        PRIMARY_STRATEGY
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        let settings = &ctx.settings;
        let start = Instant::now();

        let fixtures = match ctx.fixtures.recent(&FixtureFilter::usable(), 1).await {
            Ok(fixtures) => fixtures,
            Err(e) => {
                return Ok(vec![ProbeResult::failed(
                    PRIMARY_STRATEGY,
                    elapsed_ms(start),
                    format!("failed to load fixtures: {e:#}"),
                )]);
            }
        };

        let Some(fixture) = fixtures.into_iter().next() else {
            return Ok(vec![ProbeResult::failed(
                PRIMARY_STRATEGY,
                elapsed_ms(start),
                NO_USABLE_FIXTURE,
            )]);
        };
        debug!(fixture = %fixture.id, prompt = %fixture.prompt, "replaying fixture");

        let request = fixture
            .to_request()
            .with_device_id(settings.device_id.clone())
            .without_fallbacks();

        let start = Instant::now();
        let outcome = ctx
            .api
            .invoke(
                &settings.primary_strategy,
                &request,
                settings.functional_timeout,
            )
            .await;
        let duration_ms = elapsed_ms(start);

        let result = match outcome {
            Ok(response) => ProbeResult::from_outcome(
                PRIMARY_STRATEGY,
                response.success,
                duration_ms,
                response.error.clone(),
                "search reported failure",
            )
            .with_details(response_details(&response, &request.query)),
            Err(e) => ProbeResult::failed(PRIMARY_STRATEGY, duration_ms, format!("{e:#}")),
        };
        Ok(vec![result])
    }
}

/// Exercises vector retrieval. Falls back to the configured default query when
/// no usable fixture is around, and treats an empty result set as a failure.
pub struct VectorStrategyProbe;

#[async_trait]
impl Probe for VectorStrategyProbe {
    fn name(&self) -> &str {
        VECTOR_STRATEGY
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        let settings = &ctx.settings;

        let fixture = match ctx.fixtures.recent(&FixtureFilter::usable(), 1).await {
            Ok(fixtures) => fixtures.into_iter().next(),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "fixture lookup failed, using default query");
                None
            }
        };
        let used_fixture = fixture.is_some();
        let request = match fixture {
            Some(fixture) => fixture.to_request(),
            None => settings.default_query.to_request(),
        }
        .with_device_id(settings.device_id.clone())
        .without_fallbacks();

        let start = Instant::now();
        let outcome = ctx
            .api
            .invoke(
                &settings.secondary_strategy,
                &request,
                settings.functional_timeout,
            )
            .await;
        let duration_ms = elapsed_ms(start);

        let result = match outcome {
            Ok(response) => {
                let no_data = response.success && response.data.is_empty();
                let error = if no_data {
                    Some("no data returned".to_string())
                } else {
                    response.error.clone()
                };
                let mut details = response_details(&response, &request.query);
                details["usedFixture"] = json!(used_fixture);

                ProbeResult::from_outcome(
                    VECTOR_STRATEGY,
                    response.success && !no_data,
                    duration_ms,
                    error,
                    "search reported failure",
                )
                .with_details(details)
            }
            Err(e) => ProbeResult::failed(VECTOR_STRATEGY, duration_ms, format!("{e:#}")),
        };
        Ok(vec![result])
    }
}
