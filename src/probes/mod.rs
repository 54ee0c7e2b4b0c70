//! Independent checks run by the orchestrator.
//!
//! Every probe converts collaborator failures into failed [`ProbeResult`]s
//! itself. An `Err` returned from [`Probe::run`] is treated as a defect in
//! the probe and recorded by the orchestrator under the probe's name.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;

use crate::fixtures::FixtureSource;
use crate::result::ProbeResult;
use crate::search::{SearchApi, SearchRequest, strategies};

pub mod fallback;
pub mod functional;
pub mod health;
pub mod performance;
pub mod sweep;

pub use fallback::FallbackChainProbe;
pub use functional::{PrimaryStrategyProbe, VectorStrategyProbe};
pub use health::{ApiHealthProbe, FixtureConnectivityProbe};
pub use performance::{PerformanceProbe, evaluate_latency};
pub use sweep::StrategySweepProbe;

#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &ProbeContext) -> Result<Vec<ProbeResult>>;
}

/// Collaborators and settings shared by every probe in a run.
#[derive(Clone)]
pub struct ProbeContext {
    pub api: Arc<dyn SearchApi>,
    pub fixtures: Arc<dyn FixtureSource>,
    pub settings: ProbeSettings,
}

impl ProbeContext {
    pub fn new(
        api: Arc<dyn SearchApi>,
        fixtures: Arc<dyn FixtureSource>,
        settings: ProbeSettings,
    ) -> ProbeContext {
        ProbeContext {
            api,
            fixtures,
            settings,
        }
    }
}

/// Expected latency ceiling for one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceTarget {
    pub strategy: String,
    pub expected_ms: u64,
}

impl PerformanceTarget {
    pub fn new(strategy: impl Into<String>, expected_ms: u64) -> PerformanceTarget {
        PerformanceTarget {
            strategy: strategy.into(),
            expected_ms,
        }
    }
}

/// Query used whenever a probe has no fixture to replay.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultQuery {
    pub query: String,
    pub area: String,
    pub region: Option<String>,
    pub country: Option<String>,
    pub timeline: Option<String>,
}

impl Default for DefaultQuery {
    fn default() -> Self {
        DefaultQuery {
            query: "coffee shops".to_string(),
            area: "tampa-bay".to_string(),
            region: Some("FL".to_string()),
            country: Some("US".to_string()),
            timeline: None,
        }
    }
}

impl DefaultQuery {
    pub fn to_request(&self) -> SearchRequest {
        SearchRequest::new(self.query.clone())
            .with_location(
                Some(self.area.clone()),
                self.region.clone(),
                self.country.clone(),
            )
            .with_timeline(self.timeline.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub health_timeout: Duration,
    pub functional_timeout: Duration,
    /// Transport ceiling for performance calls. Kept well above the SLA so a
    /// slow answer is measured as a breach instead of a timeout.
    pub performance_timeout: Duration,
    pub primary_strategy: String,
    pub secondary_strategy: String,
    pub sweep_strategies: Vec<String>,
    pub performance_targets: Vec<PerformanceTarget>,
    pub max_fallbacks: u32,
    pub default_query: DefaultQuery,
    pub device_id: Option<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            health_timeout: Duration::from_secs(5),
            functional_timeout: Duration::from_secs(30),
            performance_timeout: Duration::from_secs(60),
            primary_strategy: strategies::QUERY_CACHE.to_string(),
            secondary_strategy: strategies::VECTOR_SEARCH.to_string(),
            sweep_strategies: default_sweep_strategies(),
            performance_targets: default_performance_targets(),
            max_fallbacks: 2,
            default_query: DefaultQuery::default(),
            device_id: None,
        }
    }
}

pub fn default_sweep_strategies() -> Vec<String> {
    [
        strategies::HYBRID_RAG,
        strategies::WEB_SEARCH,
        strategies::WATERFALL,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_performance_targets() -> Vec<PerformanceTarget> {
    vec![
        PerformanceTarget::new(strategies::QUERY_CACHE, 1_000),
        PerformanceTarget::new(strategies::VECTOR_SEARCH, 3_000),
        PerformanceTarget::new(strategies::HYBRID_RAG, 8_000),
        PerformanceTarget::new(strategies::WEB_SEARCH, 15_000),
    ]
}

/// The fixed run order: cheap foundational checks first, so a full outage
/// surfaces on the first probe instead of as a string of timeouts.
pub fn default_sequence() -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(ApiHealthProbe),
        Box::new(FixtureConnectivityProbe),
        Box::new(PrimaryStrategyProbe),
        Box::new(VectorStrategyProbe),
        Box::new(StrategySweepProbe),
        Box::new(FallbackChainProbe),
        Box::new(PerformanceProbe),
    ]
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
