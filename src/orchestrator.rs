use std::any::Any;
use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alert::AlertDispatcher;
use crate::error::{HarnessError, HarnessResult};
use crate::probes::{Probe, ProbeContext, default_sequence};
use crate::report::{RunReport, aggregate};
use crate::result::ProbeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub run_id: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub report: RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

impl RunOutcome {
    /// Probe failures are reported, not treated as process failure.
    pub fn exit_code(&self) -> u8 {
        match self.state {
            RunState::Completed => 0,
            _ => 1,
        }
    }
}

/// Runs a fixed probe sequence once, one probe at a time.
pub struct Orchestrator {
    run_id: String,
    ctx: ProbeContext,
    probes: Vec<Box<dyn Probe>>,
    state: RunState,
}

impl Orchestrator {
    pub fn new(ctx: ProbeContext, probes: Vec<Box<dyn Probe>>) -> Self {
        Self {
            run_id: nanoid::nanoid!(10),
            ctx,
            probes,
            state: RunState::NotStarted,
        }
    }

    pub fn with_default_sequence(ctx: ProbeContext) -> Self {
        Self::new(ctx, default_sequence())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    fn transition(&mut self, next: RunState) {
        debug!(run_id = %self.run_id, from = ?self.state, to = ?next, "run state change");
        self.state = next;
    }

    /// Checks that must hold before any probe can mean anything.
    async fn preflight(&self) -> HarnessResult<()> {
        if !self.ctx.settings.default_query.to_request().is_valid() {
            return Err(HarnessError::Config(
                "default query is empty, no request can be built".to_string(),
            ));
        }

        self.ctx
            .fixtures
            .initialize()
            .await
            .map_err(|e| HarnessError::FixtureStore(format!("{e:#}")))
    }

    /// Execute the run. Consumes the orchestrator: each run is a fresh one.
    pub async fn run_all(mut self) -> RunOutcome {
        self.transition(RunState::Running);
        let started_at = Utc::now();
        info!(run_id = %self.run_id, probes = self.probes.len(), "starting health check run");

        let mut results: Vec<ProbeResult> = Vec::new();

        if let Err(e) = self.preflight().await {
            error!(run_id = %self.run_id, error = %e, "run aborted before probes could start");
            self.transition(RunState::Aborted);
            return RunOutcome {
                run_id: self.run_id,
                state: self.state,
                started_at,
                finished_at: Utc::now(),
                report: aggregate(&results),
                fatal_error: Some(e.to_string()),
            };
        }

        for probe in &self.probes {
            results.extend(run_isolated(probe.as_ref(), &self.ctx).await);
        }

        self.transition(RunState::Completed);
        let report = aggregate(&results);
        info!(run_id = %self.run_id, summary = %report.summary(), "health check run completed");

        RunOutcome {
            run_id: self.run_id,
            state: self.state,
            started_at,
            finished_at: Utc::now(),
            report,
            fatal_error: None,
        }
    }

    /// Run, then alert: critical on abort, and a failure summary whenever any
    /// probe failed.
    pub async fn run_and_notify(self, dispatcher: &AlertDispatcher) -> RunOutcome {
        let outcome = self.run_all().await;

        if let Some(fatal) = &outcome.fatal_error {
            dispatcher
                .notify_critical(&outcome.run_id, "health check run aborted", fatal)
                .await;
        }
        dispatcher
            .notify_if_needed(&outcome.run_id, &outcome.report)
            .await;

        outcome
    }
}

/// Failure boundary around one probe: errors and panics become a single
/// failed result under the probe's name.
async fn run_isolated(probe: &dyn Probe, ctx: &ProbeContext) -> Vec<ProbeResult> {
    let name = probe.name();
    let start = tokio::time::Instant::now();
    debug!(probe = name, "running probe");

    let outcome = AssertUnwindSafe(probe.run(ctx)).catch_unwind().await;
    let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let results = match outcome {
        Ok(Ok(results)) if results.is_empty() => {
            vec![ProbeResult::failed(name, elapsed, "probe produced no results")]
        }
        Ok(Ok(results)) => results,
        Ok(Err(e)) => vec![ProbeResult::failed(name, elapsed, format!("{e:#}"))],
        Err(panic) => vec![ProbeResult::failed(
            name,
            elapsed,
            format!("probe panicked: {}", panic_message(&*panic)),
        )],
    };

    for result in &results {
        if result.success {
            info!(probe = %result.name, duration_ms = result.duration_ms, "probe passed");
        } else {
            warn!(
                probe = %result.name,
                duration_ms = result.duration_ms,
                error = result.error.as_deref().unwrap_or_default(),
                "probe failed"
            );
        }
    }
    results
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
