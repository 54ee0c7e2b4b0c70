use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use lookout::alert::{AlertDispatcher, AlertSeverity};
use lookout::orchestrator::{Orchestrator, RunState};
use lookout::probes::{DefaultQuery, Probe, ProbeContext, ProbeSettings};
use lookout::result::ProbeResult;

mod common;
use common::*;

struct PassingProbe(&'static str);

#[async_trait]
impl Probe for PassingProbe {
    fn name(&self) -> &str {
        self.0
    }

    async fn run(&self, _ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        Ok(vec![ProbeResult::passed(self.0, 3)])
    }
}

struct ErroringProbe;

#[async_trait]
impl Probe for ErroringProbe {
    fn name(&self) -> &str {
        "Erroring"
    }

    async fn run(&self, _ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        Err(anyhow!("unexpected null in response"))
    }
}

struct PanickingProbe;

#[async_trait]
impl Probe for PanickingProbe {
    fn name(&self) -> &str {
        "Panicking"
    }

    async fn run(&self, _ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        panic!("index out of bounds");
    }
}

struct SilentProbe;

#[async_trait]
impl Probe for SilentProbe {
    fn name(&self) -> &str {
        "Silent"
    }

    async fn run(&self, _ctx: &ProbeContext) -> Result<Vec<ProbeResult>> {
        Ok(Vec::new())
    }
}

fn healthy_context() -> ProbeContext {
    context(
        Arc::new(StubSearchApi::new()),
        Arc::new(StubFixtures::with(vec![fixture("pizza", 3_600_000, 2)])),
    )
}

#[tokio::test]
async fn test_erroring_probe_does_not_abort_run() -> Result<()> {
    let probes: Vec<Box<dyn Probe>> = vec![
        Box::new(PassingProbe("first")),
        Box::new(ErroringProbe),
        Box::new(PassingProbe("third")),
        Box::new(PassingProbe("fourth")),
    ];
    let outcome = Orchestrator::new(healthy_context(), probes).run_all().await;

    assert_eq!(outcome.state, RunState::Completed);
    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.finished_at >= outcome.started_at);
    let report = &outcome.report;
    assert_eq!(report.total, 4);
    assert_eq!(report.passed, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "Erroring");
    let error = report.failures[0].error.as_deref().unwrap();
    assert!(error.contains("unexpected null"));
    Ok(())
}

#[tokio::test]
async fn test_panicking_and_silent_probes_are_recorded() -> Result<()> {
    let probes: Vec<Box<dyn Probe>> = vec![
        Box::new(PanickingProbe),
        Box::new(SilentProbe),
        Box::new(PassingProbe("after")),
    ];
    let outcome = Orchestrator::new(healthy_context(), probes).run_all().await;

    assert_eq!(outcome.state, RunState::Completed);
    let names: Vec<_> = outcome.report.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Panicking", "Silent", "after"]);
    let error = outcome.report.results[0].error.as_deref().unwrap();
    assert!(error.contains("index out of bounds"));
    assert_eq!(
        outcome.report.results[1].error.as_deref(),
        Some("probe produced no results")
    );
    assert!(outcome.report.results[2].success);
    Ok(())
}

#[tokio::test]
async fn test_default_sequence_against_healthy_stubs() -> Result<()> {
    let orchestrator = Orchestrator::with_default_sequence(healthy_context());
    assert_eq!(orchestrator.state(), RunState::NotStarted);
    assert_eq!(orchestrator.probe_names()[0], "API Health");

    let outcome = orchestrator.run_all().await;
    let report = &outcome.report;

    let settings = ProbeSettings::default();
    // health, connectivity, primary, vector, sweep, fallback, performance
    let expected = 5 + settings.sweep_strategies.len() + settings.performance_targets.len();
    assert_eq!(report.total, expected);
    assert_eq!(report.failed, 0, "{:?}", report.failures);
    assert_eq!(report.success_rate, 1.0);
    assert_eq!(report.results[0].name, "API Health");
    assert_eq!(report.results[1].name, "Fixture Connectivity");
    Ok(())
}

#[tokio::test]
async fn test_fixture_store_failure_aborts_run() -> Result<()> {
    let fixtures = Arc::new(StubFixtures {
        fail_initialize: true,
        ..Default::default()
    });
    let api = Arc::new(StubSearchApi::new());
    let ctx = context(api.clone(), fixtures);

    let enabled = RecordingSink::new("slack");
    let disabled = RecordingSink::new("discord");
    let enabled_inbox = enabled.received.clone();
    let disabled_inbox = disabled.received.clone();
    let dispatcher = AlertDispatcher::new()
        .with_sink(Box::new(enabled), true)
        .with_sink(Box::new(disabled), false);

    let outcome = Orchestrator::with_default_sequence(ctx)
        .run_and_notify(&dispatcher)
        .await;

    assert_eq!(outcome.state, RunState::Aborted);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.report.total, 0);
    assert_eq!(outcome.report.success_rate, 0.0);
    assert!(outcome.fatal_error.unwrap().contains("connection refused"));
    assert!(api.calls().is_empty());

    // Critical alerts ignore the per-channel switch.
    for inbox in [enabled_inbox, disabled_inbox] {
        let received = inbox.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].severity, AlertSeverity::Critical);
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_default_query_aborts_run() -> Result<()> {
    let settings = ProbeSettings {
        default_query: DefaultQuery {
            query: "  ".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    let ctx = context_with(
        Arc::new(StubSearchApi::new()),
        Arc::new(StubFixtures::empty()),
        settings,
    );

    let outcome = Orchestrator::with_default_sequence(ctx).run_all().await;
    assert_eq!(outcome.state, RunState::Aborted);
    assert!(outcome.fatal_error.unwrap().contains("default query"));
    Ok(())
}

#[tokio::test]
async fn test_passing_run_sends_no_alerts() -> Result<()> {
    let sink = RecordingSink::new("slack");
    let inbox = sink.received.clone();
    let dispatcher = AlertDispatcher::new().with_sink(Box::new(sink), true);

    let probes: Vec<Box<dyn Probe>> = vec![Box::new(PassingProbe("only"))];
    let outcome = Orchestrator::new(healthy_context(), probes)
        .run_and_notify(&dispatcher)
        .await;

    assert_eq!(outcome.report.failed, 0);
    assert!(inbox.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_run_alerts_enabled_sinks_despite_delivery_error() -> Result<()> {
    let broken = RecordingSink::failing("slack");
    let working = RecordingSink::new("discord");
    let switched_off = RecordingSink::new("other");
    let broken_inbox = broken.received.clone();
    let working_inbox = working.received.clone();
    let off_inbox = switched_off.received.clone();

    let dispatcher = AlertDispatcher::new()
        .with_sink(Box::new(broken), true)
        .with_sink(Box::new(working), true)
        .with_sink(Box::new(switched_off), false);

    let probes: Vec<Box<dyn Probe>> = vec![
        Box::new(PassingProbe("ok")),
        Box::new(ErroringProbe),
    ];
    let orchestrator = Orchestrator::new(healthy_context(), probes);
    let run_id = orchestrator.run_id().to_string();
    let outcome = orchestrator.run_and_notify(&dispatcher).await;
    assert_eq!(outcome.run_id, run_id);
    assert_eq!(outcome.exit_code(), 0);

    assert_eq!(broken_inbox.lock().unwrap().len(), 1);
    assert!(off_inbox.lock().unwrap().is_empty());

    let received = working_inbox.lock().unwrap();
    assert_eq!(received.len(), 1);
    let alert = &received[0];
    assert_eq!(alert.severity, AlertSeverity::Failure);
    assert_eq!(alert.run_id, run_id);
    assert_eq!(alert.failures.len(), 1);
    assert_eq!(alert.failures[0].name, "Erroring");
    Ok(())
}
