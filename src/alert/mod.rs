//! Best-effort run notifications.
//!
//! Every configured sink is attempted concurrently. A sink that fails is
//! logged and skipped; nothing here ever fails the caller.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::report::RunReport;

pub mod discord;
pub mod slack;

pub use discord::DiscordWebhook;
pub use slack::SlackWebhook;

/// Alerts itemise at most this many failing probes.
pub const MAX_ITEMISED_FAILURES: usize = 20;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum AlertSeverity {
    /// Some probes failed in a completed run
    Failure,
    /// The run aborted before it could finish
    Critical,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailureItem {
    pub name: String,
    pub error: String,
    pub duration_ms: u64,
}

/// Sink-neutral alert content. Each sink renders it into its own payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub run_id: String,
    pub title: String,
    pub summary: String,
    pub failures: Vec<FailureItem>,
    /// Failing probes left out to bound alert size.
    pub omitted: usize,
}

impl Alert {
    /// Condensed view of a report: the summary plus failing probes only.
    pub fn from_report(run_id: &str, report: &RunReport) -> Alert {
        let failures = report
            .failures
            .iter()
            .take(MAX_ITEMISED_FAILURES)
            .map(|r| FailureItem {
                name: r.name.clone(),
                error: r.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                duration_ms: r.duration_ms,
            })
            .collect();

        Alert {
            severity: AlertSeverity::Failure,
            run_id: run_id.to_string(),
            title: format!("Search health check failed: {} probe(s) failing", report.failed),
            summary: report.summary(),
            failures,
            omitted: report.failures.len().saturating_sub(MAX_ITEMISED_FAILURES),
        }
    }

    pub fn critical(run_id: &str, message: &str, error: &str) -> Alert {
        Alert {
            severity: AlertSeverity::Critical,
            run_id: run_id.to_string(),
            title: format!("CRITICAL: {message}"),
            summary: error.to_string(),
            failures: Vec::new(),
            omitted: 0,
        }
    }

    pub fn overflow_note(&self) -> Option<String> {
        (self.omitted > 0).then(|| format!("... and {} more", self.omitted))
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, alert: &Alert) -> HarnessResult<()>;
}

struct Channel {
    sink: Box<dyn AlertSink>,
    enabled: bool,
}

#[derive(Default)]
pub struct AlertDispatcher {
    channels: Vec<Channel>,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. Disabled sinks only receive critical alerts.
    pub fn with_sink(mut self, sink: Box<dyn AlertSink>, enabled: bool) -> Self {
        self.channels.push(Channel { sink, enabled });
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.sink.name()).collect()
    }

    /// Notify enabled sinks when the report has failures. Returns the number of
    /// successful deliveries.
    pub async fn notify_if_needed(&self, run_id: &str, report: &RunReport) -> usize {
        if report.failures.is_empty() {
            info!(run_id, "all probes passed, no alert sent");
            return 0;
        }

        let alert = Alert::from_report(run_id, report);
        let targets: Vec<&Channel> = self.channels.iter().filter(|c| c.enabled).collect();
        if targets.is_empty() {
            warn!(run_id, failed = report.failed, "probes failed but no alert channel is enabled");
            return 0;
        }
        deliver_all(&alert, &targets).await
    }

    /// Critical alerts go to every configured sink, enabled or not.
    pub async fn notify_critical(&self, run_id: &str, message: &str, error: &str) -> usize {
        error!(run_id, message, error, "critical harness failure");
        let alert = Alert::critical(run_id, message, error);
        let targets: Vec<&Channel> = self.channels.iter().collect();
        deliver_all(&alert, &targets).await
    }
}

async fn deliver_all(alert: &Alert, targets: &[&Channel]) -> usize {
    let attempts = targets.iter().copied().map(|channel| async move {
        let outcome = channel.sink.deliver(alert).await;
        (channel.sink.name(), outcome)
    });

    let mut delivered = 0;
    for (sink, outcome) in join_all(attempts).await {
        match outcome {
            Ok(()) => {
                info!(sink, run_id = %alert.run_id, "alert delivered");
                delivered += 1;
            }
            Err(e) => error!(sink, run_id = %alert.run_id, error = %e, "alert delivery failed"),
        }
    }
    delivered
}

/// POST a JSON payload to a webhook, mapping any failure to `Delivery`.
pub(crate) async fn post_webhook<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    sink: &str,
    url: &str,
    payload: &T,
) -> HarnessResult<()> {
    let delivery_error = |message: String| HarnessError::Delivery {
        sink: sink.to_string(),
        message,
    };

    let response = client
        .post(url)
        .timeout(DELIVERY_TIMEOUT)
        .json(payload)
        .send()
        .await
        .map_err(|e| delivery_error(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(delivery_error(format!("HTTP {status}: {body}")))
    }
}

/// Truncate to at most `max` characters, marking the cut.
pub(crate) fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(max.saturating_sub(1)).collect();
        clipped.push('…');
        clipped
    }
}
