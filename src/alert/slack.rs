use async_trait::async_trait;
use serde::Serialize;

use super::{Alert, AlertSeverity, AlertSink, post_webhook};
use crate::error::HarnessResult;

#[derive(Debug, Serialize, PartialEq)]
pub struct SlackPayload {
    pub text: String,
    pub attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SlackAttachment {
    pub color: &'static str,
    pub title: String,
    pub fields: Vec<SlackField>,
    pub footer: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SlackField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// Incoming-webhook sink: plain `text` plus structured attachments.
pub struct SlackWebhook {
    client: reqwest::Client,
    url: String,
}

impl SlackWebhook {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn payload(alert: &Alert) -> SlackPayload {
        let color = match alert.severity {
            AlertSeverity::Failure => "warning",
            AlertSeverity::Critical => "danger",
        };

        let mut fields: Vec<SlackField> = alert
            .failures
            .iter()
            .map(|f| SlackField {
                title: f.name.clone(),
                value: format!("{} ({}ms)", f.error, f.duration_ms),
                short: false,
            })
            .collect();
        if let Some(note) = alert.overflow_note() {
            fields.push(SlackField {
                title: "More failures".to_string(),
                value: note,
                short: false,
            });
        }

        SlackPayload {
            text: format!("*{}*\n{}", alert.title, alert.summary),
            attachments: vec![SlackAttachment {
                color,
                title: if alert.failures.is_empty() {
                    "Details".to_string()
                } else {
                    "Failing probes".to_string()
                },
                fields,
                footer: format!("run {}", alert.run_id),
            }],
        }
    }
}

#[async_trait]
impl AlertSink for SlackWebhook {
    fn name(&self) -> &str {
        "slack"
    }

    async fn deliver(&self, alert: &Alert) -> HarnessResult<()> {
        post_webhook(&self.client, self.name(), &self.url, &Self::payload(alert)).await
    }
}
