use async_trait::async_trait;
use serde::Serialize;

use super::{Alert, AlertSeverity, AlertSink, clip, post_webhook};
use crate::error::HarnessResult;

// Discord rejects embeds over these limits.
const MAX_CONTENT_CHARS: usize = 2_000;
const MAX_TITLE_CHARS: usize = 256;
const MAX_DESCRIPTION_CHARS: usize = 4_096;
const MAX_FIELD_NAME_CHARS: usize = 256;
const MAX_FIELD_VALUE_CHARS: usize = 1_024;

const COLOR_WARNING: u32 = 0xF2_C7_44;
const COLOR_CRITICAL: u32 = 0xE0_1E_5A;

#[derive(Debug, Serialize, PartialEq)]
pub struct DiscordPayload {
    pub content: String,
    pub embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<DiscordField>,
    pub footer: DiscordFooter,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DiscordField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DiscordFooter {
    pub text: String,
}

/// Webhook sink: a `content` string plus embeds.
pub struct DiscordWebhook {
    client: reqwest::Client,
    url: String,
}

impl DiscordWebhook {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn payload(alert: &Alert) -> DiscordPayload {
        let color = match alert.severity {
            AlertSeverity::Failure => COLOR_WARNING,
            AlertSeverity::Critical => COLOR_CRITICAL,
        };

        let mut fields: Vec<DiscordField> = alert
            .failures
            .iter()
            .map(|f| DiscordField {
                name: clip(&f.name, MAX_FIELD_NAME_CHARS),
                value: clip(
                    &format!("{} ({}ms)", f.error, f.duration_ms),
                    MAX_FIELD_VALUE_CHARS,
                ),
                inline: false,
            })
            .collect();
        if let Some(note) = alert.overflow_note() {
            fields.push(DiscordField {
                name: "More failures".to_string(),
                value: note,
                inline: false,
            });
        }

        DiscordPayload {
            content: clip(&format!("**{}**", alert.title), MAX_CONTENT_CHARS),
            embeds: vec![DiscordEmbed {
                title: clip(&alert.title, MAX_TITLE_CHARS),
                description: clip(&alert.summary, MAX_DESCRIPTION_CHARS),
                color,
                fields,
                footer: DiscordFooter {
                    text: format!("run {}", alert.run_id),
                },
            }],
        }
    }
}

#[async_trait]
impl AlertSink for DiscordWebhook {
    fn name(&self) -> &str {
        "discord"
    }

    async fn deliver(&self, alert: &Alert) -> HarnessResult<()> {
        post_webhook(&self.client, self.name(), &self.url, &Self::payload(alert)).await
    }
}
