use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};
use crate::probes::{
    DefaultQuery, PerformanceTarget, ProbeSettings, default_performance_targets,
    default_sweep_strategies,
};

pub const DEFAULT_DEVICE_ID: &str = "lookout-health-check";

/// Fully resolved settings for one harness invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub fixture_collection: String,
    pub probes: ProbeSettings,
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AlertConfig {
    pub slack_webhook_url: Option<String>,
    pub slack_enabled: bool,
    pub discord_webhook_url: Option<String>,
    pub discord_enabled: bool,
}

impl Config {
    /// Load `.env` if present, then read the process environment. A
    /// `base_url` given on the command line stands in for SEARCH_API_BASE_URL.
    pub fn from_env(base_url: Option<&str>) -> HarnessResult<Config> {
        dotenv().ok();
        Self::from_lookup_with_base_url(base_url, |key| env::var(key).ok())
    }

    pub fn from_lookup_with_base_url<F>(base_url: Option<&str>, lookup: F) -> HarnessResult<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(|key| match (key, base_url) {
            ("SEARCH_API_BASE_URL", Some(url)) => Some(url.to_string()),
            _ => lookup(key),
        })
    }

    /// Build from an arbitrary key lookup so parsing can be tested without
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> HarnessResult<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                HarnessError::Config(format!("missing required environment variable: {key}"))
            })
        };
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let defaults = ProbeSettings::default();
        let default_query = DefaultQuery::default();

        let probes = ProbeSettings {
            health_timeout: parse_millis(get("HEALTH_TIMEOUT_MS"), defaults.health_timeout)?,
            functional_timeout: parse_millis(
                get("FUNCTIONAL_TIMEOUT_MS"),
                defaults.functional_timeout,
            )?,
            performance_timeout: parse_millis(
                get("PERFORMANCE_TIMEOUT_MS"),
                defaults.performance_timeout,
            )?,
            sweep_strategies: match get("SWEEP_STRATEGIES") {
                Some(list) => parse_list(&list),
                None => default_sweep_strategies(),
            },
            performance_targets: match get("PERFORMANCE_TARGETS") {
                Some(list) => parse_performance_targets(&list)?,
                None => default_performance_targets(),
            },
            max_fallbacks: parse_or(get("MAX_FALLBACKS"), defaults.max_fallbacks, "MAX_FALLBACKS")?,
            default_query: DefaultQuery {
                query: or_default("DEFAULT_QUERY", &default_query.query),
                area: or_default("DEFAULT_AREA", &default_query.area),
                region: get("DEFAULT_REGION").or(default_query.region),
                country: get("DEFAULT_COUNTRY").or(default_query.country),
                timeline: get("DEFAULT_TIMELINE").or(default_query.timeline),
            },
            device_id: Some(or_default("DEVICE_ID", DEFAULT_DEVICE_ID)),
            ..defaults
        };

        let slack_webhook_url = get("SLACK_WEBHOOK_URL");
        let discord_webhook_url = get("DISCORD_WEBHOOK_URL");
        let alerts = AlertConfig {
            slack_enabled: parse_or(
                get("SLACK_ALERTS_ENABLED"),
                slack_webhook_url.is_some(),
                "SLACK_ALERTS_ENABLED",
            )?,
            discord_enabled: parse_or(
                get("DISCORD_ALERTS_ENABLED"),
                discord_webhook_url.is_some(),
                "DISCORD_ALERTS_ENABLED",
            )?,
            slack_webhook_url,
            discord_webhook_url,
        };

        Ok(Config {
            api_base_url: required("SEARCH_API_BASE_URL")?,
            mongo_uri: required("MONGO_URI")?,
            mongo_db_name: or_default("MONGO_DB_NAME", "search"),
            fixture_collection: or_default("FIXTURE_COLLECTION", "query_cache"),
            probes,
            alerts,
        })
    }

    /// Only the alert settings, for reporting a failure to load the rest.
    pub fn alerts_from_env() -> AlertConfig {
        dotenv().ok();
        let get = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        AlertConfig {
            slack_webhook_url: get("SLACK_WEBHOOK_URL"),
            slack_enabled: true,
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            discord_enabled: true,
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T, key: &str) -> HarnessResult<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| HarnessError::Config(format!("invalid value for {key}: {raw:?}"))),
        None => Ok(default),
    }
}

fn parse_millis(value: Option<String>, default: Duration) -> HarnessResult<Duration> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| HarnessError::Config(format!("invalid millisecond value: {raw:?}"))),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `strategy:ms,strategy:ms`.
pub fn parse_performance_targets(raw: &str) -> HarnessResult<Vec<PerformanceTarget>> {
    parse_list(raw)
        .iter()
        .map(|pair| {
            let (strategy, ms) = pair.split_once(':').ok_or_else(|| {
                HarnessError::Config(format!("performance target {pair:?} is not strategy:ms"))
            })?;
            let expected_ms = ms.trim().parse::<u64>().map_err(|_| {
                HarnessError::Config(format!("performance target {pair:?} has a bad duration"))
            })?;
            Ok(PerformanceTarget::new(strategy.trim(), expected_ms))
        })
        .collect()
}
