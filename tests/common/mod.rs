#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::Router;
use mongodb::bson::{Bson, DateTime, doc};
use serde_json::json;

use lookout::alert::{Alert, AlertSink};
use lookout::error::{HarnessError, HarnessResult};
use lookout::fixtures::{Fixture, FixtureFilter, FixtureSource};
use lookout::probes::{ProbeContext, ProbeSettings};
use lookout::search::{SearchApi, SearchRequest, SearchResponse};

/// Scripted answer for one strategy.
#[derive(Clone)]
pub enum Reply {
    Respond(SearchResponse),
    Fail(String),
}

pub struct StubSearchApi {
    replies: HashMap<String, (Reply, Duration)>,
    healthy: Result<bool, String>,
    calls: Mutex<Vec<(String, SearchRequest)>>,
}

impl StubSearchApi {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            healthy: Ok(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(mut self, strategy: &str, reply: Reply) -> Self {
        self.replies
            .insert(strategy.to_string(), (reply, Duration::ZERO));
        self
    }

    /// Reply after `delay` of (tokio) time has passed.
    pub fn reply_after(mut self, strategy: &str, reply: Reply, delay: Duration) -> Self {
        self.replies.insert(strategy.to_string(), (reply, delay));
        self
    }

    pub fn health(mut self, healthy: Result<bool, String>) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn calls(&self) -> Vec<(String, SearchRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchApi for StubSearchApi {
    async fn invoke(
        &self,
        strategy: &str,
        request: &SearchRequest,
        _timeout: Duration,
    ) -> Result<SearchResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((strategy.to_string(), request.clone()));

        let (reply, delay) = self
            .replies
            .get(strategy)
            .cloned()
            .unwrap_or_else(|| (Reply::Respond(ok_response(strategy, 1)), Duration::ZERO));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(message) => Err(anyhow!(message)),
        }
    }

    async fn health_check(&self, _timeout: Duration) -> Result<bool> {
        self.healthy.clone().map_err(|e| anyhow!(e))
    }
}

#[derive(Default)]
pub struct StubFixtures {
    pub fixtures: Vec<Fixture>,
    pub fail_initialize: bool,
    pub fail_query: bool,
    pub queries: AtomicUsize,
}

impl StubFixtures {
    pub fn with(fixtures: Vec<Fixture>) -> Self {
        Self {
            fixtures,
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FixtureSource for StubFixtures {
    async fn initialize(&self) -> Result<()> {
        if self.fail_initialize {
            Err(anyhow!("connection refused"))
        } else {
            Ok(())
        }
    }

    async fn recent(&self, filter: &FixtureFilter, limit: i64) -> Result<Vec<Fixture>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_query {
            return Err(anyhow!("fixture store unavailable"));
        }
        let now = DateTime::now();
        Ok(self
            .fixtures
            .iter()
            .filter(|f| filter.matches(f, now))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

pub struct RecordingSink {
    name: String,
    fail: bool,
    pub received: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, alert: &Alert) -> HarnessResult<()> {
        self.received.lock().unwrap().push(alert.clone());
        if self.fail {
            Err(HarnessError::Delivery {
                sink: self.name.clone(),
                message: "webhook returned 500".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

pub fn ok_response(strategy: &str, items: usize) -> SearchResponse {
    let data: Vec<_> = (0..items).map(|i| json!({ "id": format!("r{i}") })).collect();
    serde_json::from_value(json!({
        "success": true,
        "data": data,
        "source": strategy,
        "strategy": strategy,
        "timing": { "total_ms": 42 },
        "meta": { "cache_hit": true }
    }))
    .unwrap()
}

pub fn fixture(prompt: &str, expire_offset_ms: i64, results: usize) -> Fixture {
    let expire_at = DateTime::from_millis(DateTime::now().timestamp_millis() + expire_offset_ms);
    Fixture::new(
        prompt.to_string(),
        "tampa-bay".to_string(),
        Some("FL".to_string()),
        Some("US".to_string()),
        (0..results)
            .map(|i| Bson::Document(doc! { "id": format!("r{}", i + 1) }))
            .collect(),
        expire_at,
    )
}

pub fn context(api: Arc<StubSearchApi>, fixtures: Arc<StubFixtures>) -> ProbeContext {
    ProbeContext::new(api, fixtures, ProbeSettings::default())
}

pub fn context_with(
    api: Arc<StubSearchApi>,
    fixtures: Arc<StubFixtures>,
    settings: ProbeSettings,
) -> ProbeContext {
    ProbeContext::new(api, fixtures, settings)
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve test router");
    });
    format!("http://{addr}")
}
