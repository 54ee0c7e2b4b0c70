use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Strategy names understood by `/api/search/{strategy}`.
pub mod strategies {
    pub const QUERY_CACHE: &str = "query_cache";
    pub const VECTOR_SEARCH: &str = "vector_search";
    pub const HYBRID_RAG: &str = "hybrid_rag";
    pub const WEB_SEARCH: &str = "web_search";
    /// Lets the API pick, walking its own fallback chain.
    pub const WATERFALL: &str = "waterfall";
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_click_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_fallbacks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fallbacks: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> SearchRequest {
        SearchRequest {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_location(
        mut self,
        area: Option<String>,
        region: Option<String>,
        country: Option<String>,
    ) -> SearchRequest {
        self.area = area;
        self.region = region;
        self.country = country;
        self
    }

    pub fn with_timeline(mut self, timeline: Option<String>) -> SearchRequest {
        self.timeline = timeline;
        self
    }

    pub fn with_button_click_count(mut self, count: Option<u32>) -> SearchRequest {
        self.button_click_count = count;
        self
    }

    pub fn with_device_id(mut self, device_id: Option<String>) -> SearchRequest {
        self.device_id = device_id;
        self
    }

    /// Pin the request to the target strategy.
    pub fn without_fallbacks(mut self) -> SearchRequest {
        self.enable_fallbacks = Some(false);
        self.max_fallbacks = None;
        self
    }

    pub fn with_fallbacks(mut self, max_fallbacks: u32) -> SearchRequest {
        self.enable_fallbacks = Some(true);
        self.max_fallbacks = Some(max_fallbacks);
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.query.trim().is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Timing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_ms: Option<u64>,
    #[serde(default)]
    pub total_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flyer_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_filtered: Option<bool>,
}

/// Decoded body of `/api/search/{strategy}`.
///
/// Items in `data` stay opaque; the harness only ever counts them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_chain: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    /// Failed response in the shape the client hands back for transport and
    /// protocol errors.
    pub fn failure(strategy: &str, error: impl Into<String>) -> SearchResponse {
        SearchResponse {
            success: false,
            data: Vec::new(),
            source: strategy.to_string(),
            strategy: strategy.to_string(),
            original_strategy: None,
            fallback_used: None,
            fallback_chain: None,
            timing: Some(Timing::default()),
            meta: None,
            timestamp: None,
            error: Some(error.into()),
        }
    }

    /// Enforce `success == false` implies an error message.
    pub fn normalized(mut self) -> SearchResponse {
        if !self.success && self.error.as_deref().is_none_or(|e| e.trim().is_empty()) {
            self.error = Some("search API reported failure without an error message".into());
        }
        self
    }

    pub fn item_count(&self) -> usize {
        self.data.len()
    }

    pub fn cache_hit(&self) -> Option<bool> {
        self.meta.as_ref().and_then(|m| m.cache_hit)
    }

    pub fn server_total_ms(&self) -> Option<u64> {
        self.timing.as_ref().map(|t| t.total_ms)
    }

    /// Number of hops taken beyond the originally requested strategy.
    pub fn fallback_hops(&self) -> usize {
        let chain = self.fallback_chain.as_deref().unwrap_or_default();
        match chain.first() {
            Some(first) if Some(first) == self.original_strategy.as_ref() => chain.len() - 1,
            _ => chain.len(),
        }
    }
}
