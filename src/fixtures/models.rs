use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::search::SearchRequest;

/// A previously recorded query, location and result set, replayed as test input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub prompt: String,
    pub area: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_click_count: Option<u32>,
    #[serde(default)]
    pub result_data: Vec<Bson>,
    pub expire_at: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Fixture {
    pub fn new(
        prompt: String,
        area: String,
        region: Option<String>,
        country: Option<String>,
        result_data: Vec<Bson>,
        expire_at: DateTime,
    ) -> Fixture {
        Fixture {
            id: ObjectId::new(),
            prompt,
            area,
            region,
            country,
            timeline: None,
            button_click_count: None,
            result_data,
            expire_at,
            created_at: Some(DateTime::now()),
        }
    }

    pub fn is_expired(&self, now: DateTime) -> bool {
        self.expire_at <= now
    }

    pub fn to_request(&self) -> SearchRequest {
        SearchRequest::new(self.prompt.clone())
            .with_location(
                Some(self.area.clone()),
                self.region.clone(),
                self.country.clone(),
            )
            .with_timeline(self.timeline.clone())
            .with_button_click_count(self.button_click_count)
    }
}

/// Narrowing applied when asking the store for fixtures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureFilter {
    pub area: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub timeline: Option<String>,
    pub button_click_count: Option<u32>,
    pub include_expired: bool,
    /// Only fixtures with at least one recorded result.
    pub require_results: bool,
}

impl FixtureFilter {
    pub fn unexpired() -> FixtureFilter {
        FixtureFilter::default()
    }

    /// Unexpired fixtures with recorded results, fit for replay.
    pub fn usable() -> FixtureFilter {
        FixtureFilter {
            require_results: true,
            ..FixtureFilter::default()
        }
    }

    /// Accepts `fixture` if it would be returned by a store query at `now`.
    pub fn matches(&self, fixture: &Fixture, now: DateTime) -> bool {
        fn eq(want: &Option<String>, have: Option<&String>) -> bool {
            want.as_ref().is_none_or(|w| have == Some(w))
        }

        (self.include_expired || !fixture.is_expired(now))
            && (!self.require_results || !fixture.result_data.is_empty())
            && eq(&self.area, Some(&fixture.area))
            && eq(&self.region, fixture.region.as_ref())
            && eq(&self.country, fixture.country.as_ref())
            && eq(&self.timeline, fixture.timeline.as_ref())
            && self
                .button_click_count
                .is_none_or(|c| fixture.button_click_count == Some(c))
    }

    pub fn to_document(&self, now: DateTime) -> Document {
        let mut filter = Document::new();
        if !self.include_expired {
            filter.insert("expireAt", doc! { "$gt": now });
        }
        if self.require_results {
            filter.insert("resultData.0", doc! { "$exists": true });
        }
        if let Some(area) = &self.area {
            filter.insert("area", area.as_str());
        }
        if let Some(region) = &self.region {
            filter.insert("region", region.as_str());
        }
        if let Some(country) = &self.country {
            filter.insert("country", country.as_str());
        }
        if let Some(timeline) = &self.timeline {
            filter.insert("timeline", timeline.as_str());
        }
        if let Some(count) = self.button_click_count {
            filter.insert("buttonClickCount", count as i64);
        }
        filter
    }
}
