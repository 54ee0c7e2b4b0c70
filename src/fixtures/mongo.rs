use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{
    Client, Collection,
    bson::{DateTime, Document, doc},
};
use tracing::{debug, info};

use super::FixtureSource;
use super::models::{Fixture, FixtureFilter};

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixture provider backed by the search service's cache collection.
#[derive(Debug, Clone)]
pub struct MongoFixtureStore {
    client: Client,
    db_name: String,
    collection_name: String,
}

impl MongoFixtureStore {
    /// Parse the connection string and build a client. No round trip is made
    /// until `initialize`.
    pub async fn new(uri: &str, db_name: &str, collection_name: &str) -> Result<Self> {
        let mut client_options = ClientOptions::parse(uri)
            .await
            .context("Failed to parse MongoDB connection string")?;
        client_options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        client_options.app_name = Some("lookout".to_string());

        let client =
            Client::with_options(client_options).context("Failed to create MongoDB client")?;

        Ok(Self {
            client,
            db_name: db_name.to_string(),
            collection_name: collection_name.to_string(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn collection(&self) -> Collection<Fixture> {
        self.client
            .database(&self.db_name)
            .collection(&self.collection_name)
    }

    pub async fn insert_many(&self, fixtures: &[Fixture]) -> Result<()> {
        self.collection()
            .insert_many(fixtures)
            .await
            .context("Failed to insert fixtures")?;
        Ok(())
    }
}

#[async_trait]
impl FixtureSource for MongoFixtureStore {
    async fn initialize(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .context("Failed to connect to MongoDB")?;

        info!(db = %self.db_name, collection = %self.collection_name, "connected to fixture store");
        Ok(())
    }

    async fn recent(&self, filter: &FixtureFilter, limit: i64) -> Result<Vec<Fixture>> {
        let query = filter.to_document(DateTime::now());
        debug!(filter = %query, limit, "querying fixtures");

        let cursor = self
            .collection()
            .find(query)
            .sort(recency_order())
            .limit(limit)
            .await
            .context("Failed to execute fixture query")?;

        cursor
            .try_collect()
            .await
            .context("Failed to collect fixtures")
    }
}

/// Newest first. `_id` breaks ties and orders documents without `createdAt`.
fn recency_order() -> Document {
    doc! { "createdAt": -1, "_id": -1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static TEST_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn unique_test_db_name() -> String {
        let count = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        format!(
            "lookout_test_{}_{}",
            DateTime::now().timestamp_millis(),
            count
        )
    }

    #[test]
    fn test_recency_order_breaks_ties_on_id() {
        let order = recency_order();
        let keys: Vec<_> = order.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["createdAt", "_id"]);
        assert_eq!(order.get_i32("_id").unwrap(), -1);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB instance"]
    async fn test_recent_skips_expired_and_orders_newest_first() -> Result<()> {
        dotenvy::dotenv().ok();
        let uri =
            std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db_name = unique_test_db_name();
        let store = MongoFixtureStore::new(&uri, &db_name, "query_cache").await?;
        store.initialize().await?;

        let now = DateTime::now().timestamp_millis();
        let mut older = Fixture::new(
            "coffee".into(),
            "tampa-bay".into(),
            None,
            None,
            vec![Bson::Document(doc! { "id": "c1" })],
            DateTime::from_millis(now + 3_600_000),
        );
        older.created_at = Some(DateTime::from_millis(now - 10_000));
        let mut newer = older.clone();
        newer.id = mongodb::bson::oid::ObjectId::new();
        newer.prompt = "tacos".into();
        newer.created_at = Some(DateTime::from_millis(now));
        let mut expired = older.clone();
        expired.id = mongodb::bson::oid::ObjectId::new();
        expired.expire_at = DateTime::from_millis(now - 1_000);

        let mut empty = newer.clone();
        empty.id = mongodb::bson::oid::ObjectId::new();
        empty.prompt = "nothing recorded".into();
        empty.result_data.clear();
        empty.created_at = Some(DateTime::from_millis(now + 5_000));

        store.insert_many(&[older, newer, expired, empty]).await?;

        let usable = store.recent(&FixtureFilter::usable(), 1).await?;
        assert_eq!(usable[0].prompt, "tacos");

        let found = store.recent(&FixtureFilter::unexpired(), 10).await?;
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].prompt, "nothing recorded");

        let all = FixtureFilter {
            include_expired: true,
            ..Default::default()
        };
        assert_eq!(store.recent(&all, 10).await?.len(), 4);

        store.client().database(&db_name).drop().await?;
        Ok(())
    }
}
