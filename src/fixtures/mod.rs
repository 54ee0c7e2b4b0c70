use anyhow::Result;
use async_trait::async_trait;

pub mod models;
pub mod mongo;

pub use models::{Fixture, FixtureFilter};
pub use mongo::MongoFixtureStore;

/// Source of recorded query/location/result tuples.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    /// Called once before any probe runs. A failure here aborts the run.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Up to `limit` fixtures matching `filter`, most recent first.
    async fn recent(&self, filter: &FixtureFilter, limit: i64) -> Result<Vec<Fixture>>;
}
