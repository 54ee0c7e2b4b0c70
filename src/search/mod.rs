pub mod client;
pub mod models;

pub use client::{HttpSearchClient, SearchApi};
pub use models::{SearchRequest, SearchResponse, strategies};
