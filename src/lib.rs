pub mod alert;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod orchestrator;
pub mod probes;
pub mod report;
pub mod result;
pub mod search;
