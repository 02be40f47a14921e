//! SQLite persistence for the collector.
//!
//! Single node, single writer. Each ingestion request is written in one
//! transaction spanning the events, performance and errors tables.

pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod schema;
pub mod sites;

pub use client::SqliteStore;
pub use config::StoreConfig;
pub use insert::RecordStore;
pub use schema::Table;
pub use sites::SiteRegistry;
