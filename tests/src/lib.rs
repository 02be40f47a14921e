//! Shared setup for the collector integration tests.

pub mod fixtures;
pub mod mocks;
pub mod setup;
