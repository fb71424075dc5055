//! Shared test support for core consolidation tests.

pub mod stores;

pub use stores::{InMemoryRecordStore, StaticActivityDirectory};
