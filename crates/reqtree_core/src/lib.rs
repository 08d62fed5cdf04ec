#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Collection tree store (forest, dispatchers, deduplication)
pub mod collections;

/// Configuration options
pub mod config;

/// Error (common error types)
pub mod error;

/// Index path utilities
pub mod path;

/// Reactive dispatching store
pub mod store;

/// Backend sync (outgoing edits, realtime ingest)
pub mod sync;

#[cfg(test)]
mod test_utils;

pub use collections::{
    Collection, CollectionAction, CollectionState, CollectionStore, GqlCollectionStore, GqlRequest,
    RestCollectionStore, RestRequest,
};
pub use config::SyncConfig;
pub use error::{ReqtreeError, Result, SerializableError};
pub use sync::{CollectionBackend, SyncEngine, SyncOutcome};
