//! Backend synchronization.
//!
//! Two directions:
//!
//! - **Outgoing**: [`SyncEngine::apply`] edits the store, then pushes the
//!   edit through a [`CollectionBackend`]. Ids assigned by the backend are
//!   written back through the store's dispatchers.
//! - **Incoming**: [`apply_realtime_event`] applies changes made elsewhere,
//!   straight to the store.
//!
//! ```ignore
//! let store = Arc::new(RestCollectionStore::with_default_collection("My Collection"));
//! let engine = SyncEngine::new(Arc::clone(&store), Arc::new(client), &SyncConfig::default());
//!
//! match engine.apply(CollectionAction::AddCollection { collection }).await? {
//!     SyncOutcome::Spawned(handles) => {
//!         for handle in handles {
//!             let report = handle.await;
//!             log::info!("created {} collections", report.collections_created);
//!         }
//!     }
//!     other => log::debug!("{:?}", other),
//! }
//! ```

mod backend;
mod engine;
mod realtime;

pub use backend::{
    BackendFailure, BackendResult, BoxFuture, CollectionBackend, CreatedCollection, CreatedRequest,
};
pub use engine::{SubtreeHandle, SyncEngine, SyncFailure, SyncOutcome, SyncReport};
pub use realtime::{RealtimeEvent, apply_realtime_event};
