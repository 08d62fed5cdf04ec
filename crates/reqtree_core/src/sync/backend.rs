//! The backend contract consumed by the sync engine.
//!
//! The wire protocol belongs to whatever client implements
//! [`CollectionBackend`]; the engine only sees ids, names and opaque JSON
//! strings going in, and ids or a [`BackendFailure`] coming out.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::collections::ReqType;

/// A boxed future that is `Send`, so backend calls can run on spawned tasks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An expected backend failure. The reason is opaque at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct BackendFailure {
    /// Why the call failed, as reported by the backend client.
    pub reason: String,
}

impl BackendFailure {
    /// Create a failure with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The two-armed result every backend call returns.
pub type BackendResult<T> = std::result::Result<T, BackendFailure>;

/// Response to a collection creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCollection {
    /// Id assigned by the backend.
    pub id: String,
    /// Canonical `CollectionData` JSON, if the backend echoes it.
    pub data: Option<String>,
}

/// Response to a request creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRequest {
    /// Id assigned by the backend.
    pub id: String,
}

/// Remote collection operations.
///
/// Implementations must be shareable across tasks: the engine holds the
/// backend in an `Arc` and calls it from spawned subtree syncs.
pub trait CollectionBackend: Send + Sync + 'static {
    /// Create a root collection.
    fn create_root_collection<'a>(
        &'a self,
        name: &'a str,
        data: &'a str,
    ) -> BoxFuture<'a, BackendResult<CreatedCollection>>;

    /// Create a collection under `parent_id`.
    fn create_child_collection<'a>(
        &'a self,
        name: &'a str,
        parent_id: &'a str,
        data: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<CreatedCollection>>;

    /// Create a request in `collection_id`. `data` is the serialized request.
    fn create_request<'a>(
        &'a self,
        name: &'a str,
        data: &'a str,
        collection_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<CreatedRequest>>;

    /// Delete a collection and everything below it.
    fn delete_collection<'a>(&'a self, id: &'a str) -> BoxFuture<'a, BackendResult<()>>;

    /// Delete a request.
    fn delete_request<'a>(&'a self, id: &'a str) -> BoxFuture<'a, BackendResult<()>>;

    /// Replace a request's name and payload.
    fn edit_request<'a>(
        &'a self,
        id: &'a str,
        name: &'a str,
        data: &'a str,
    ) -> BoxFuture<'a, BackendResult<()>>;

    /// Replace a collection's name and, if given, its data.
    fn update_collection<'a>(
        &'a self,
        id: &'a str,
        name: &'a str,
        data: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>>;

    /// Move a collection under `destination_id`, or to the root when `None`.
    fn move_collection<'a>(
        &'a self,
        source_id: &'a str,
        destination_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>>;

    /// Move a request into `destination_collection_id`, before
    /// `next_request_id` or at the end when `None`.
    fn move_request<'a>(
        &'a self,
        source_collection_id: &'a str,
        destination_collection_id: &'a str,
        request_id: &'a str,
        next_request_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>>;

    /// Place a collection before `next_id`, or at the end when `None`.
    fn update_collection_order<'a>(
        &'a self,
        id: &'a str,
        next_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>>;

    /// Place a request before `next_request_id`, or at the end when `None`.
    fn update_request_order<'a>(
        &'a self,
        collection_id: &'a str,
        request_id: &'a str,
        next_request_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>>;

    /// Create whole subtrees in one call.
    ///
    /// `serialized` is a JSON array of `{name, data, folders, requests}`.
    fn bulk_import_collections<'a>(
        &'a self,
        serialized: &'a str,
        req_type: ReqType,
        parent_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>>;
}
