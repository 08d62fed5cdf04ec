//! Sync engine orchestrator.
//!
//! The [`SyncEngine`] is the entry point for structural edits that should
//! reach the backend. Each edit is applied to the local store first
//! (optimistic), then translated into backend calls. Identifiers the backend
//! assigns are written back through the store's dispatchers, so they are
//! ordered with every other edit.
//!
//! Subtree creation fans out: once a collection has its id, each request and
//! each child folder is created by its own spawned task. `apply` does not wait
//! for those; it hands back a [`SubtreeHandle`] per subtree that can be
//! awaited for a [`SyncReport`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::task::JoinHandle;

use super::backend::{BackendFailure, BackendResult, BoxFuture, CollectionBackend};
use crate::collections::{
    Collection, CollectionAction, CollectionData, CollectionStore, EntryKind, RequestNode,
    generate_ref_id,
};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::path::{
    child_path, find_path_by_backend_id, find_unsynced_by_ref_id, last_index, navigate_path,
    parent_path, parse_path, paths_after_moving, reorder_indices, siblings,
};

// ============================================================================
// Outcomes
// ============================================================================

/// What `apply` did beyond the local edit.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Syncing is disabled; only the local edit happened.
    LocalOnly,
    /// Nothing to send: the dispatcher has no backend side, or the ids it
    /// needs are missing (unsynced nodes, unresolved paths).
    Skipped,
    /// Every backend call succeeded.
    Synced,
    /// The backend call failed. The local edit is kept.
    Failed(BackendFailure),
    /// Subtree creation was started in the background.
    Spawned(Vec<SubtreeHandle>),
}

impl SyncOutcome {
    /// Whether this outcome is [`SyncOutcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }
}

/// A backend call that failed during a subtree sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Local path of the node whose creation failed, as known when submitted.
    pub path: String,
    /// Reason given by the backend.
    pub reason: String,
}

/// Totals for one subtree sync, including every descendant task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Collections and folders created.
    pub collections_created: usize,
    /// Requests created.
    pub requests_created: usize,
    /// Failed creations. Descendants of a failed collection are not attempted.
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    fn failed(path: &str, reason: impl Into<String>) -> Self {
        Self {
            failures: vec![SyncFailure {
                path: path.to_string(),
                reason: reason.into(),
            }],
            ..Self::default()
        }
    }

    /// Whether nothing failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn absorb(&mut self, other: SyncReport) {
        self.collections_created += other.collections_created;
        self.requests_created += other.requests_created;
        self.failures.extend(other.failures);
    }
}

/// Handle to a background subtree sync.
///
/// Awaiting it yields the subtree's [`SyncReport`]; by then the store holds
/// every backfilled id of the subtree. Dropping it does not cancel the
/// sync.
#[derive(Debug)]
pub struct SubtreeHandle {
    path: String,
    handle: JoinHandle<SyncReport>,
}

impl SubtreeHandle {
    /// Local path of the subtree root when the sync started.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the subtree sync, descendants included, has finished.
    ///
    /// Once finished, every id the backend returned for the subtree has been
    /// dispatched into the store. Later edits (a realtime removal, say) may
    /// of course have changed those nodes since.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for SubtreeHandle {
    type Output = SyncReport;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<SyncReport> {
        let polled = Pin::new(&mut self.handle).poll(cx);
        match polled {
            Poll::Ready(Ok(report)) => Poll::Ready(report),
            Poll::Ready(Err(err)) => Poll::Ready(SyncReport::failed(&self.path, err.to_string())),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ============================================================================
// Bulk import payload
// ============================================================================

#[derive(Serialize)]
struct BulkEntry<'a, R> {
    name: &'a str,
    data: String,
    folders: Vec<BulkEntry<'a, R>>,
    requests: &'a [R],
}

fn bulk_entry<R: RequestNode>(collection: &Collection<R>) -> Result<BulkEntry<'_, R>> {
    Ok(BulkEntry {
        name: &collection.name,
        data: collection.data().to_json()?,
        folders: collection
            .folders
            .iter()
            .map(bulk_entry)
            .collect::<Result<Vec<_>>>()?,
        requests: &collection.requests,
    })
}

fn ensure_ref_ids<R>(collection: &mut Collection<R>) {
    if collection.ref_id.is_none() {
        collection.ref_id = Some(generate_ref_id());
    }
    collection.folders.iter_mut().for_each(ensure_ref_ids);
}

fn outcome(operation: &str, result: BackendResult<()>) -> SyncOutcome {
    match result {
        Ok(()) => SyncOutcome::Synced,
        Err(failure) => {
            log::warn!("Backend {} failed: {}", operation, failure);
            SyncOutcome::Failed(failure)
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Pushes local structural edits of one collection forest to a backend.
pub struct SyncEngine<R: RequestNode, B: CollectionBackend> {
    store: Arc<CollectionStore<R>>,
    backend: Arc<B>,
    sync_enabled: AtomicBool,
    bulk_import: bool,
}

impl<R: RequestNode, B: CollectionBackend> SyncEngine<R, B> {
    /// Create an engine over `store` and `backend`.
    ///
    /// Syncing starts enabled or disabled according to
    /// `config.sync_collections`.
    pub fn new(store: Arc<CollectionStore<R>>, backend: Arc<B>, config: &SyncConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            backend,
            sync_enabled: AtomicBool::new(config.sync_collections),
            bulk_import: config.bulk_import,
        })
    }

    /// The store this engine edits.
    pub fn store(&self) -> &Arc<CollectionStore<R>> {
        &self.store
    }

    /// The backend this engine calls.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Whether edits are currently pushed to the backend.
    pub fn is_sync_enabled(&self) -> bool {
        self.sync_enabled.load(Ordering::Acquire)
    }

    /// Switch syncing on or off. While off, `apply` only edits the store.
    pub fn set_sync_enabled(&self, enabled: bool) {
        self.sync_enabled.store(enabled, Ordering::Release);
        log::info!("Collection sync {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Apply a structural edit locally, then sync it.
    ///
    /// Fails with `InvalidReorder` before touching the store if a reorder
    /// names the same source and destination. Backend failures do not fail
    /// the call; they are reported in the returned [`SyncOutcome`].
    ///
    /// Must be called from within a tokio runtime: subtree creation is
    /// spawned.
    pub async fn apply(self: &Arc<Self>, mut action: CollectionAction<R>) -> Result<SyncOutcome> {
        validate(&action)?;
        self.prepare(&mut action);

        if !self.is_sync_enabled() {
            self.store.dispatch(action);
            return Ok(SyncOutcome::LocalOnly);
        }

        match action {
            CollectionAction::AppendCollections { entries } => self.append_collections(entries).await,

            CollectionAction::AddCollection { collection } => {
                let snapshot = collection.clone();
                self.store.dispatch(CollectionAction::AddCollection { collection });
                let last = self.store.value().state.len().saturating_sub(1);
                let path = self.locate_unsynced(snapshot.ref_id.as_deref(), last.to_string());
                Ok(SyncOutcome::Spawned(vec![self.spawn_subtree(snapshot, path, None)]))
            }

            CollectionAction::RemoveCollection {
                collection_index,
                collection_id,
            } => {
                self.store.dispatch(CollectionAction::RemoveCollection {
                    collection_index,
                    collection_id: collection_id.clone(),
                });
                self.delete_collection(collection_id).await
            }

            CollectionAction::EditCollection {
                collection_index,
                partial_collection,
            } => {
                self.store.dispatch(CollectionAction::EditCollection {
                    collection_index,
                    partial_collection,
                });
                self.update_collection(&collection_index.to_string()).await
            }

            CollectionAction::AddFolder { name, path, ref_id } => {
                self.store.dispatch(CollectionAction::AddFolder {
                    name: name.clone(),
                    path: path.clone(),
                    ref_id: ref_id.clone(),
                });
                self.create_folder(&name, &path, ref_id).await
            }

            CollectionAction::InsertFolder { path, folder } => {
                let snapshot = folder.clone();
                self.store.dispatch(CollectionAction::InsertFolder {
                    path: path.clone(),
                    folder,
                });

                let parent = self.store.collection_at(&path);
                let Some((parent_id, count)) =
                    parent.and_then(|p| p.backend_id.map(|id| (id, p.folders.len())))
                else {
                    return Ok(SyncOutcome::Skipped);
                };
                let folder_path = self.locate_unsynced(
                    snapshot.ref_id.as_deref(),
                    child_path(&path, count.saturating_sub(1)),
                );
                Ok(SyncOutcome::Spawned(vec![self.spawn_subtree(
                    snapshot,
                    folder_path,
                    Some(parent_id),
                )]))
            }

            CollectionAction::EditFolder { path, folder } => {
                self.store.dispatch(CollectionAction::EditFolder {
                    path: path.clone(),
                    folder,
                });
                self.update_collection(&path).await
            }

            CollectionAction::RemoveFolder { path, folder_id } => {
                let is_root = parse_path(&path).is_some_and(|indices| indices.len() < 2);
                self.store.dispatch(CollectionAction::RemoveFolder {
                    path,
                    folder_id: folder_id.clone(),
                });
                if is_root {
                    return Ok(SyncOutcome::Skipped);
                }
                self.delete_collection(folder_id).await
            }

            CollectionAction::MoveFolder {
                path,
                destination_path,
            } => {
                let source_id = self.store.collection_at(&path).and_then(|c| c.backend_id);
                self.store.dispatch(CollectionAction::MoveFolder {
                    path: path.clone(),
                    destination_path: destination_path.clone(),
                });
                self.move_collection(&path, destination_path.as_deref(), source_id)
                    .await
            }

            CollectionAction::UpdateCollectionOrder {
                collection_index,
                destination_collection_index,
            } => {
                let source_id = self
                    .store
                    .collection_at(&collection_index)
                    .and_then(|c| c.backend_id);
                self.store.dispatch(CollectionAction::UpdateCollectionOrder {
                    collection_index: collection_index.clone(),
                    destination_collection_index: destination_collection_index.clone(),
                });
                self.update_collection_order(
                    &collection_index,
                    destination_collection_index.as_deref(),
                    source_id,
                )
                .await
            }

            CollectionAction::EditRequest {
                path,
                request_index,
                request_new,
            } => {
                self.store.dispatch(CollectionAction::EditRequest {
                    path: path.clone(),
                    request_index,
                    request_new,
                });
                self.edit_request(&path, request_index).await
            }

            CollectionAction::SaveRequestAs { path, request } => {
                let data = serde_json::to_string(&request)?;
                let saved = request.clone();
                self.store.dispatch(CollectionAction::SaveRequestAs {
                    path: path.clone(),
                    request,
                });
                self.create_request(&path, &saved, &data).await
            }

            CollectionAction::RemoveRequest {
                path,
                request_index,
                request_id,
            } => {
                self.store.dispatch(CollectionAction::RemoveRequest {
                    path,
                    request_index,
                    request_id: request_id.clone(),
                });
                match request_id {
                    Some(id) => {
                        log::debug!("Deleting request {}", id);
                        Ok(outcome("delete_request", self.backend.delete_request(&id).await))
                    }
                    None => Ok(SyncOutcome::Skipped),
                }
            }

            CollectionAction::MoveRequest {
                path,
                request_index,
                destination_path,
            } => {
                let request_id = self.request_id_at(&path, request_index);
                self.store.dispatch(CollectionAction::MoveRequest {
                    path: path.clone(),
                    request_index,
                    destination_path: destination_path.clone(),
                });
                self.move_or_reorder_request(request_index, &path, &destination_path, None, request_id)
                    .await
            }

            CollectionAction::UpdateRequestOrder {
                request_index,
                destination_request_index,
                destination_collection_path,
            } => {
                let request_id = self.request_id_at(&destination_collection_path, request_index);
                self.store.dispatch(CollectionAction::UpdateRequestOrder {
                    request_index,
                    destination_request_index,
                    destination_collection_path: destination_collection_path.clone(),
                });
                self.move_or_reorder_request(
                    request_index,
                    &destination_collection_path,
                    &destination_collection_path,
                    destination_request_index,
                    request_id,
                )
                .await
            }

            local @ (CollectionAction::SetCollections { .. }
            | CollectionAction::RemoveDuplicateCollectionOrFolder { .. }
            | CollectionAction::AssignCollectionSync { .. }
            | CollectionAction::AssignRequestId { .. }) => {
                self.store.dispatch(local);
                Ok(SyncOutcome::Skipped)
            }
        }
    }

    /// Fill in what the sync side needs but the caller may have left out:
    /// ref ids on new nodes and the ids of nodes about to be removed.
    fn prepare(&self, action: &mut CollectionAction<R>) {
        let value = self.store.value();
        match action {
            CollectionAction::AddCollection { collection } => ensure_ref_ids(collection),
            CollectionAction::AppendCollections { entries } => {
                entries.iter_mut().for_each(ensure_ref_ids)
            }
            CollectionAction::InsertFolder { folder, .. } => ensure_ref_ids(folder),
            CollectionAction::RemoveCollection {
                collection_index,
                collection_id,
            } if collection_id.is_none() => {
                *collection_id = value
                    .state
                    .get(*collection_index)
                    .and_then(|c| c.backend_id.clone());
            }
            CollectionAction::RemoveFolder { path, folder_id } if folder_id.is_none() => {
                *folder_id = navigate_path(&value.state, path).and_then(|c| c.backend_id.clone());
            }
            CollectionAction::RemoveRequest {
                path,
                request_index,
                request_id,
            } if request_id.is_none() => {
                *request_id = self.request_id_at(path, *request_index);
            }
            _ => {}
        }
    }

    fn request_id_at(&self, path: &str, index: usize) -> Option<String> {
        let value = self.store.value();
        navigate_path(&value.state, path)
            .and_then(|c| c.requests.get(index))
            .and_then(|r| r.backend_id().map(str::to_string))
    }

    /// Current path of the unsynced node carrying `ref_id`, else `fallback`.
    fn locate_unsynced(&self, ref_id: Option<&str>, fallback: String) -> String {
        let value = self.store.value();
        ref_id
            .and_then(|ref_id| find_unsynced_by_ref_id(&value.state, ref_id))
            .unwrap_or(fallback)
    }

    // === Creation ===

    async fn append_collections(self: &Arc<Self>, entries: Vec<Collection<R>>) -> Result<SyncOutcome> {
        if entries.is_empty() {
            self.store.dispatch(CollectionAction::AppendCollections { entries });
            return Ok(SyncOutcome::Skipped);
        }

        let batch = if self.bulk_import {
            let serialized = entries.iter().map(bulk_entry).collect::<Result<Vec<_>>>()?;
            Some(serde_json::to_string(&serialized)?)
        } else {
            None
        };

        let snapshot = entries.clone();
        self.store.dispatch(CollectionAction::AppendCollections { entries });

        if let Some(batch) = batch {
            match self
                .backend
                .bulk_import_collections(&batch, R::REQ_TYPE, None)
                .await
            {
                // Ids arrive later through realtime events or a full resync.
                Ok(()) => return Ok(SyncOutcome::Synced),
                Err(failure) => log::warn!(
                    "Bulk import of {} collections failed ({}); creating them one by one",
                    snapshot.len(),
                    failure
                ),
            }
        }

        let start = self.store.value().state.len().saturating_sub(snapshot.len());
        let handles = snapshot
            .into_iter()
            .enumerate()
            .map(|(offset, collection)| {
                let path =
                    self.locate_unsynced(collection.ref_id.as_deref(), (start + offset).to_string());
                self.spawn_subtree(collection, path, None)
            })
            .collect();
        Ok(SyncOutcome::Spawned(handles))
    }

    async fn create_folder(&self, name: &str, path: &str, ref_id: String) -> Result<SyncOutcome> {
        let value = self.store.value();
        let Some(parent_id) = navigate_path(&value.state, path).and_then(|c| c.backend_id.clone())
        else {
            return Ok(SyncOutcome::Skipped);
        };
        let Some(folder_path) = find_unsynced_by_ref_id(&value.state, &ref_id) else {
            return Ok(SyncOutcome::Skipped);
        };
        let data = navigate_path(&value.state, &folder_path)
            .map(Collection::data)
            .unwrap_or_default()
            .to_json()?;

        log::debug!("Creating folder '{}' under {}", name, parent_id);
        match self
            .backend
            .create_child_collection(name, &parent_id, Some(&data))
            .await
        {
            Ok(created) => {
                self.record_collection(&folder_path, Some(ref_id), created.id, created.data);
                Ok(SyncOutcome::Synced)
            }
            Err(failure) => Ok(outcome("create_child_collection", Err(failure))),
        }
    }

    async fn create_request(&self, path: &str, request: &R, data: &str) -> Result<SyncOutcome> {
        let Some(collection_id) = self.store.collection_at(path).and_then(|c| c.backend_id) else {
            return Ok(SyncOutcome::Skipped);
        };

        let created = match self
            .backend
            .create_request(request.name(), data, &collection_id)
            .await
        {
            Ok(created) => created,
            Err(failure) => return Ok(outcome("create_request", Err(failure))),
        };

        // Re-resolve: the collection may have moved while the call was pending.
        let value = self.store.value();
        let Some(collection_path) = find_path_by_backend_id(&value.state, &collection_id) else {
            return Ok(SyncOutcome::Synced);
        };
        // A realtime copy may already sit after the local request, so target
        // the saved request itself: the last id-less entry equal to it.
        let Some(index) = navigate_path(&value.state, &collection_path).and_then(|c| {
            let unsynced = |r: &R| r.backend_id().is_none();
            c.requests
                .iter()
                .rposition(|r| unsynced(r) && r == request)
                .or_else(|| c.requests.iter().rposition(unsynced))
        }) else {
            log::debug!("No unsynced request left in {}; dropping id {}", collection_id, created.id);
            return Ok(SyncOutcome::Synced);
        };

        self.store.dispatch(CollectionAction::AssignRequestId {
            collection_id,
            request_index: index,
            backend_id: created.id.clone(),
        });
        self.store.dispatch(CollectionAction::RemoveDuplicateCollectionOrFolder {
            id: created.id,
            collection_path: child_path(&collection_path, index),
            kind: EntryKind::Request,
        });
        Ok(SyncOutcome::Synced)
    }

    /// Write a creation response into the store and drop a realtime duplicate.
    ///
    /// Returns the path the id was assigned at.
    fn record_collection(
        &self,
        path: &str,
        ref_id: Option<String>,
        backend_id: String,
        data: Option<String>,
    ) -> String {
        let data = match data.as_deref().map(CollectionData::from_json) {
            Some(Ok(data)) => data,
            Some(Err(e)) => {
                log::warn!("Ignoring unreadable collection data for {}: {}", backend_id, e);
                CollectionData::synthesized()
            }
            None => CollectionData::synthesized(),
        };

        let resolved = {
            let value = self.store.value();
            ref_id
                .as_deref()
                .and_then(|ref_id| find_unsynced_by_ref_id(&value.state, ref_id))
                .unwrap_or_else(|| path.to_string())
        };

        self.store.dispatch(CollectionAction::AssignCollectionSync {
            path: resolved.clone(),
            ref_id,
            backend_id: backend_id.clone(),
            data,
        });
        self.store.dispatch(CollectionAction::RemoveDuplicateCollectionOrFolder {
            id: backend_id,
            collection_path: resolved.clone(),
            kind: EntryKind::Collection,
        });
        resolved
    }

    fn spawn_subtree(
        self: &Arc<Self>,
        collection: Collection<R>,
        path: String,
        parent_id: Option<String>,
    ) -> SubtreeHandle {
        let handle = tokio::spawn(Arc::clone(self).sync_subtree(collection, path.clone(), parent_id));
        SubtreeHandle { path, handle }
    }

    /// Create `collection`, then every request and folder below it.
    fn sync_subtree(
        self: Arc<Self>,
        collection: Collection<R>,
        path: String,
        parent_id: Option<String>,
    ) -> BoxFuture<'static, SyncReport> {
        Box::pin(async move {
            let data = match collection.data().to_json() {
                Ok(data) => data,
                Err(e) => return SyncReport::failed(&path, e.to_string()),
            };

            let created = match parent_id.as_deref() {
                None => self.backend.create_root_collection(&collection.name, &data).await,
                Some(parent_id) => {
                    self.backend
                        .create_child_collection(&collection.name, parent_id, Some(&data))
                        .await
                }
            };
            let created = match created {
                Ok(created) => created,
                Err(failure) => {
                    log::warn!("Creating collection at '{}' failed: {}", path, failure);
                    return SyncReport::failed(&path, failure.reason);
                }
            };

            let mut report = SyncReport {
                collections_created: 1,
                ..SyncReport::default()
            };
            let collection_id = created.id.clone();
            let path = self.record_collection(
                &path,
                collection.ref_id.clone(),
                created.id,
                created.data,
            );

            let mut tasks = Vec::new();
            for (index, request) in collection.requests.into_iter().enumerate() {
                let engine = Arc::clone(&self);
                let collection_id = collection_id.clone();
                let request_path = child_path(&path, index);
                tasks.push(tokio::spawn(async move {
                    engine.sync_request(request, index, collection_id, request_path).await
                }));
            }
            for (index, folder) in collection.folders.into_iter().enumerate() {
                tasks.push(tokio::spawn(Arc::clone(&self).sync_subtree(
                    folder,
                    child_path(&path, index),
                    Some(collection_id.clone()),
                )));
            }

            for task in tasks {
                match task.await {
                    Ok(child) => report.absorb(child),
                    Err(e) => report.absorb(SyncReport::failed(&path, e.to_string())),
                }
            }
            report
        })
    }

    async fn sync_request(
        &self,
        request: R,
        index: usize,
        collection_id: String,
        request_path: String,
    ) -> SyncReport {
        let data = match serde_json::to_string(&request) {
            Ok(data) => data,
            Err(e) => return SyncReport::failed(&request_path, e.to_string()),
        };

        match self
            .backend
            .create_request(request.name(), &data, &collection_id)
            .await
        {
            Ok(created) => {
                self.store.dispatch(CollectionAction::AssignRequestId {
                    collection_id,
                    request_index: index,
                    backend_id: created.id,
                });
                SyncReport {
                    requests_created: 1,
                    ..SyncReport::default()
                }
            }
            Err(failure) => {
                log::warn!("Creating request at '{}' failed: {}", request_path, failure);
                SyncReport::failed(&request_path, failure.reason)
            }
        }
    }

    // === Updates and deletes ===

    async fn update_collection(&self, path: &str) -> Result<SyncOutcome> {
        let Some(collection) = self.store.collection_at(path) else {
            return Ok(SyncOutcome::Skipped);
        };
        let Some(id) = collection.backend_id.as_deref() else {
            return Ok(SyncOutcome::Skipped);
        };
        let data = collection.data().to_json()?;

        log::debug!("Updating collection {}", id);
        Ok(outcome(
            "update_collection",
            self.backend
                .update_collection(id, &collection.name, Some(&data))
                .await,
        ))
    }

    async fn delete_collection(&self, id: Option<String>) -> Result<SyncOutcome> {
        match id {
            Some(id) => {
                log::debug!("Deleting collection {}", id);
                Ok(outcome(
                    "delete_collection",
                    self.backend.delete_collection(&id).await,
                ))
            }
            None => Ok(SyncOutcome::Skipped),
        }
    }

    async fn edit_request(&self, path: &str, index: usize) -> Result<SyncOutcome> {
        let Some(request) = self
            .store
            .collection_at(path)
            .and_then(|c| c.requests.get(index).cloned())
        else {
            return Ok(SyncOutcome::Skipped);
        };
        let Some(id) = request.backend_id() else {
            return Ok(SyncOutcome::Skipped);
        };
        let data = serde_json::to_string(&request)?;

        Ok(outcome(
            "edit_request",
            self.backend.edit_request(id, request.name(), &data).await,
        ))
    }

    // === Moves and reorders ===

    async fn move_collection(
        &self,
        path: &str,
        destination: Option<&str>,
        source_id: Option<String>,
    ) -> Result<SyncOutcome> {
        let value = self.store.value();
        let moved = paths_after_moving(path, destination, &value.state);

        let moved_id = moved
            .source
            .as_deref()
            .and_then(|source| navigate_path(&value.state, source))
            .and_then(|c| c.backend_id.clone());
        // A rejected move leaves some other node at the computed position.
        let Some(source_id) = source_id.filter(|id| moved_id.as_deref() == Some(id.as_str())) else {
            return Ok(SyncOutcome::Skipped);
        };

        let destination_id = match (destination, moved.destination.as_deref()) {
            (None, _) => None,
            (Some(_), Some(new_destination)) => {
                match navigate_path(&value.state, new_destination).and_then(|c| c.backend_id.clone()) {
                    Some(id) => Some(id),
                    None => return Ok(SyncOutcome::Skipped),
                }
            }
            (Some(_), None) => return Ok(SyncOutcome::Skipped),
        };

        log::debug!("Moving collection {} under {:?}", source_id, destination_id);
        Ok(outcome(
            "move_collection",
            self.backend
                .move_collection(&source_id, destination_id.as_deref())
                .await,
        ))
    }

    async fn update_collection_order(
        &self,
        path: &str,
        destination: Option<&str>,
        source_id: Option<String>,
    ) -> Result<SyncOutcome> {
        let Some(source) = parse_path(path) else {
            return Ok(SyncOutcome::Skipped);
        };
        let Some((&from, parent)) = source.split_last() else {
            return Ok(SyncOutcome::Skipped);
        };
        if let Some(destination) = destination
            && parent_path(destination) != parent_path(path)
        {
            return Ok(SyncOutcome::Skipped);
        }

        let value = self.store.value();
        let Some(siblings) = siblings(&value.state, parent) else {
            return Ok(SyncOutcome::Skipped);
        };

        let (new_source, new_next) = match destination {
            Some(destination) => {
                let Some(to) = last_index(destination) else {
                    return Ok(SyncOutcome::Skipped);
                };
                let (new_source, new_next) = reorder_indices(from, to)?;
                (new_source, Some(new_next))
            }
            None => (siblings.len().saturating_sub(1), None),
        };

        let moved_id = siblings.get(new_source).and_then(|c| c.backend_id.clone());
        let Some(source_id) = source_id.filter(|id| moved_id.as_deref() == Some(id.as_str())) else {
            return Ok(SyncOutcome::Skipped);
        };
        let next_id = new_next
            .and_then(|next| siblings.get(next))
            .and_then(|c| c.backend_id.clone());

        log::debug!("Placing collection {} before {:?}", source_id, next_id);
        Ok(outcome(
            "update_collection_order",
            self.backend
                .update_collection_order(&source_id, next_id.as_deref())
                .await,
        ))
    }

    /// Sync a request move (`next_index == None`: appended at the
    /// destination) or a reorder before `next_index`.
    async fn move_or_reorder_request(
        &self,
        request_index: usize,
        path: &str,
        destination_path: &str,
        next_index: Option<usize>,
        expected_id: Option<String>,
    ) -> Result<SyncOutcome> {
        let value = self.store.value();
        let source_id = navigate_path(&value.state, path).and_then(|c| c.backend_id.clone());
        let Some(destination) = navigate_path(&value.state, destination_path) else {
            return Ok(SyncOutcome::Skipped);
        };
        let destination_id = destination.backend_id.clone();

        let id_at = |index: usize| {
            destination
                .requests
                .get(index)
                .and_then(|r| r.backend_id().map(str::to_string))
        };
        let (request_id, next_id) = match next_index {
            Some(next) => {
                let (new_request, new_next) = reorder_indices(request_index, next)?;
                (id_at(new_request), id_at(new_next))
            }
            None => (
                destination.requests.len().checked_sub(1).and_then(id_at),
                None,
            ),
        };

        let (Some(source_id), Some(destination_id), Some(request_id)) =
            (source_id, destination_id, request_id)
        else {
            return Ok(SyncOutcome::Skipped);
        };
        if expected_id.as_deref() != Some(request_id.as_str()) {
            return Ok(SyncOutcome::Skipped);
        }

        if path == destination_path {
            log::debug!("Placing request {} before {:?}", request_id, next_id);
            Ok(outcome(
                "update_request_order",
                self.backend
                    .update_request_order(&destination_id, &request_id, next_id.as_deref())
                    .await,
            ))
        } else {
            log::debug!("Moving request {} to collection {}", request_id, destination_id);
            Ok(outcome(
                "move_request",
                self.backend
                    .move_request(&source_id, &destination_id, &request_id, next_id.as_deref())
                    .await,
            ))
        }
    }
}

/// Reject reorders that name the same position twice.
fn validate<R>(action: &CollectionAction<R>) -> Result<()> {
    match action {
        CollectionAction::UpdateCollectionOrder {
            collection_index,
            destination_collection_index: Some(destination),
        } => {
            if let (Some(from), Some(to)) = (last_index(collection_index), last_index(destination))
                && parent_path(collection_index) == parent_path(destination)
            {
                reorder_indices(from, to)?;
            }
            Ok(())
        }
        CollectionAction::UpdateRequestOrder {
            request_index,
            destination_request_index: Some(destination),
            ..
        } => reorder_indices(*request_index, *destination).map(|_| ()),
        _ => Ok(()),
    }
}
