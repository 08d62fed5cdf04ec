//! Structural dispatchers of the collection tree store.
//!
//! Every dispatcher is a variant of [`CollectionAction`]. Reducers work on a
//! copy of the forest and resolve their targets by index path; a path that no
//! longer resolves makes the dispatcher a logged no-op.

use serde::{Deserialize, Serialize};

use super::dedup::{EntryKind, remove_duplicate};
use super::types::{Collection, CollectionData, CollectionPatch, RequestNode, generate_ref_id};
use super::{CollectionState, CollectionStatePatch};
use crate::path::{
    find_path_by_backend_id, find_unsynced_by_ref_id, is_within, navigate, navigate_mut,
    navigate_path, navigate_path_mut, parse_path, path_after_removal, siblings_mut,
};
use crate::store::Dispatcher;

// ============================================================================
// Dispatcher payloads
// ============================================================================

/// All dispatchers of a collection tree store.
///
/// Serializes as `{ "dispatcher": "<name>", "payload": { ... } }` with
/// camelCase names, which is also the shape `dispatch_named` builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "dispatcher",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum CollectionAction<R> {
    // === Whole forest ===
    /// Replace the forest.
    SetCollections {
        /// New root collections.
        entries: Vec<Collection<R>>,
    },

    /// Append root collections.
    AppendCollections {
        /// Collections to append, in order.
        entries: Vec<Collection<R>>,
    },

    /// Append one root collection.
    AddCollection {
        /// The new collection.
        collection: Collection<R>,
    },

    /// Remove a root collection.
    RemoveCollection {
        /// Position of the collection.
        collection_index: usize,
        /// Backend id of the removed collection, used by the sync engine.
        #[serde(default, rename = "collectionID")]
        collection_id: Option<String>,
    },

    /// Merge a patch into a root collection.
    EditCollection {
        /// Position of the collection.
        collection_index: usize,
        /// Fields to replace.
        partial_collection: CollectionPatch,
    },

    // === Folders ===
    /// Append an empty folder to the collection at `path`.
    AddFolder {
        /// Folder name.
        name: String,
        /// Path of the parent collection.
        path: String,
        /// Ref id given to the new folder.
        #[serde(default = "generate_ref_id")]
        ref_id: String,
    },

    /// Append a complete folder to the collection at `path`.
    InsertFolder {
        /// Path of the parent collection.
        path: String,
        /// Folder to append.
        folder: Collection<R>,
    },

    /// Merge a patch into the folder at `path`.
    EditFolder {
        /// Path of the folder.
        path: String,
        /// Fields to replace.
        folder: CollectionPatch,
    },

    /// Remove the folder at `path`.
    RemoveFolder {
        /// Path of the folder; root paths are ignored.
        path: String,
        /// Backend id of the removed folder, used by the sync engine.
        #[serde(default, rename = "folderID")]
        folder_id: Option<String>,
    },

    /// Move a folder or root collection under another collection, or to the
    /// root when `destination_path` is `None`. The node is appended.
    MoveFolder {
        /// Path of the node to move.
        path: String,
        /// Path of the new parent.
        destination_path: Option<String>,
    },

    /// Reorder a collection among its siblings: move it before the sibling
    /// at `destination_collection_index`, or to the end when `None`.
    UpdateCollectionOrder {
        /// Path of the node to move.
        collection_index: String,
        /// Path of the sibling to insert before.
        destination_collection_index: Option<String>,
    },

    // === Requests ===
    /// Replace a request. An id-less replacement keeps the existing id.
    EditRequest {
        /// Path of the owning collection.
        path: String,
        /// Position of the request.
        request_index: usize,
        /// The new request.
        request_new: R,
    },

    /// Append a request to the collection at `path`.
    SaveRequestAs {
        /// Path of the owning collection.
        path: String,
        /// The new request.
        request: R,
    },

    /// Remove a request.
    RemoveRequest {
        /// Path of the owning collection.
        path: String,
        /// Position of the request.
        request_index: usize,
        /// Backend id of the removed request, used by the sync engine.
        #[serde(default, rename = "requestID")]
        request_id: Option<String>,
    },

    /// Move a request to the end of another collection.
    MoveRequest {
        /// Path of the owning collection.
        path: String,
        /// Position of the request.
        request_index: usize,
        /// Path of the destination collection.
        destination_path: String,
    },

    /// Reorder a request inside its collection: move it before
    /// `destination_request_index`, or to the end when `None`.
    UpdateRequestOrder {
        /// Position of the request.
        request_index: usize,
        /// Position to insert before.
        destination_request_index: Option<usize>,
        /// Path of the owning collection.
        destination_collection_path: String,
    },

    // === Reconciliation ===
    /// Drop the entry at `collection_path` if it duplicates another entry
    /// with backend id `id`.
    RemoveDuplicateCollectionOrFolder {
        /// Backend id shared by the duplicates.
        id: String,
        /// Path just assigned the id.
        collection_path: String,
        /// Which sibling list to scan.
        #[serde(default, rename = "type")]
        kind: EntryKind,
    },

    /// Record a successful collection creation.
    ///
    /// Targets the unsynced node at `path` when its ref id matches, otherwise
    /// the unsynced node carrying `ref_id` wherever it moved. Never
    /// overwrites an existing backend id.
    AssignCollectionSync {
        /// Path the node had when its creation was submitted.
        path: String,
        /// Ref id the node had when its creation was submitted.
        ref_id: Option<String>,
        /// Id assigned by the backend.
        #[serde(rename = "backendID")]
        backend_id: String,
        /// Authoritative properties replacing the local ones.
        data: CollectionData,
    },

    /// Record a successful request creation, unless the request already
    /// has an id.
    AssignRequestId {
        /// Backend id of the owning collection.
        #[serde(rename = "collectionID")]
        collection_id: String,
        /// Position of the request.
        request_index: usize,
        /// Id assigned by the backend.
        #[serde(rename = "backendID")]
        backend_id: String,
    },
}

impl<R: RequestNode> Dispatcher<CollectionState<R>> for CollectionAction<R> {
    const DISPATCHERS: &'static [&'static str] = &[
        "setCollections",
        "appendCollections",
        "addCollection",
        "removeCollection",
        "editCollection",
        "addFolder",
        "insertFolder",
        "editFolder",
        "removeFolder",
        "moveFolder",
        "updateCollectionOrder",
        "editRequest",
        "saveRequestAs",
        "removeRequest",
        "moveRequest",
        "updateRequestOrder",
        "removeDuplicateCollectionOrFolder",
        "assignCollectionSync",
        "assignRequestId",
    ];

    fn name(&self) -> &'static str {
        match self {
            CollectionAction::SetCollections { .. } => "setCollections",
            CollectionAction::AppendCollections { .. } => "appendCollections",
            CollectionAction::AddCollection { .. } => "addCollection",
            CollectionAction::RemoveCollection { .. } => "removeCollection",
            CollectionAction::EditCollection { .. } => "editCollection",
            CollectionAction::AddFolder { .. } => "addFolder",
            CollectionAction::InsertFolder { .. } => "insertFolder",
            CollectionAction::EditFolder { .. } => "editFolder",
            CollectionAction::RemoveFolder { .. } => "removeFolder",
            CollectionAction::MoveFolder { .. } => "moveFolder",
            CollectionAction::UpdateCollectionOrder { .. } => "updateCollectionOrder",
            CollectionAction::EditRequest { .. } => "editRequest",
            CollectionAction::SaveRequestAs { .. } => "saveRequestAs",
            CollectionAction::RemoveRequest { .. } => "removeRequest",
            CollectionAction::MoveRequest { .. } => "moveRequest",
            CollectionAction::UpdateRequestOrder { .. } => "updateRequestOrder",
            CollectionAction::RemoveDuplicateCollectionOrFolder { .. } => {
                "removeDuplicateCollectionOrFolder"
            }
            CollectionAction::AssignCollectionSync { .. } => "assignCollectionSync",
            CollectionAction::AssignRequestId { .. } => "assignRequestId",
        }
    }

    fn reduce(self, state: &CollectionState<R>) -> CollectionStatePatch<R> {
        let mut forest = state.state.clone();

        let changed = match self {
            CollectionAction::SetCollections { entries } => {
                forest = entries;
                true
            }
            CollectionAction::AppendCollections { entries } => {
                forest.extend(entries);
                true
            }
            CollectionAction::AddCollection { collection } => {
                forest.push(collection);
                true
            }
            CollectionAction::RemoveCollection {
                collection_index, ..
            } => remove_collection(&mut forest, collection_index),
            CollectionAction::EditCollection {
                collection_index,
                partial_collection,
            } => match forest.get_mut(collection_index) {
                Some(collection) => {
                    partial_collection.apply_to(collection);
                    true
                }
                None => unresolved("editCollection", &collection_index.to_string()),
            },
            CollectionAction::AddFolder { name, path, ref_id } => {
                let mut folder = Collection::new(name);
                folder.ref_id = Some(ref_id);
                append_folder(&mut forest, &path, folder, "addFolder")
            }
            CollectionAction::InsertFolder { path, folder } => {
                append_folder(&mut forest, &path, folder, "insertFolder")
            }
            CollectionAction::EditFolder { path, folder } => {
                match navigate_path_mut(&mut forest, &path) {
                    Some(target) => {
                        folder.apply_to(target);
                        true
                    }
                    None => unresolved("editFolder", &path),
                }
            }
            CollectionAction::RemoveFolder { path, .. } => remove_folder(&mut forest, &path),
            CollectionAction::MoveFolder {
                path,
                destination_path,
            } => move_folder(&mut forest, &path, destination_path.as_deref()),
            CollectionAction::UpdateCollectionOrder {
                collection_index,
                destination_collection_index,
            } => update_collection_order(
                &mut forest,
                &collection_index,
                destination_collection_index.as_deref(),
            ),
            CollectionAction::EditRequest {
                path,
                request_index,
                request_new,
            } => edit_request(&mut forest, &path, request_index, request_new),
            CollectionAction::SaveRequestAs { path, request } => {
                match navigate_path_mut(&mut forest, &path) {
                    Some(target) => {
                        target.requests.push(request);
                        true
                    }
                    None => unresolved("saveRequestAs", &path),
                }
            }
            CollectionAction::RemoveRequest {
                path,
                request_index,
                ..
            } => remove_request(&mut forest, &path, request_index),
            CollectionAction::MoveRequest {
                path,
                request_index,
                destination_path,
            } => move_request(&mut forest, &path, request_index, &destination_path),
            CollectionAction::UpdateRequestOrder {
                request_index,
                destination_request_index,
                destination_collection_path,
            } => update_request_order(
                &mut forest,
                &destination_collection_path,
                request_index,
                destination_request_index,
            ),
            CollectionAction::RemoveDuplicateCollectionOrFolder {
                id,
                collection_path,
                kind,
            } => remove_duplicate(&mut forest, &id, &collection_path, kind),
            CollectionAction::AssignCollectionSync {
                path,
                ref_id,
                backend_id,
                data,
            } => assign_collection_sync(&mut forest, &path, ref_id.as_deref(), backend_id, data),
            CollectionAction::AssignRequestId {
                collection_id,
                request_index,
                backend_id,
            } => assign_request_id(&mut forest, &collection_id, request_index, backend_id),
        };

        if changed {
            CollectionStatePatch {
                state: Some(forest),
            }
        } else {
            CollectionStatePatch::default()
        }
    }
}

// ============================================================================
// Reducers
// ============================================================================

fn unresolved(dispatcher: &str, path: &str) -> bool {
    log::warn!("Could not resolve path '{}'. Ignoring {} dispatch.", path, dispatcher);
    false
}

/// Remove-then-insert-before semantics shared by collection and request reorders.
fn reorder_items<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to > items.len() || from == to {
        return false;
    }
    let item = items.remove(from);
    if from < to {
        items.insert(to - 1, item);
    } else {
        items.insert(to, item);
    }
    true
}

fn move_to_end<T>(items: &mut Vec<T>, from: usize) -> bool {
    if from >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.push(item);
    true
}

fn remove_collection<R>(forest: &mut Vec<Collection<R>>, index: usize) -> bool {
    if index >= forest.len() {
        return unresolved("removeCollection", &index.to_string());
    }
    forest.remove(index);
    true
}

fn append_folder<R>(
    forest: &mut [Collection<R>],
    path: &str,
    folder: Collection<R>,
    dispatcher: &str,
) -> bool {
    match navigate_path_mut(forest, path) {
        Some(parent) => {
            parent.folders.push(folder);
            true
        }
        None => unresolved(dispatcher, path),
    }
}

fn remove_folder<R>(forest: &mut [Collection<R>], path: &str) -> bool {
    let Some(indices) = parse_path(path) else {
        return unresolved("removeFolder", path);
    };
    let Some((&index, parent)) = indices.split_last() else {
        return unresolved("removeFolder", path);
    };
    if parent.is_empty() {
        log::warn!(
            "Path '{}' is a root collection. Use removeCollection instead; skipping removeFolder.",
            path
        );
        return false;
    }

    match navigate_mut(forest, parent) {
        Some(parent) if index < parent.folders.len() => {
            parent.folders.remove(index);
            true
        }
        _ => unresolved("removeFolder", path),
    }
}

fn move_folder<R>(forest: &mut Vec<Collection<R>>, path: &str, destination: Option<&str>) -> bool {
    let Some(source) = parse_path(path).filter(|indices| !indices.is_empty()) else {
        return unresolved("moveFolder", path);
    };
    let (&index, source_parent) = match source.split_last() {
        Some(split) => split,
        None => return false,
    };

    let Some(destination) = destination else {
        if source_parent.is_empty() {
            log::warn!("Collection '{}' is already in the root. Skipping moveFolder.", path);
            return false;
        }
        let Some(parent) = navigate_mut(forest, source_parent) else {
            return unresolved("moveFolder", path);
        };
        if index >= parent.folders.len() {
            return unresolved("moveFolder", path);
        }
        let folder = parent.folders.remove(index);
        forest.push(folder);
        return true;
    };

    let Some(target) = parse_path(destination).filter(|indices| !indices.is_empty()) else {
        return unresolved("moveFolder", destination);
    };
    if is_within(&target, &source) {
        log::warn!(
            "Cannot move '{}' into itself or its descendant '{}'. Skipping moveFolder.",
            path,
            destination
        );
        return false;
    }
    if navigate(forest, &source).is_none() {
        return unresolved("moveFolder", path);
    }
    if navigate(forest, &target).is_none() {
        return unresolved("moveFolder", destination);
    }
    let Some(target) = path_after_removal(&target, &source) else {
        return false;
    };

    let Some(siblings) = siblings_mut(forest, source_parent) else {
        return unresolved("moveFolder", path);
    };
    let folder = siblings.remove(index);

    match navigate_mut(forest, &target) {
        Some(destination) => {
            destination.folders.push(folder);
            true
        }
        // Resolved above; fall back to the root so the folder is not lost.
        None => {
            forest.push(folder);
            true
        }
    }
}

fn update_collection_order<R>(
    forest: &mut Vec<Collection<R>>,
    path: &str,
    destination: Option<&str>,
) -> bool {
    let Some(source) = parse_path(path).filter(|indices| !indices.is_empty()) else {
        return unresolved("updateCollectionOrder", path);
    };
    let (&from, parent) = match source.split_last() {
        Some(split) => split,
        None => return false,
    };

    let to = match destination {
        None => None,
        Some(destination) => {
            let Some(target) = parse_path(destination).filter(|indices| !indices.is_empty())
            else {
                return unresolved("updateCollectionOrder", destination);
            };
            let (&to, target_parent) = match target.split_last() {
                Some(split) => split,
                None => return false,
            };
            if target_parent != parent {
                log::warn!(
                    "Cannot reorder '{}' before '{}': different parents. Skipping updateCollectionOrder.",
                    path,
                    destination
                );
                return false;
            }
            Some(to)
        }
    };

    let Some(siblings) = siblings_mut(forest, parent) else {
        return unresolved("updateCollectionOrder", path);
    };
    match to {
        Some(to) => reorder_items(siblings, from, to),
        None => move_to_end(siblings, from),
    }
}

fn edit_request<R: RequestNode>(
    forest: &mut [Collection<R>],
    path: &str,
    index: usize,
    mut request: R,
) -> bool {
    let Some(target) = navigate_path_mut(forest, path) else {
        return unresolved("editRequest", path);
    };
    let Some(existing) = target.requests.get_mut(index) else {
        return unresolved("editRequest", &format!("{path}/{index}"));
    };

    if request.backend_id().is_none() {
        request.set_backend_id(existing.backend_id().map(str::to_string));
    }
    *existing = request;
    true
}

fn remove_request<R>(forest: &mut [Collection<R>], path: &str, index: usize) -> bool {
    match navigate_path_mut(forest, path) {
        Some(target) if index < target.requests.len() => {
            target.requests.remove(index);
            true
        }
        _ => unresolved("removeRequest", path),
    }
}

fn move_request<R>(forest: &mut [Collection<R>], path: &str, index: usize, destination: &str) -> bool {
    if path == destination {
        return match navigate_path_mut(forest, path) {
            Some(target) => move_to_end(&mut target.requests, index),
            None => unresolved("moveRequest", path),
        };
    }

    if navigate_path(forest, destination).is_none() {
        return unresolved("moveRequest", destination);
    }
    let request = match navigate_path_mut(forest, path) {
        Some(source) if index < source.requests.len() => source.requests.remove(index),
        _ => return unresolved("moveRequest", path),
    };
    match navigate_path_mut(forest, destination) {
        Some(target) => target.requests.push(request),
        None => return unresolved("moveRequest", destination),
    }
    true
}

fn update_request_order<R>(
    forest: &mut [Collection<R>],
    path: &str,
    from: usize,
    to: Option<usize>,
) -> bool {
    let Some(target) = navigate_path_mut(forest, path) else {
        return unresolved("updateRequestOrder", path);
    };
    match to {
        Some(to) => reorder_items(&mut target.requests, from, to),
        None => move_to_end(&mut target.requests, from),
    }
}

fn assign_collection_sync<R>(
    forest: &mut [Collection<R>],
    path: &str,
    ref_id: Option<&str>,
    backend_id: String,
    data: CollectionData,
) -> bool {
    let at_path = navigate_path(forest, path).is_some_and(|node| {
        node.backend_id.is_none() && (ref_id.is_none() || node.ref_id.as_deref() == ref_id)
    });

    let resolved = if at_path {
        Some(path.to_string())
    } else {
        ref_id.and_then(|ref_id| find_unsynced_by_ref_id(forest, ref_id))
    };

    let Some(node) = resolved.and_then(|resolved| navigate_path_mut(forest, &resolved)) else {
        log::debug!(
            "No unsynced collection at '{}' or with ref id {:?}; dropping id {}",
            path,
            ref_id,
            backend_id
        );
        return false;
    };

    node.backend_id = Some(backend_id);
    node.apply_data(data);
    true
}

fn assign_request_id<R: RequestNode>(
    forest: &mut [Collection<R>],
    collection_id: &str,
    index: usize,
    backend_id: String,
) -> bool {
    let Some(path) = find_path_by_backend_id(forest, collection_id) else {
        log::debug!("Collection {} is gone; dropping request id {}", collection_id, backend_id);
        return false;
    };

    match navigate_path_mut(forest, &path).and_then(|c| c.requests.get_mut(index)) {
        Some(request) if request.backend_id().is_none() => {
            request.set_backend_id(Some(backend_id));
            true
        }
        Some(_) => false,
        None => unresolved("assignRequestId", &format!("{path}/{index}")),
    }
}
