//! Realtime ingest.
//!
//! Changes made by other clients arrive as [`RealtimeEvent`]s from the
//! backend's subscription feed. They are applied straight to the store, so
//! nothing is synced back. Entities are located by backend id; positions in
//! the event stream mean nothing locally.

use serde::{Deserialize, Serialize};

use crate::collections::{
    Collection, CollectionAction, CollectionData, CollectionPatch, CollectionStore, RequestNode,
};
use crate::path::{
    find_path_by_backend_id, find_request_by_backend_id, last_index, navigate_path, parent_path,
    parse_path,
};

/// A change delivered by the backend's subscription feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum RealtimeEvent<R> {
    /// A collection or folder was created.
    CollectionCreated {
        /// Backend id of the new collection.
        id: String,
        /// Display name.
        title: String,
        /// Parent collection, `None` for a root collection.
        #[serde(default, rename = "parentID")]
        parent_id: Option<String>,
        /// `CollectionData` JSON, if delivered.
        #[serde(default)]
        data: Option<String>,
    },
    /// A collection or folder was renamed or had its data replaced.
    CollectionUpdated {
        /// Backend id.
        id: String,
        /// Display name.
        title: String,
        /// `CollectionData` JSON, if delivered.
        #[serde(default)]
        data: Option<String>,
    },
    /// A collection or folder was deleted.
    CollectionRemoved {
        /// Backend id.
        id: String,
    },
    /// A collection or folder was moved under another one, or to the root.
    CollectionMoved {
        /// Backend id.
        id: String,
        /// New parent, `None` for the root.
        #[serde(default, rename = "parentID")]
        parent_id: Option<String>,
    },
    /// A collection or folder was placed before a sibling, or at the end.
    CollectionOrderUpdated {
        /// Backend id.
        id: String,
        /// The sibling it now precedes, `None` for the end.
        #[serde(default, rename = "nextID")]
        next_id: Option<String>,
    },
    /// A request was created.
    RequestCreated {
        /// Backend id of the new request.
        id: String,
        /// Collection holding it.
        #[serde(rename = "collectionID")]
        collection_id: String,
        /// The request.
        request: R,
    },
    /// A request was edited.
    RequestUpdated {
        /// Backend id.
        id: String,
        /// Collection holding it.
        #[serde(rename = "collectionID")]
        collection_id: String,
        /// The request as it now is.
        request: R,
    },
    /// A request was deleted.
    RequestDeleted {
        /// Backend id.
        id: String,
    },
    /// A request was moved into a collection, before a sibling or at the end.
    RequestMoved {
        /// Backend id.
        id: String,
        /// Destination collection.
        #[serde(rename = "collectionID")]
        collection_id: String,
        /// The request it now precedes, `None` for the end.
        #[serde(default, rename = "nextID")]
        next_id: Option<String>,
    },
}

/// Apply a realtime event to `store`.
///
/// Events for entities already present (a creation this instance made) and
/// events that already took effect locally are ignored, as are events whose
/// entities cannot be found. Returns `true` if an edit was dispatched.
pub fn apply_realtime_event<R: RequestNode>(
    store: &CollectionStore<R>,
    event: RealtimeEvent<R>,
) -> bool {
    let value = store.value();
    let forest = &value.state;

    let action = match event {
        RealtimeEvent::CollectionCreated {
            id,
            title,
            parent_id,
            data,
        } => {
            if find_path_by_backend_id(forest, &id).is_some() {
                log::debug!("[Realtime] collection {} already present", id);
                return false;
            }
            let mut collection = Collection::new(title).with_backend_id(id);
            if let Some(data) = parse_data(data.as_deref()) {
                collection.apply_data(data);
            }

            match parent_id {
                None => CollectionAction::AddCollection { collection },
                Some(parent_id) => {
                    let Some(path) = find_path_by_backend_id(forest, &parent_id) else {
                        log::debug!("[Realtime] parent {} of new folder not found", parent_id);
                        return false;
                    };
                    CollectionAction::InsertFolder {
                        path,
                        folder: collection,
                    }
                }
            }
        }

        RealtimeEvent::CollectionUpdated { id, title, data } => {
            let Some(path) = locate_collection(forest, &id) else {
                return false;
            };
            let mut patch = CollectionPatch::rename(title);
            if let Some(data) = parse_data(data.as_deref()) {
                patch.auth = Some(data.auth);
                patch.headers = Some(data.headers);
                patch.variables = Some(data.variables);
            }

            match root_index(&path) {
                Some(collection_index) => CollectionAction::EditCollection {
                    collection_index,
                    partial_collection: patch,
                },
                None => CollectionAction::EditFolder {
                    path,
                    folder: patch,
                },
            }
        }

        RealtimeEvent::CollectionRemoved { id } => {
            let Some(path) = locate_collection(forest, &id) else {
                return false;
            };
            match root_index(&path) {
                Some(collection_index) => CollectionAction::RemoveCollection {
                    collection_index,
                    collection_id: Some(id),
                },
                None => CollectionAction::RemoveFolder {
                    path,
                    folder_id: Some(id),
                },
            }
        }

        RealtimeEvent::CollectionMoved { id, parent_id } => {
            let Some(path) = locate_collection(forest, &id) else {
                return false;
            };
            let destination = match parent_id {
                None => None,
                Some(parent_id) => match locate_collection(forest, &parent_id) {
                    Some(destination) => Some(destination),
                    None => return false,
                },
            };

            let current_parent = parent_path(&path);
            if destination.as_deref().unwrap_or("") == current_parent {
                log::debug!("[Realtime] move of {} already applied", id);
                return false;
            }
            CollectionAction::MoveFolder {
                path,
                destination_path: destination,
            }
        }

        RealtimeEvent::CollectionOrderUpdated { id, next_id } => {
            let Some(path) = locate_collection(forest, &id) else {
                return false;
            };
            let Some(index) = last_index(&path) else {
                return false;
            };

            match next_id {
                Some(next_id) => {
                    let Some(next) = locate_collection(forest, &next_id) else {
                        return false;
                    };
                    if parent_path(&next) != parent_path(&path) {
                        log::debug!("[Realtime] {} and {} are not siblings locally", id, next_id);
                        return false;
                    }
                    if last_index(&next) == Some(index + 1) {
                        return false;
                    }
                    CollectionAction::UpdateCollectionOrder {
                        collection_index: path,
                        destination_collection_index: Some(next),
                    }
                }
                None => {
                    let sibling_count = match parse_path(&parent_path(&path)) {
                        Some(parent) if parent.is_empty() => forest.len(),
                        _ => navigate_path(forest, &parent_path(&path))
                            .map_or(0, |parent| parent.folders.len()),
                    };
                    if index + 1 == sibling_count {
                        return false;
                    }
                    CollectionAction::UpdateCollectionOrder {
                        collection_index: path,
                        destination_collection_index: None,
                    }
                }
            }
        }

        RealtimeEvent::RequestCreated {
            id,
            collection_id,
            mut request,
        } => {
            if find_request_by_backend_id(forest, &id).is_some() {
                log::debug!("[Realtime] request {} already present", id);
                return false;
            }
            let Some(path) = locate_collection(forest, &collection_id) else {
                return false;
            };
            request.set_backend_id(Some(id));
            CollectionAction::SaveRequestAs { path, request }
        }

        RealtimeEvent::RequestUpdated {
            id, mut request, ..
        } => {
            let Some((path, request_index)) = locate_request(forest, &id) else {
                return false;
            };
            request.set_backend_id(Some(id));
            CollectionAction::EditRequest {
                path,
                request_index,
                request_new: request,
            }
        }

        RealtimeEvent::RequestDeleted { id } => {
            let Some((path, request_index)) = locate_request(forest, &id) else {
                return false;
            };
            CollectionAction::RemoveRequest {
                path,
                request_index,
                request_id: Some(id),
            }
        }

        RealtimeEvent::RequestMoved {
            id,
            collection_id,
            next_id,
        } => {
            let Some((path, request_index)) = locate_request(forest, &id) else {
                return false;
            };
            let Some(destination) = locate_collection(forest, &collection_id) else {
                return false;
            };
            let destination_len = navigate_path(forest, &destination).map_or(0, |c| c.requests.len());

            let Some(next_id) = next_id else {
                if path == destination && request_index + 1 == destination_len {
                    return false;
                }
                store.dispatch(CollectionAction::MoveRequest {
                    path,
                    request_index,
                    destination_path: destination,
                });
                return true;
            };

            let Some((next_path, next_index)) = locate_request(forest, &next_id) else {
                return false;
            };
            if next_path != destination {
                log::debug!("[Realtime] request {} is not in collection {}", next_id, collection_id);
                return false;
            }

            if path == destination {
                if request_index + 1 == next_index {
                    return false;
                }
                CollectionAction::UpdateRequestOrder {
                    request_index,
                    destination_request_index: Some(next_index),
                    destination_collection_path: destination,
                }
            } else {
                // Appended at the end first, then placed before `next`.
                store.dispatch(CollectionAction::MoveRequest {
                    path,
                    request_index,
                    destination_path: destination.clone(),
                });
                store.dispatch(CollectionAction::UpdateRequestOrder {
                    request_index: destination_len,
                    destination_request_index: Some(next_index),
                    destination_collection_path: destination,
                });
                return true;
            }
        }
    };

    store.dispatch(action);
    true
}

fn parse_data(data: Option<&str>) -> Option<CollectionData> {
    match CollectionData::from_json(data?) {
        Ok(data) => Some(data),
        Err(e) => {
            log::warn!("[Realtime] ignoring unreadable collection data: {}", e);
            None
        }
    }
}

fn root_index(path: &str) -> Option<usize> {
    match parse_path(path)?.as_slice() {
        [index] => Some(*index),
        _ => None,
    }
}

fn locate_collection<R>(forest: &[Collection<R>], id: &str) -> Option<String> {
    let path = find_path_by_backend_id(forest, id);
    if path.is_none() {
        log::debug!("[Realtime] collection {} not found locally", id);
    }
    path
}

fn locate_request<R: RequestNode>(forest: &[Collection<R>], id: &str) -> Option<(String, usize)> {
    let found = find_request_by_backend_id(forest, id);
    if found.is_none() {
        log::debug!("[Realtime] request {} not found locally", id);
    }
    found
}
