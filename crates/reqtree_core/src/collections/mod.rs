//! The collection tree store.
//!
//! A [`CollectionStore`] is a [`DispatchingStore`] whose state is a forest of
//! [`Collection`]s and whose dispatchers are the structural edits in
//! [`CollectionAction`]. REST and GraphQL forests are separate stores of
//! different request types:
//!
//! ```ignore
//! let rest = RestCollectionStore::with_default_collection("My Collection");
//! let folder_ref = rest.add_folder("Auth", "0");
//! rest.save_request_as("0/0", RestRequest::new("Login", "POST", "/login"));
//! ```

mod actions;
pub mod dedup;
mod types;

pub use actions::CollectionAction;
pub use dedup::EntryKind;
pub use types::{
    AuthConfig, Collection, CollectionData, CollectionPatch, CollectionVariable, GqlRequest,
    HeaderEntry, QueryParam, ReqType, RequestBody, RequestNode, RestRequest, generate_ref_id,
};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{DispatchingStore, StoreState};

/// State held by a collection store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionState<R> {
    /// Root collections, in display order.
    pub state: Vec<Collection<R>>,
}

impl<R> Default for CollectionState<R> {
    fn default() -> Self {
        Self { state: Vec::new() }
    }
}

impl<R> CollectionState<R> {
    /// A forest holding one empty collection named `name`.
    pub fn with_default_collection(name: impl Into<String>) -> Self {
        Self {
            state: vec![Collection::new(name)],
        }
    }
}

/// Partial [`CollectionState`] returned by a dispatcher.
#[derive(Debug)]
pub struct CollectionStatePatch<R> {
    /// Replacement forest, `None` to leave the forest unchanged.
    pub state: Option<Vec<Collection<R>>>,
}

impl<R> Default for CollectionStatePatch<R> {
    fn default() -> Self {
        Self { state: None }
    }
}

impl<R: RequestNode> StoreState for CollectionState<R> {
    type Patch = CollectionStatePatch<R>;

    fn merge(&self, patch: Self::Patch) -> Self {
        match patch.state {
            Some(state) => Self { state },
            None => self.clone(),
        }
    }
}

/// A reactive store owning one collection forest.
pub type CollectionStore<R> = DispatchingStore<CollectionState<R>, CollectionAction<R>>;

/// Store of REST collections.
pub type RestCollectionStore = CollectionStore<RestRequest>;

/// Store of GraphQL collections.
pub type GqlCollectionStore = CollectionStore<GqlRequest>;

impl<R: RequestNode> DispatchingStore<CollectionState<R>, CollectionAction<R>> {
    /// A store holding one empty collection named `name`.
    pub fn with_default_collection(name: impl Into<String>) -> Self {
        Self::new(CollectionState::with_default_collection(name))
    }

    /// The current forest.
    pub fn collections(&self) -> Vec<Collection<R>> {
        self.value().state.clone()
    }

    /// The collection or folder at `path`, if it resolves.
    pub fn collection_at(&self, path: &str) -> Option<Collection<R>> {
        let value: Arc<CollectionState<R>> = self.value();
        crate::path::navigate_path(&value.state, path).cloned()
    }

    /// Replace the forest.
    pub fn set_collections(&self, entries: Vec<Collection<R>>) {
        self.dispatch(CollectionAction::SetCollections { entries });
    }

    /// Append root collections.
    pub fn append_collections(&self, entries: Vec<Collection<R>>) {
        self.dispatch(CollectionAction::AppendCollections { entries });
    }

    /// Append a root collection.
    pub fn add_collection(&self, collection: Collection<R>) {
        self.dispatch(CollectionAction::AddCollection { collection });
    }

    /// Remove the root collection at `collection_index`.
    pub fn remove_collection(&self, collection_index: usize, collection_id: Option<String>) {
        self.dispatch(CollectionAction::RemoveCollection {
            collection_index,
            collection_id,
        });
    }

    /// Merge `partial_collection` into the root collection at `collection_index`.
    pub fn edit_collection(&self, collection_index: usize, partial_collection: CollectionPatch) {
        self.dispatch(CollectionAction::EditCollection {
            collection_index,
            partial_collection,
        });
    }

    /// Append an empty folder under `path`. Returns the new folder's ref id.
    pub fn add_folder(&self, name: impl Into<String>, path: impl Into<String>) -> String {
        let ref_id = generate_ref_id();
        self.dispatch(CollectionAction::AddFolder {
            name: name.into(),
            path: path.into(),
            ref_id: ref_id.clone(),
        });
        ref_id
    }

    /// Merge `folder` into the folder at `path`.
    pub fn edit_folder(&self, path: impl Into<String>, folder: CollectionPatch) {
        self.dispatch(CollectionAction::EditFolder {
            path: path.into(),
            folder,
        });
    }

    /// Remove the folder at `path`.
    pub fn remove_folder(&self, path: impl Into<String>, folder_id: Option<String>) {
        self.dispatch(CollectionAction::RemoveFolder {
            path: path.into(),
            folder_id,
        });
    }

    /// Move the node at `path` under `destination_path`, or to the root.
    pub fn move_folder(&self, path: impl Into<String>, destination_path: Option<String>) {
        self.dispatch(CollectionAction::MoveFolder {
            path: path.into(),
            destination_path,
        });
    }

    /// Move the node at `path` before its sibling at `destination_path`, or to the end.
    pub fn update_collection_order(&self, path: impl Into<String>, destination_path: Option<String>) {
        self.dispatch(CollectionAction::UpdateCollectionOrder {
            collection_index: path.into(),
            destination_collection_index: destination_path,
        });
    }

    /// Replace a request.
    pub fn edit_request(&self, path: impl Into<String>, request_index: usize, request_new: R) {
        self.dispatch(CollectionAction::EditRequest {
            path: path.into(),
            request_index,
            request_new,
        });
    }

    /// Append a request to the collection at `path`.
    pub fn save_request_as(&self, path: impl Into<String>, request: R) {
        self.dispatch(CollectionAction::SaveRequestAs {
            path: path.into(),
            request,
        });
    }

    /// Remove a request.
    pub fn remove_request(&self, path: impl Into<String>, request_index: usize, request_id: Option<String>) {
        self.dispatch(CollectionAction::RemoveRequest {
            path: path.into(),
            request_index,
            request_id,
        });
    }

    /// Move a request to the end of the collection at `destination_path`.
    pub fn move_request(
        &self,
        path: impl Into<String>,
        request_index: usize,
        destination_path: impl Into<String>,
    ) {
        self.dispatch(CollectionAction::MoveRequest {
            path: path.into(),
            request_index,
            destination_path: destination_path.into(),
        });
    }

    /// Reorder a request within the collection at `path`.
    pub fn update_request_order(
        &self,
        request_index: usize,
        destination_request_index: Option<usize>,
        path: impl Into<String>,
    ) {
        self.dispatch(CollectionAction::UpdateRequestOrder {
            request_index,
            destination_request_index,
            destination_collection_path: path.into(),
        });
    }

    /// Drop the entry at `path` if it duplicates another entry with backend id `id`.
    pub fn remove_duplicate_collection_or_folder(
        &self,
        id: impl Into<String>,
        path: impl Into<String>,
        kind: EntryKind,
    ) {
        self.dispatch(CollectionAction::RemoveDuplicateCollectionOrFolder {
            id: id.into(),
            collection_path: path.into(),
            kind,
        });
    }
}
