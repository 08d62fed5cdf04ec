//! Test utilities for reqtree_core
//!
//! This module provides shared testing infrastructure, including a recording
//! backend that can be used across all sync test modules.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::collections::ReqType;
use crate::sync::{
    BackendFailure, BackendResult, BoxFuture, CollectionBackend, CreatedCollection, CreatedRequest,
};

/// A backend call as seen by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CreateRootCollection {
        name: String,
    },
    CreateChildCollection {
        name: String,
        parent_id: String,
    },
    CreateRequest {
        name: String,
        collection_id: String,
    },
    DeleteCollection {
        id: String,
    },
    DeleteRequest {
        id: String,
    },
    EditRequest {
        id: String,
        name: String,
    },
    UpdateCollection {
        id: String,
        name: String,
    },
    MoveCollection {
        source_id: String,
        destination_id: Option<String>,
    },
    MoveRequest {
        source_collection_id: String,
        destination_collection_id: String,
        request_id: String,
        next_request_id: Option<String>,
    },
    UpdateCollectionOrder {
        id: String,
        next_id: Option<String>,
    },
    UpdateRequestOrder {
        collection_id: String,
        request_id: String,
        next_request_id: Option<String>,
    },
    BulkImport {
        serialized: String,
        req_type: ReqType,
    },
}

#[derive(Default)]
struct MockState {
    calls: Vec<RecordedCall>,
    collection_ids: VecDeque<String>,
    request_ids: VecDeque<String>,
    next_collection: usize,
    next_request: usize,
    failing_collection_creates: usize,
    fail_bulk: bool,
    fail_all: Option<String>,
    echo_data: Option<String>,
}

impl MockState {
    fn record(&mut self, call: RecordedCall) -> BackendResult<()> {
        self.calls.push(call);
        match &self.fail_all {
            Some(reason) => Err(BackendFailure::new(reason.clone())),
            None => Ok(()),
        }
    }

    fn create_collection(&mut self, call: RecordedCall) -> BackendResult<CreatedCollection> {
        self.record(call)?;
        if self.failing_collection_creates > 0 {
            self.failing_collection_creates -= 1;
            return Err(BackendFailure::new("create rejected"));
        }

        let id = self.collection_ids.pop_front().unwrap_or_else(|| {
            self.next_collection += 1;
            format!("C{}", self.next_collection)
        });
        Ok(CreatedCollection {
            id,
            data: self.echo_data.clone(),
        })
    }
}

/// A recording backend for testing.
///
/// Every call is recorded, including failed ones. Created entities get ids
/// from the queues filled by `push_*_id`, falling back to `C1, C2, ...` for
/// collections and `Q1, Q2, ...` for requests.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a backend that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the id the next collection creation returns.
    pub fn push_collection_id(&self, id: &str) {
        self.state.lock().unwrap().collection_ids.push_back(id.to_string());
    }

    /// Queue the id the next request creation returns.
    pub fn push_request_id(&self, id: &str) {
        self.state.lock().unwrap().request_ids.push_back(id.to_string());
    }

    /// Reject the next `count` collection creations.
    pub fn fail_next_collection_creates(&self, count: usize) {
        self.state.lock().unwrap().failing_collection_creates = count;
    }

    /// Reject every bulk import.
    pub fn fail_bulk_import(&self) {
        self.state.lock().unwrap().fail_bulk = true;
    }

    /// Reject every call with `reason`.
    pub fn fail_all(&self, reason: &str) {
        self.state.lock().unwrap().fail_all = Some(reason.to_string());
    }

    /// Return `data` as canonical collection data on creations.
    pub fn set_echo_data(&self, data: &str) {
        self.state.lock().unwrap().echo_data = Some(data.to_string());
    }

    /// All calls so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&RecordedCall) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

impl CollectionBackend for MockBackend {
    fn create_root_collection<'a>(
        &'a self,
        name: &'a str,
        _data: &'a str,
    ) -> BoxFuture<'a, BackendResult<CreatedCollection>> {
        let result = self.with_state(|state| {
            state.create_collection(RecordedCall::CreateRootCollection {
                name: name.to_string(),
            })
        });
        Box::pin(async move { result })
    }

    fn create_child_collection<'a>(
        &'a self,
        name: &'a str,
        parent_id: &'a str,
        _data: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<CreatedCollection>> {
        let result = self.with_state(|state| {
            state.create_collection(RecordedCall::CreateChildCollection {
                name: name.to_string(),
                parent_id: parent_id.to_string(),
            })
        });
        Box::pin(async move { result })
    }

    fn create_request<'a>(
        &'a self,
        name: &'a str,
        _data: &'a str,
        collection_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<CreatedRequest>> {
        let result = self.with_state(|state| {
            state.record(RecordedCall::CreateRequest {
                name: name.to_string(),
                collection_id: collection_id.to_string(),
            })?;
            let id = state.request_ids.pop_front().unwrap_or_else(|| {
                state.next_request += 1;
                format!("Q{}", state.next_request)
            });
            Ok(CreatedRequest { id })
        });
        Box::pin(async move { result })
    }

    fn delete_collection<'a>(&'a self, id: &'a str) -> BoxFuture<'a, BackendResult<()>> {
        let result = self.with_state(|state| {
            state.record(RecordedCall::DeleteCollection { id: id.to_string() })
        });
        Box::pin(async move { result })
    }

    fn delete_request<'a>(&'a self, id: &'a str) -> BoxFuture<'a, BackendResult<()>> {
        let result =
            self.with_state(|state| state.record(RecordedCall::DeleteRequest { id: id.to_string() }));
        Box::pin(async move { result })
    }

    fn edit_request<'a>(
        &'a self,
        id: &'a str,
        name: &'a str,
        _data: &'a str,
    ) -> BoxFuture<'a, BackendResult<()>> {
        let result = self.with_state(|state| {
            state.record(RecordedCall::EditRequest {
                id: id.to_string(),
                name: name.to_string(),
            })
        });
        Box::pin(async move { result })
    }

    fn update_collection<'a>(
        &'a self,
        id: &'a str,
        name: &'a str,
        _data: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        let result = self.with_state(|state| {
            state.record(RecordedCall::UpdateCollection {
                id: id.to_string(),
                name: name.to_string(),
            })
        });
        Box::pin(async move { result })
    }

    fn move_collection<'a>(
        &'a self,
        source_id: &'a str,
        destination_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        let result = self.with_state(|state| {
            state.record(RecordedCall::MoveCollection {
                source_id: source_id.to_string(),
                destination_id: destination_id.map(str::to_string),
            })
        });
        Box::pin(async move { result })
    }

    fn move_request<'a>(
        &'a self,
        source_collection_id: &'a str,
        destination_collection_id: &'a str,
        request_id: &'a str,
        next_request_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        let result = self.with_state(|state| {
            state.record(RecordedCall::MoveRequest {
                source_collection_id: source_collection_id.to_string(),
                destination_collection_id: destination_collection_id.to_string(),
                request_id: request_id.to_string(),
                next_request_id: next_request_id.map(str::to_string),
            })
        });
        Box::pin(async move { result })
    }

    fn update_collection_order<'a>(
        &'a self,
        id: &'a str,
        next_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        let result = self.with_state(|state| {
            state.record(RecordedCall::UpdateCollectionOrder {
                id: id.to_string(),
                next_id: next_id.map(str::to_string),
            })
        });
        Box::pin(async move { result })
    }

    fn update_request_order<'a>(
        &'a self,
        collection_id: &'a str,
        request_id: &'a str,
        next_request_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        let result = self.with_state(|state| {
            state.record(RecordedCall::UpdateRequestOrder {
                collection_id: collection_id.to_string(),
                request_id: request_id.to_string(),
                next_request_id: next_request_id.map(str::to_string),
            })
        });
        Box::pin(async move { result })
    }

    fn bulk_import_collections<'a>(
        &'a self,
        serialized: &'a str,
        req_type: ReqType,
        _parent_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        let result = self.with_state(|state| {
            state.record(RecordedCall::BulkImport {
                serialized: serialized.to_string(),
                req_type,
            })?;
            if state.fail_bulk {
                return Err(BackendFailure::new("bulk import rejected"));
            }
            Ok(())
        });
        Box::pin(async move { result })
    }
}
