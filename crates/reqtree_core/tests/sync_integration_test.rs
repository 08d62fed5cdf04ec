//! Integration tests for collection sync

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use reqtree_core::collections::{CollectionAction, CollectionPatch, ReqType};
use reqtree_core::sync::{
    BackendFailure, BackendResult, BoxFuture, CollectionBackend, CreatedCollection, CreatedRequest,
    RealtimeEvent, SyncOutcome, SyncReport, apply_realtime_event,
};
use reqtree_core::{Collection, RestCollectionStore, RestRequest, SyncConfig, SyncEngine};

/// In-memory backend (simulates the server side)
#[derive(Default)]
struct InMemoryBackend {
    inner: Mutex<Server>,
    /// Store that receives a realtime echo before each creation returns
    echo_into: Mutex<Option<Arc<RestCollectionStore>>>,
}

#[derive(Default)]
struct Server {
    next_id: usize,
    /// collection id -> parent id
    parents: HashMap<String, Option<String>>,
    /// request id -> collection id
    requests: HashMap<String, String>,
    root_creates: Vec<String>,
    fail_bulk: bool,
}

impl Server {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

impl InMemoryBackend {
    fn new() -> Self {
        Self::default()
    }

    fn failing_bulk() -> Self {
        let backend = Self::default();
        backend.inner.lock().unwrap().fail_bulk = true;
        backend
    }

    fn parent_of(&self, id: &str) -> Option<String> {
        self.inner.lock().unwrap().parents.get(id).cloned().flatten()
    }

    fn collection_of(&self, request_id: &str) -> Option<String> {
        self.inner.lock().unwrap().requests.get(request_id).cloned()
    }

    fn create(&self, name: &str, parent_id: Option<&str>) -> CreatedCollection {
        let id = {
            let mut server = self.inner.lock().unwrap();
            let id = server.allocate("C");
            server
                .parents
                .insert(id.clone(), parent_id.map(str::to_string));
            if parent_id.is_none() {
                server.root_creates.push(name.to_string());
            }
            id
        };

        if let Some(store) = self.echo_into.lock().unwrap().as_ref() {
            apply_realtime_event(
                store,
                RealtimeEvent::CollectionCreated {
                    id: id.clone(),
                    title: name.to_string(),
                    parent_id: parent_id.map(str::to_string),
                    data: None,
                },
            );
        }

        CreatedCollection { id, data: None }
    }
}

fn ok<'a, T: Send + 'a>(value: T) -> BoxFuture<'a, BackendResult<T>> {
    Box::pin(async move { Ok(value) })
}

impl CollectionBackend for InMemoryBackend {
    fn create_root_collection<'a>(
        &'a self,
        name: &'a str,
        _data: &'a str,
    ) -> BoxFuture<'a, BackendResult<CreatedCollection>> {
        ok(self.create(name, None))
    }

    fn create_child_collection<'a>(
        &'a self,
        name: &'a str,
        parent_id: &'a str,
        _data: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<CreatedCollection>> {
        ok(self.create(name, Some(parent_id)))
    }

    fn create_request<'a>(
        &'a self,
        _name: &'a str,
        data: &'a str,
        collection_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<CreatedRequest>> {
        let id = {
            let mut server = self.inner.lock().unwrap();
            let id = server.allocate("Q");
            server.requests.insert(id.clone(), collection_id.to_string());
            id
        };

        if let Some(store) = self.echo_into.lock().unwrap().as_ref() {
            let request: RestRequest = serde_json::from_str(data).unwrap();
            apply_realtime_event(
                store,
                RealtimeEvent::RequestCreated {
                    id: id.clone(),
                    collection_id: collection_id.to_string(),
                    request,
                },
            );
        }

        ok(CreatedRequest { id })
    }

    fn delete_collection<'a>(&'a self, id: &'a str) -> BoxFuture<'a, BackendResult<()>> {
        self.inner.lock().unwrap().parents.remove(id);
        ok(())
    }

    fn delete_request<'a>(&'a self, id: &'a str) -> BoxFuture<'a, BackendResult<()>> {
        self.inner.lock().unwrap().requests.remove(id);
        ok(())
    }

    fn edit_request<'a>(
        &'a self,
        _id: &'a str,
        _name: &'a str,
        _data: &'a str,
    ) -> BoxFuture<'a, BackendResult<()>> {
        ok(())
    }

    fn update_collection<'a>(
        &'a self,
        _id: &'a str,
        _name: &'a str,
        _data: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        ok(())
    }

    fn move_collection<'a>(
        &'a self,
        source_id: &'a str,
        destination_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        self.inner
            .lock()
            .unwrap()
            .parents
            .insert(source_id.to_string(), destination_id.map(str::to_string));
        ok(())
    }

    fn move_request<'a>(
        &'a self,
        _source_collection_id: &'a str,
        destination_collection_id: &'a str,
        request_id: &'a str,
        _next_request_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        self.inner
            .lock()
            .unwrap()
            .requests
            .insert(request_id.to_string(), destination_collection_id.to_string());
        ok(())
    }

    fn update_collection_order<'a>(
        &'a self,
        _id: &'a str,
        _next_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        ok(())
    }

    fn update_request_order<'a>(
        &'a self,
        _collection_id: &'a str,
        _request_id: &'a str,
        _next_request_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        ok(())
    }

    fn bulk_import_collections<'a>(
        &'a self,
        _serialized: &'a str,
        _req_type: ReqType,
        _parent_id: Option<&'a str>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        let failing = self.inner.lock().unwrap().fail_bulk;
        Box::pin(async move {
            if failing {
                Err(BackendFailure::new("payload too large"))
            } else {
                Ok(())
            }
        })
    }
}

fn setup(
    entries: Vec<Collection<RestRequest>>,
    backend: InMemoryBackend,
) -> (
    Arc<RestCollectionStore>,
    Arc<InMemoryBackend>,
    Arc<SyncEngine<RestRequest, InMemoryBackend>>,
) {
    let store = Arc::new(RestCollectionStore::new(reqtree_core::CollectionState {
        state: entries,
    }));
    let backend = Arc::new(backend);
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&backend), &SyncConfig::default());
    (store, backend, engine)
}

async fn wait(outcome: SyncOutcome) -> SyncReport {
    let SyncOutcome::Spawned(handles) = outcome else {
        panic!("expected spawned subtrees, got {outcome:?}");
    };
    let mut report = SyncReport::default();
    for handle in handles {
        let child = handle.await;
        report.collections_created += child.collections_created;
        report.requests_created += child.requests_created;
        report.failures.extend(child.failures);
    }
    report
}

fn request(name: &str) -> RestRequest {
    RestRequest::new(name, "GET", format!("/{name}"))
}

#[tokio::test]
async fn test_add_folder_under_synced_root() {
    let (store, backend, engine) =
        setup(vec![Collection::new("root").with_backend_id("R1")], InMemoryBackend::new());

    let outcome = engine
        .apply(CollectionAction::AddFolder {
            name: "child".to_string(),
            path: "0".to_string(),
            ref_id: reqtree_core::collections::generate_ref_id(),
        })
        .await
        .unwrap();

    assert!(matches!(outcome, SyncOutcome::Synced));
    assert_eq!(store.collection_at("0/0").unwrap().backend_id.as_deref(), Some("C1"));
    assert_eq!(backend.parent_of("C1").as_deref(), Some("R1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_nested_import_mirrors_tree_on_server() {
    let (store, backend, engine) = setup(vec![], InMemoryBackend::new());

    let tree = Collection::new("api")
        .with_request(request("health"))
        .with_folder(
            Collection::new("users")
                .with_request(request("list"))
                .with_request(request("get"))
                .with_folder(Collection::new("admin").with_request(request("ban"))),
        )
        .with_folder(Collection::new("orders").with_request(request("create")));

    let outcome = engine
        .apply(CollectionAction::AddCollection { collection: tree })
        .await
        .unwrap();
    let report = wait(outcome).await;

    assert!(report.failures.is_empty());
    assert_eq!(report.collections_created, 4);
    assert_eq!(report.requests_created, 5);

    let root = store.collection_at("0").unwrap();
    let root_id = root.backend_id.clone().unwrap();
    assert_eq!(backend.parent_of(&root_id), None);

    for folder in &root.folders {
        let folder_id = folder.backend_id.as_deref().unwrap();
        assert_eq!(backend.parent_of(folder_id).as_deref(), Some(root_id.as_str()));
        for request in &folder.requests {
            let request_id = request.backend_id.as_deref().unwrap();
            assert_eq!(backend.collection_of(request_id).as_deref(), Some(folder_id));
        }
    }

    let admin = store.collection_at("0/0/0").unwrap();
    assert_eq!(admin.name, "admin");
    assert_eq!(
        backend.parent_of(admin.backend_id.as_deref().unwrap()),
        root.folders[0].backend_id
    );
}

#[tokio::test]
async fn test_bulk_failure_falls_back_per_subtree() {
    let (store, backend, engine) = setup(vec![], InMemoryBackend::failing_bulk());

    let outcome = engine
        .apply(CollectionAction::AppendCollections {
            entries: vec![
                Collection::new("first"),
                Collection::new("second"),
                Collection::new("third"),
            ],
        })
        .await
        .unwrap();
    let report = wait(outcome).await;

    assert_eq!(report.collections_created, 3);
    let root_creates = backend.inner.lock().unwrap().root_creates.clone();
    assert_eq!(root_creates.len(), 3);

    let names: Vec<_> = store.collections().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
    assert!(store.collections().iter().all(|c| c.backend_id.is_some()));
}

#[tokio::test]
async fn test_realtime_echo_before_response_is_deduplicated() {
    let (store, backend, engine) = setup(vec![], InMemoryBackend::new());
    *backend.echo_into.lock().unwrap() = Some(Arc::clone(&store));

    let outcome = engine
        .apply(CollectionAction::AddCollection {
            collection: Collection::new("shared"),
        })
        .await
        .unwrap();
    wait(outcome).await;

    let forest = store.collections();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].backend_id.as_deref(), Some("C1"));
}

#[tokio::test]
async fn test_realtime_request_echo_before_response_is_deduplicated() {
    let (store, backend, engine) = setup(
        vec![Collection::new("a").with_backend_id("A")],
        InMemoryBackend::new(),
    );
    *backend.echo_into.lock().unwrap() = Some(Arc::clone(&store));

    let outcome = engine
        .apply(CollectionAction::SaveRequestAs {
            path: "0".to_string(),
            request: request("login"),
        })
        .await
        .unwrap();

    assert!(matches!(outcome, SyncOutcome::Synced));
    let ids: Vec<_> = store.collections()[0]
        .requests
        .iter()
        .map(|r| r.backend_id.clone())
        .collect();
    assert_eq!(ids, vec![Some("Q1".to_string())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_add_folder_while_another_thread_dispatches() {
    let (store, _backend, engine) = setup(
        vec![
            Collection::new("root").with_backend_id("R1"),
            Collection::new("busy").with_backend_id("B1"),
        ],
        InMemoryBackend::new(),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let writer = {
        let store = Arc::clone(&store);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut round = 0usize;
            while !stop.load(Ordering::Relaxed) {
                round += 1;
                store.edit_collection(1, CollectionPatch::rename(format!("busy {round}")));
            }
        })
    };

    for i in 0..50 {
        let outcome = engine
            .apply(CollectionAction::AddFolder {
                name: format!("folder {i}"),
                path: "0".to_string(),
                ref_id: reqtree_core::collections::generate_ref_id(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Synced), "apply {i}: {outcome:?}");
    }

    stop.store(true, Ordering::Relaxed);
    writer.join().unwrap();

    let root = store.collection_at("0").unwrap();
    assert_eq!(root.folders.len(), 50);
    assert!(root.folders.iter().all(|f| f.backend_id.is_some()));
}

#[tokio::test]
async fn test_move_then_reorder_round_trip() {
    let (store, backend, engine) = setup(
        vec![
            Collection::new("a")
                .with_backend_id("A")
                .with_folder(Collection::new("x").with_backend_id("X")),
            Collection::new("b").with_backend_id("B"),
        ],
        InMemoryBackend::new(),
    );

    let outcome = engine
        .apply(CollectionAction::MoveFolder {
            path: "0/0".to_string(),
            destination_path: Some("1".to_string()),
        })
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::Synced));
    assert_eq!(backend.parent_of("X").as_deref(), Some("B"));
    assert_eq!(store.collection_at("1/0").unwrap().name, "x");

    let err = engine
        .apply(CollectionAction::UpdateCollectionOrder {
            collection_index: "0".to_string(),
            destination_collection_index: Some("0".to_string()),
        })
        .await
        .unwrap_err();
    assert!(err.is_invalid_reorder());
}

#[tokio::test]
async fn test_local_only_config_never_calls_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "sync_collections = false\n").unwrap();
    let config = SyncConfig::load_from(&path).unwrap();

    let store = Arc::new(RestCollectionStore::with_default_collection(
        config.default_rest_collection_name.clone(),
    ));
    let backend = Arc::new(InMemoryBackend::new());
    let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&backend), &config);

    let outcome = engine
        .apply(CollectionAction::AddCollection {
            collection: Collection::new("offline"),
        })
        .await
        .unwrap();

    assert!(matches!(outcome, SyncOutcome::LocalOnly));
    assert_eq!(store.collections().len(), 2);
    assert_eq!(store.collections()[0].name, "My Collection");
    assert_eq!(backend.inner.lock().unwrap().next_id, 0);
}
