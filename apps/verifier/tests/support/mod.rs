//! In-process entity backend for integration tests.
//!
//! Serves `/entities` CRUD over a real TCP socket so requests go through the
//! same reqwest stack as against a deployed backend. Faults can be injected to
//! drive each failure path of the client and the scenario.

use axum::{
    extract::{Multipart, Path, Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use entity_client::EntityClient;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// A request as seen by the stub.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

/// Shape of the last multipart upload received.
#[derive(Debug, Clone, Default)]
pub struct RecordedUpload {
    pub body_content_type: Option<String>,
    pub body_file_name: Option<String>,
    pub file_name: Option<String>,
    pub file_content_type: Option<String>,
    pub file_content: Vec<u8>,
}

/// Deviations the stub can be told to produce.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Status returned by create instead of 201. The entity is still stored.
    pub create_status: Option<StatusCode>,
    /// Overwrite one key in create/update responses (not in storage).
    pub tamper: Option<(String, Value)>,
    /// Sleep before answering create/update.
    pub write_delay: Option<Duration>,
    /// Update answers normally but does not persist the new representation.
    pub drop_updates: bool,
    /// List always answers `[]`.
    pub empty_list: bool,
    /// Delete answers 200 but keeps the entity.
    pub ignore_delete: bool,
    /// Serve different bytes than were uploaded.
    pub corrupt_files: bool,
    /// Reject requests whose `Authorization` header differs from this value.
    pub required_authorization: Option<String>,
}

#[derive(Default)]
struct Inner {
    entities: BTreeMap<String, Map<String, Value>>,
    files: HashMap<String, Vec<u8>>,
    requests: Vec<RecordedRequest>,
    last_upload: Option<RecordedUpload>,
    faults: Faults,
}

#[derive(Clone, Default)]
pub struct StubState {
    inner: Arc<Mutex<Inner>>,
}

impl StubState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("stub state poisoned")
    }

    fn faults(&self) -> Faults {
        self.lock().faults.clone()
    }
}

pub struct TestBackend {
    pub base_url: String,
    pub state: StubState,
    server: tokio::task::JoinHandle<()>,
}

impl TestBackend {
    pub async fn start() -> anyhow::Result<Self> {
        let state = StubState::default();
        let app = router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            server,
        })
    }

    /// Client with a bearer token, pointed at this backend.
    pub fn client(&self) -> anyhow::Result<EntityClient> {
        Ok(EntityClient::new(
            &self.base_url,
            [("Authorization", "Bearer test-token")],
        )?)
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state.lock().faults = faults;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// `"METHOD /path"` for every request so far, in order.
    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }

    pub fn last_upload(&self) -> Option<RecordedUpload> {
        self.state.lock().last_upload.clone()
    }

    pub fn stored_ids(&self) -> Vec<String> {
        self.state.lock().entities.keys().cloned().collect()
    }

    /// Insert a record directly, bypassing HTTP.
    pub fn seed(&self, id: &str, record: Value) {
        let mut map = match record {
            Value::Object(map) => map,
            other => panic!("seed record must be an object, got {other}"),
        };
        map.insert("id".to_string(), Value::String(id.to_string()));
        self.state.lock().entities.insert(id.to_string(), map);
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Run `f` against a fresh backend.
pub async fn with_test_backend<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(&'a TestBackend) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + 'a>>,
{
    let backend = TestBackend::start().await?;
    f(&backend).await
}

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "{context}: unexpected status");
}

fn router(state: StubState) -> Router {
    Router::new()
        .route("/entities", get(list_entities))
        .route("/entities/", post(create_entity))
        .route(
            "/entities/:id",
            get(get_entity).put(update_entity).delete(delete_entity),
        )
        .route("/entities/files/:file_name", get(get_file))
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .with_state(state)
}

async fn record_request(State(state): State<StubState>, request: Request, next: Next) -> Response {
    let required = {
        let mut inner = state.lock();
        inner.requests.push(RecordedRequest {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            headers: request.headers().clone(),
        });
        inner.faults.required_authorization.clone()
    };

    if let Some(required) = required {
        let presented = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok());
        if presented != Some(required.as_str()) {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }

    next.run(request).await
}

type HandlerResult = Result<Response, (StatusCode, String)>;

fn bad_request(message: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.to_string())
}

fn not_found(id: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Entity id {id} not found"))
}

async fn list_entities(State(state): State<StubState>) -> Json<Vec<Value>> {
    let inner = state.lock();
    if inner.faults.empty_list {
        return Json(Vec::new());
    }
    Json(inner.entities.values().cloned().map(Value::Object).collect())
}

async fn get_entity(State(state): State<StubState>, Path(id): Path<String>) -> HandlerResult {
    let inner = state.lock();
    let entity = inner.entities.get(&id).cloned().ok_or_else(|| not_found(&id))?;
    Ok(Json(Value::Object(entity)).into_response())
}

async fn create_entity(State(state): State<StubState>, multipart: Multipart) -> HandlerResult {
    let upload = read_upload(multipart).await?;
    let faults = state.faults();
    if let Some(delay) = faults.write_delay {
        tokio::time::sleep(delay).await;
    }

    let id = Uuid::new_v4().to_string();
    let record = store(&state, &id, upload, true)?;
    let status = faults.create_status.unwrap_or(StatusCode::CREATED);
    Ok((status, Json(tampered(record, &faults))).into_response())
}

async fn update_entity(
    State(state): State<StubState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> HandlerResult {
    let upload = read_upload(multipart).await?;
    let faults = state.faults();
    if let Some(delay) = faults.write_delay {
        tokio::time::sleep(delay).await;
    }

    if !state.lock().entities.contains_key(&id) {
        return Err(not_found(&id));
    }
    let record = store(&state, &id, upload, !faults.drop_updates)?;
    Ok((StatusCode::OK, Json(tampered(record, &faults))).into_response())
}

async fn delete_entity(State(state): State<StubState>, Path(id): Path<String>) -> HandlerResult {
    let mut inner = state.lock();
    if !inner.entities.contains_key(&id) {
        return Err(not_found(&id));
    }
    if !inner.faults.ignore_delete {
        inner.entities.remove(&id);
    }
    Ok((StatusCode::OK, Json(Value::String(id))).into_response())
}

async fn get_file(State(state): State<StubState>, Path(file_name): Path<String>) -> HandlerResult {
    let inner = state.lock();
    let mut content = inner
        .files
        .get(&file_name)
        .cloned()
        .ok_or((StatusCode::NOT_FOUND, format!("File {file_name} not found")))?;
    if inner.faults.corrupt_files {
        content.reverse();
        content.push(b'!');
    }
    Ok((StatusCode::OK, content).into_response())
}

struct Upload {
    body: Map<String, Value>,
    recorded: RecordedUpload,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, (StatusCode, String)> {
    let mut body = None;
    let mut recorded = RecordedUpload::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(bad_request)?;

        match name.as_str() {
            "body" => {
                recorded.body_content_type = content_type;
                recorded.body_file_name = file_name;
                let value: Value = serde_json::from_slice(&data).map_err(bad_request)?;
                match value {
                    Value::Object(map) => body = Some(map),
                    _ => return Err(bad_request("body must be a JSON object")),
                }
            }
            "file" => {
                recorded.file_name = file_name;
                recorded.file_content_type = content_type;
                recorded.file_content = data.to_vec();
            }
            other => return Err(bad_request(format!("unexpected part '{other}'"))),
        }
    }

    let body = body.ok_or_else(|| bad_request("missing 'body' part"))?;
    Ok(Upload { body, recorded })
}

/// Build the response record and, when `persist`, write it and its file to storage.
fn store(
    state: &StubState,
    id: &str,
    upload: Upload,
    persist: bool,
) -> Result<Map<String, Value>, (StatusCode, String)> {
    let mut record = upload.body;
    record.insert("id".to_string(), Value::String(id.to_string()));

    let file_name = upload
        .recorded
        .file_name
        .as_ref()
        .map(|name| format!("{id}-{name}"));
    record.insert(
        "fileName".to_string(),
        Value::String(file_name.clone().unwrap_or_default()),
    );

    let mut inner = state.lock();
    if persist {
        if let Some(file_name) = file_name {
            inner
                .files
                .insert(file_name, upload.recorded.file_content.clone());
        }
        inner.entities.insert(id.to_string(), record.clone());
    }
    inner.last_upload = Some(upload.recorded);
    Ok(record)
}

fn tampered(mut record: Map<String, Value>, faults: &Faults) -> Value {
    if let Some((key, value)) = &faults.tamper {
        record.insert(key.clone(), value.clone());
    }
    Value::Object(record)
}
