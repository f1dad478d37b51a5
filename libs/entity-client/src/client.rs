//! HTTP client for the `/entities` endpoints.

use crate::compare::ensure_echoed;
use crate::error::{Error, Result};
use crate::model::{Entity, EntityId};
use crate::multipart::{entity_form, FilePart};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

/// Timeout applied to create/update calls unless overridden.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_USER_AGENT: &str = concat!("entity-client/", env!("CARGO_PKG_VERSION"));

/// The calls this client can make. Each one succeeds on exactly one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
    GetFile,
}

impl Operation {
    pub fn method(self) -> Method {
        match self {
            Self::List | Self::Get | Self::GetFile => Method::GET,
            Self::Create => Method::POST,
            Self::Update => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }

    pub fn expected_status(self) -> StatusCode {
        match self {
            Self::Create => StatusCode::CREATED,
            _ => StatusCode::OK,
        }
    }

    pub fn is_write(self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list entities",
            Self::Get => "get entity",
            Self::Create => "create entity",
            Self::Update => "update entity",
            Self::Delete => "delete entity",
            Self::GetFile => "get file",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for [`EntityClient`].
#[derive(Debug, Clone)]
pub struct EntityClientBuilder {
    base_url: String,
    headers: Vec<(String, String)>,
    write_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: String,
}

impl Default for EntityClientBuilder {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            headers: Vec::new(),
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            read_timeout: None,
            connect_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl EntityClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Add one header sent verbatim with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Timeout for create/update. `None` disables it.
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Timeout for every call that is not a create/update. `None` disables it.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<EntityClient> {
        let base_url = Url::parse(self.base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
            headers.insert(header_name, header_value);
        }

        let mut http = reqwest::Client::builder().user_agent(self.user_agent);
        if let Some(timeout) = self.connect_timeout {
            http = http.connect_timeout(timeout);
        }
        let http = http.build().map_err(Error::Client)?;

        Ok(EntityClient {
            http,
            base_url,
            headers,
            write_timeout: self.write_timeout,
            read_timeout: self.read_timeout,
        })
    }
}

/// Client for a backend's entity endpoints.
///
/// Calls are independent; the client holds no per-entity state. Auth headers
/// given at construction are attached to every request unmodified.
#[derive(Debug, Clone)]
pub struct EntityClient {
    http: reqwest::Client,
    base_url: Url,
    headers: HeaderMap,
    write_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl EntityClient {
    /// Client with default timeouts (10s on writes, none on reads).
    pub fn new<I, K, V>(base_url: &str, auth_headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::builder()
            .base_url(base_url)
            .headers(auth_headers)
            .build()
    }

    pub fn builder() -> EntityClientBuilder {
        EntityClientBuilder::default()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// `GET /entities` → 200.
    pub async fn list_entities(&self) -> Result<Vec<Entity>> {
        let op = Operation::List;
        let url = self.endpoint(&["entities"]);
        let response = self.send(op, self.http.get(url)).await?;
        self.decode_json(op, response).await
    }

    /// `GET /entities/{id}` → 200.
    pub async fn get_entity(&self, id: &EntityId) -> Result<Entity> {
        let op = Operation::Get;
        let url = self.endpoint(&["entities", &id.to_string()]);
        let response = self.send(op, self.http.get(url)).await?;
        self.decode_json(op, response).await
    }

    /// `POST /entities/` (multipart) → 201.
    ///
    /// The response, restricted to the keys of `body`, must equal `body`.
    pub async fn create_entity<B>(&self, body: &B, file: &FilePart) -> Result<Entity>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(&["entities", ""]);
        self.submit(Operation::Create, url, body, file).await
    }

    /// `PUT /entities/{id}` (multipart) → 200.
    ///
    /// Same echo check as [`EntityClient::create_entity`].
    pub async fn update_entity<B>(&self, id: &EntityId, body: &B, file: &FilePart) -> Result<Entity>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(&["entities", &id.to_string()]);
        self.submit(Operation::Update, url, body, file).await
    }

    /// `DELETE /entities/{id}` → 200. The response body is ignored.
    pub async fn delete_entity(&self, id: &EntityId) -> Result<()> {
        let url = self.endpoint(&["entities", &id.to_string()]);
        self.send(Operation::Delete, self.http.delete(url)).await?;
        Ok(())
    }

    /// `GET /entities/files/{file_name}` → 200, raw bytes.
    pub async fn get_file(&self, file_name: &str) -> Result<Vec<u8>> {
        let op = Operation::GetFile;
        let url = self.endpoint(&["entities", "files", file_name]);
        let response = self.send(op, self.http.get(url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(op, e))?;
        Ok(bytes.to_vec())
    }

    async fn submit<B>(&self, op: Operation, url: Url, body: &B, file: &FilePart) -> Result<Entity>
    where
        B: Serialize + ?Sized,
    {
        let sent = match serde_json::to_value(body).map_err(|_| Error::InvalidBody)? {
            Value::Object(map) => map,
            _ => return Err(Error::InvalidBody),
        };
        let body_json = serde_json::to_string(&sent).map_err(|_| Error::InvalidBody)?;
        let form = entity_form(body_json, file)?;

        let request = self.http.request(op.method(), url).multipart(form);
        let response = self.send(op, request).await?;
        let entity: Entity = self.decode_json(op, response).await?;

        ensure_echoed(op, &sent, entity.as_map())?;
        Ok(entity)
    }

    async fn send(&self, op: Operation, request: RequestBuilder) -> Result<Response> {
        let request = match self.timeout_for(op) {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };
        let request = request
            .headers(self.headers.clone())
            .build()
            .map_err(|e| self.transport_error(op, e))?;

        let path = request.url().path().to_string();
        tracing::debug!(operation = %op, method = %request.method(), path = %path, "Sending request");

        let started = Instant::now();
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| self.transport_error(op, e))?;
        let status = response.status();

        tracing::debug!(
            operation = %op,
            path = %path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Received response"
        );

        let expected = op.expected_status();
        if status != expected {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                operation = %op,
                expected = expected.as_u16(),
                actual = status.as_u16(),
                "Unexpected status"
            );
            return Err(Error::UnexpectedStatus {
                operation: op,
                expected,
                actual: status,
                body,
            });
        }

        Ok(response)
    }

    async fn decode_json<T: DeserializeOwned>(&self, op: Operation, response: Response) -> Result<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(op, e))?;
        serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
            operation: op,
            source,
        })
    }

    fn timeout_for(&self, op: Operation) -> Option<Duration> {
        if op.is_write() {
            self.write_timeout
        } else {
            self.read_timeout
        }
    }

    fn transport_error(&self, op: Operation, source: reqwest::Error) -> Error {
        if source.is_timeout() {
            Error::Timeout {
                operation: op,
                after: self.timeout_for(op),
            }
        } else {
            Error::Transport {
                operation: op,
                source,
            }
        }
    }

    /// Base URL with `segments` appended; segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
