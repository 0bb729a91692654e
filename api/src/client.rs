//! Request executor and operation adapters for the DocChat backend.

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{normalize, ApiError, Failure, Result};
use crate::models::{ChatData, ChatRequest, SuccessEnvelope, UploadData};

pub const UPLOAD_PATH: &str = "/api/v1/upload";
pub const CHAT_PATH: &str = "/api/v1/chat";

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const PDF_MIME: &str = "application/pdf";
const UPLOAD_FIELD: &str = "file";

/// Request body encodings supported by the executor.
#[derive(Debug)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Form),
}

/// A single call to the backend.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub headers: HeaderMap,
    /// Falls back to the configured default deadline when unset
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::unknown(format!("Failed to encode request body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn with_multipart(mut self, form: Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A PDF to upload; its bytes are passed through unopened.
#[derive(Debug, Clone)]
pub struct UploadDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a document from disk, using its file name as the upload name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ApiError::unknown(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        Ok(Self { filename, bytes })
    }
}

/// Raw response captured before classification.
struct RawResponse {
    status: u16,
    text: String,
    header_request_id: String,
}

/// HTTP client for the document-ingestion-and-chat backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Config,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: Config) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Create a client that reuses an existing connection pool.
    pub fn with_http_client(config: Config, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Create a client configured from environment variables.
    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Full URL for a backend path.
    pub fn endpoint(&self, path: &str) -> Result<String> {
        let base_url = self.config.base_url()?;
        let path = path.trim();
        if path.starts_with('/') {
            Ok(format!("{}{}", base_url, path))
        } else {
            Ok(format!("{}/{}", base_url, path))
        }
    }

    /// Perform one HTTP call and classify its outcome.
    ///
    /// Fails only with a normalized [`ApiError`]; configuration is checked before
    /// any I/O, and the deadline covers both the send and the full body read.
    pub async fn execute<T>(&self, request: ApiRequest) -> Result<SuccessEnvelope<T>>
    where
        T: DeserializeOwned,
    {
        let url = match self.endpoint(&request.path) {
            Ok(url) => url,
            Err(error) => {
                warn!("Skipping {} {}: {}", request.method, request.path, error);
                return Err(error);
            }
        };

        let method = request.method.clone();
        let path = request.path.clone();
        let deadline = request.timeout.unwrap_or(self.config.default_timeout);
        let client_request_id = format!("req_{}", Uuid::new_v4().simple());
        let started = Instant::now();

        debug!(
            "Dispatching {} {} (client_request_id={}, timeout_ms={})",
            method,
            url,
            client_request_id,
            deadline.as_millis()
        );

        // Dropping the exchange on deadline aborts the in-flight call and frees the timer.
        let exchange = self.exchange(&url, request, &client_request_id);
        let outcome = match tokio::time::timeout(deadline, exchange).await {
            Ok(Ok(raw)) => classify(raw),
            Ok(Err(failure)) => Err(normalize(failure)),
            Err(_) => Err(normalize(Failure::Timeout)),
        };

        let elapsed_ms = started.elapsed().as_millis();
        match &outcome {
            Ok(envelope) => info!(
                "{} {} succeeded in {}ms (request_id={}, client_request_id={})",
                method, path, elapsed_ms, envelope.request_id, client_request_id
            ),
            Err(error) => warn!(
                "{} {} failed in {}ms: {} (status={:?}, request_id={}, client_request_id={})",
                method, path, elapsed_ms, error, error.status, error.request_id, client_request_id
            ),
        }

        outcome
    }

    async fn exchange(
        &self,
        url: &str,
        request: ApiRequest,
        client_request_id: &str,
    ) -> std::result::Result<RawResponse, Failure> {
        let mut builder = self
            .http
            .request(request.method, url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .header(REQUEST_ID_HEADER, client_request_id)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await.map_err(transport_failure)?;
        let status = response.status().as_u16();
        let header_request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .unwrap_or_default();

        // Read text first so a malformed body never fails the parse path.
        let text = response.text().await.map_err(transport_failure)?;

        Ok(RawResponse {
            status,
            text,
            header_request_id,
        })
    }

    /// Upload a PDF for indexing.
    pub async fn upload_pdf(&self, document: UploadDocument) -> Result<SuccessEnvelope<UploadData>> {
        let part = Part::bytes(document.bytes)
            .file_name(document.filename)
            .mime_str(PDF_MIME)
            .map_err(|e| ApiError::unknown(e.to_string()))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let request = ApiRequest::post(UPLOAD_PATH)
            .with_multipart(form)
            .with_timeout(self.config.upload_timeout);

        self.execute(request).await
    }

    /// Ask a question about the active document.
    pub async fn send_chat(&self, query: &str) -> Result<SuccessEnvelope<ChatData>> {
        let request = ApiRequest::post(CHAT_PATH)
            .with_json(&ChatRequest {
                query: query.to_string(),
            })?
            .with_timeout(self.config.chat_timeout);

        self.execute(request).await
    }
}

fn transport_failure(error: reqwest::Error) -> Failure {
    if error.is_timeout() {
        Failure::Timeout
    } else if error.is_builder() {
        Failure::Unknown(error.to_string())
    } else {
        Failure::Network(error.to_string())
    }
}

fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// Turn a raw response into a typed envelope or a normalized error.
///
/// HTTP status decides success; the body envelope only enriches the result.
fn classify<T>(raw: RawResponse) -> Result<SuccessEnvelope<T>>
where
    T: DeserializeOwned,
{
    let body = parse_body(&raw.text);

    if !(200..300).contains(&raw.status) {
        return Err(normalize(Failure::Http {
            status: raw.status,
            body,
            header_request_id: raw.header_request_id,
        }));
    }

    let (request_id, data) = match body {
        Some(Value::Object(mut map)) if is_success_envelope(&map) => {
            let request_id = map
                .get("request_id")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .unwrap_or(raw.header_request_id);
            (request_id, map.remove("data").unwrap_or(Value::Null))
        }
        None | Some(Value::Null) => (raw.header_request_id, Value::Object(Map::new())),
        Some(other) => (raw.header_request_id, other),
    };

    match serde_json::from_value::<T>(data) {
        Ok(data) => Ok(SuccessEnvelope::new(request_id, data)),
        Err(e) => Err(normalize(Failure::Decode {
            status: raw.status,
            request_id,
            reason: e.to_string(),
        })),
    }
}

fn is_success_envelope(map: &Map<String, Value>) -> bool {
    map.get("success") == Some(&Value::Bool(true)) && map.contains_key("data")
}
