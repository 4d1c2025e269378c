//! Firebase Realtime Database over its REST and streaming API.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::sse::{SseParser, StreamEvent};
use super::tree::normalize;
use super::{
    RemoteStore, Snapshot, StoreError, StoreEvent, StorePath, StoreResult, Subscription,
    TransactionFn,
};

/// Compare-and-set rounds before a transaction gives up.
const MAX_TRANSACTION_ATTEMPTS: usize = 8;

#[derive(Debug, Deserialize)]
struct PushReply {
    name: String,
}

#[derive(Clone)]
pub struct FirebaseStore {
    base_url: String,
    http: Client,
    token: Arc<RwLock<Option<String>>>,
}

impl FirebaseStore {
    pub fn new(database_url: &str) -> StoreResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| StoreError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: database_url.trim_end_matches('/').to_string(),
            http,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Swap the ID token sent with every request. Open streams keep the
    /// token they started with.
    pub fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut slot) => *slot = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn url(&self, path: &StorePath) -> String {
        format!("{}/{}.json", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.token.read().ok().and_then(|t| t.clone());
        match token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, path: &StorePath) -> StoreResult<Response> {
        let resp = self
            .authed(request)
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("{}: {}", path, e)))?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, path, &body))
    }
}

/// Map a failed response to the store taxonomy. The database reports rule
/// failures as 401 and an `{"error": ...}` body.
fn status_error(status: StatusCode, path: &StorePath, body: &str) -> StoreError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::PermissionDenied(format!("{}: {}", path, detail))
        }
        StatusCode::NOT_FOUND => StoreError::NotFound(path.to_string()),
        StatusCode::PRECONDITION_FAILED => StoreError::Conflict(path.to_string()),
        StatusCode::BAD_REQUEST => StoreError::InvalidPath(format!("{}: {}", path, detail)),
        _ => StoreError::Network(format!("{} returned {}: {}", path, status, detail)),
    }
}

fn etag_of(resp: &Response) -> Option<String> {
    resp.headers()
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn json_body(resp: Response, path: &StorePath) -> StoreResult<Value> {
    resp.json::<Value>()
        .await
        .map_err(|e| StoreError::Decode(format!("{}: {}", path, e)))
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    async fn create(&self, path: &StorePath, value: Value) -> StoreResult<String> {
        let resp = self
            .send(self.http.post(self.url(path)).json(&value), path)
            .await?;
        let reply: PushReply = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("{}: {}", path, e)))?;
        log::debug!("Created {}/{}", path, reply.name);
        Ok(reply.name)
    }

    async fn set(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        self.send(self.http.put(self.url(path)).json(&value), path)
            .await?;
        Ok(())
    }

    async fn update(&self, path: &StorePath, partial: Map<String, Value>) -> StoreResult<()> {
        self.send(self.http.patch(self.url(path)).json(&partial), path)
            .await?;
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<()> {
        self.send(self.http.delete(self.url(path)), path).await?;
        Ok(())
    }

    async fn get(&self, path: &StorePath) -> StoreResult<Value> {
        let resp = self.send(self.http.get(self.url(path)), path).await?;
        json_body(resp, path).await
    }

    async fn transaction(&self, path: &StorePath, apply: TransactionFn) -> StoreResult<Value> {
        let url = self.url(path);
        let resp = self
            .send(self.http.get(&url).header("X-Firebase-ETag", "true"), path)
            .await?;
        let mut etag = etag_of(&resp);
        let mut current = json_body(resp, path).await?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let Some(tag) = etag.take() else {
                return Err(StoreError::Network(format!("{}: no ETag in response", path)));
            };
            let next = normalize(apply(&current));
            let resp = self
                .authed(self.http.put(&url).header("if-match", tag).json(&next))
                .send()
                .await
                .map_err(|e| StoreError::Network(format!("{}: {}", path, e)))?;

            match resp.status() {
                s if s.is_success() => return Ok(next),
                // The reply carries the current value and its new ETag.
                StatusCode::PRECONDITION_FAILED => {
                    log::debug!("Transaction on {} lost race (attempt {})", path, attempt);
                    etag = etag_of(&resp);
                    current = json_body(resp, path).await?;
                }
                s => {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(status_error(s, path, &body));
                }
            }
        }

        log::warn!(
            "Transaction on {} gave up after {} attempts",
            path,
            MAX_TRANSACTION_ATTEMPTS
        );
        Err(StoreError::Conflict(path.to_string()))
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Subscription::failed(
                path.clone(),
                StoreError::Network("no async runtime to stream on".into()),
            );
        };

        let (tx, rx) = mpsc::unbounded();
        let request = self
            .authed(self.http.get(self.url(path)))
            .header("Accept", "text/event-stream");
        let task = runtime.spawn(stream_events(request, path.clone(), tx));
        Subscription::new(path.clone(), rx, move || task.abort())
    }
}

async fn stream_events(
    request: RequestBuilder,
    path: StorePath,
    tx: mpsc::UnboundedSender<StoreEvent>,
) {
    let resp = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            log::error!("Failed to open stream on {}: {}", path, e);
            let _ = tx.unbounded_send(Err(StoreError::Network(e.to_string())));
            return;
        }
    };
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let _ = tx.unbounded_send(Err(status_error(status, &path, &body)));
        return;
    }

    log::debug!("Streaming {}", path);
    let mut body = resp.bytes_stream();
    let mut parser = SseParser::new();
    let mut pending = Vec::new();
    let mut cache = Value::Null;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                log::error!("Stream on {} failed: {}", path, e);
                let _ = tx.unbounded_send(Err(StoreError::Network(e.to_string())));
                return;
            }
        };
        pending.extend_from_slice(&chunk);
        let text = take_utf8(&mut pending);

        for event in parser.feed(&text) {
            match event {
                StreamEvent::Put { .. } | StreamEvent::Patch { .. } => {
                    if event.apply(&mut cache) {
                        let snapshot = Snapshot::new(path.clone(), cache.clone());
                        if tx.unbounded_send(Ok(snapshot)).is_err() {
                            return;
                        }
                    }
                }
                StreamEvent::KeepAlive => {}
                StreamEvent::Cancel(reason) => {
                    log::warn!("Server cancelled stream on {}: {}", path, reason);
                    let _ = tx.unbounded_send(Err(StoreError::PermissionDenied(reason)));
                    return;
                }
                StreamEvent::AuthRevoked => {
                    log::warn!("Credential revoked on stream {}", path);
                    let _ = tx.unbounded_send(Err(StoreError::PermissionDenied(
                        "credential revoked".into(),
                    )));
                    return;
                }
                StreamEvent::Unknown(name) => {
                    log::debug!("Ignoring stream event {} on {}", name, path);
                }
            }
        }
    }

    let _ = tx.unbounded_send(Err(StoreError::Closed));
}

/// Take the longest valid UTF-8 prefix of `pending`, leaving a split
/// multi-byte character for the next chunk.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let text = text.to_string();
            pending.clear();
            text
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}
