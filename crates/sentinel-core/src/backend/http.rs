//! REST backend speaking the PostgREST dialect (`/rest/v1/{table}`).
//!
//! The REST surface has no push channel, so subscriptions are polling
//! tasks that page forward over the `created_at` insertion column and
//! forward each new row as an insert event. Business-time columns such as
//! `reported_on` are dates and may be backdated, so they cannot order inserts.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Request, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{Backend, Connector, InsertEvent, Subscription, SubscriptionId, EVENT_BUFFER};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::util::{compact_text, parse_timestamp};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const INSERTED_AT_COLUMN: &str = "created_at";

struct HttpInner {
    client: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
}

pub struct HttpBackend {
    inner: Arc<HttpInner>,
    polls: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let (base_url, api_key) = config.endpoint()?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(HttpInner {
                client,
                base_url,
                api_key,
                poll_interval: config.poll_interval(),
            }),
            polls: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    fn polls(&self) -> MutexGuard<'_, HashMap<SubscriptionId, JoinHandle<()>>> {
        self.polls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for HttpBackend {
    fn drop(&mut self) {
        for (_, handle) in self.polls().drain() {
            handle.abort();
        }
    }
}

impl HttpInner {
    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, kind.table())
    }

    fn build_fetch_request(&self, kind: EntityKind, limit: Option<usize>) -> Result<Request> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", format!("{}.desc", kind.time_column())),
        ];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.build_request(kind, &query)
    }

    fn build_since_request(&self, kind: EntityKind, cursor: DateTime<Utc>) -> Result<Request> {
        let query = vec![
            ("select", "*".to_string()),
            (
                INSERTED_AT_COLUMN,
                format!("gte.{}", cursor.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
            ("order", format!("{INSERTED_AT_COLUMN}.asc")),
        ];
        self.build_request(kind, &query)
    }

    fn build_request(&self, kind: EntityKind, query: &[(&str, String)]) -> Result<Request> {
        Ok(self
            .client
            .get(self.table_url(kind))
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .build()?)
    }

    async fn execute(&self, request: Request) -> Result<Vec<serde_json::Value>> {
        let response = self.client.execute(request).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(parse_api_error(status, &body)));
        }
        Ok(response.json::<Vec<serde_json::Value>>().await?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch(
        &self,
        kind: EntityKind,
        limit: Option<usize>,
    ) -> Result<Vec<serde_json::Value>> {
        let request = self.inner.build_fetch_request(kind, limit)?;
        self.inner.execute(request).await
    }

    async fn subscribe(&self, kind: EntityKind) -> Result<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (sender, events) = mpsc::channel(EVENT_BUFFER);
        let handle = tokio::spawn(poll_inserts(
            Arc::clone(&self.inner),
            kind,
            sender,
            Utc::now(),
        ));
        self.polls().insert(id, handle);
        tracing::debug!(subscription = id, table = kind.table(), "Started insert polling");
        Ok(Subscription { id, kind, events })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let handle = self.polls().remove(&id).ok_or(Error::SubscriptionNotFound(id))?;
        handle.abort();
        Ok(())
    }
}

async fn poll_inserts(
    inner: Arc<HttpInner>,
    kind: EntityKind,
    sender: mpsc::Sender<InsertEvent>,
    start: DateTime<Utc>,
) {
    let mut cursor = PollCursor::new(start);
    let mut ticker = tokio::time::interval(inner.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let rows = match inner.build_since_request(kind, cursor.at) {
            Ok(request) => inner.execute(request).await,
            Err(error) => Err(error),
        };
        let rows = match rows {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(table = kind.table(), "Insert poll failed: {error}");
                continue;
            }
        };

        for row in rows {
            if !cursor.admit(&row) {
                continue;
            }
            if sender.send(InsertEvent { kind, payload: row }).await.is_err() {
                return;
            }
        }
    }
}

/// Position of an insert poll. The filter is inclusive, so rows stamped
/// exactly at the cursor come back on the next poll and are skipped by key.
#[derive(Debug)]
struct PollCursor {
    at: DateTime<Utc>,
    seen_at_cursor: HashSet<String>,
}

impl PollCursor {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            seen_at_cursor: HashSet::new(),
        }
    }

    /// Returns `true` the first time a row is seen and advances past it.
    fn admit(&mut self, row: &serde_json::Value) -> bool {
        let Some(at) = inserted_at(row) else {
            tracing::debug!("Insert poll row has no {INSERTED_AT_COLUMN}; forwarding as is");
            return true;
        };
        let key = row
            .get("id")
            .map_or_else(|| row.to_string(), serde_json::Value::to_string);

        match at.cmp(&self.at) {
            CmpOrdering::Less => false,
            CmpOrdering::Equal => self.seen_at_cursor.insert(key),
            CmpOrdering::Greater => {
                self.at = at;
                self.seen_at_cursor.clear();
                self.seen_at_cursor.insert(key);
                true
            }
        }
    }
}

fn inserted_at(row: &serde_json::Value) -> Option<DateTime<Utc>> {
    match row.get(INSERTED_AT_COLUMN)? {
        serde_json::Value::String(text) => parse_timestamp(text),
        serde_json::Value::Number(number) => {
            number.as_i64().and_then(DateTime::from_timestamp_millis)
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    error: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error).or(payload.hint) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

/// Builds an [`HttpBackend`] from [`BackendConfig`] on each connect.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: BackendConfig,
}

impl HttpConnector {
    pub const fn new(config: BackendConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self) -> Result<Arc<dyn Backend>> {
        let backend = HttpBackend::new(&self.config)?;
        // check reachability with the cheapest possible request
        backend.fetch(EntityKind::Colony, Some(1)).await?;
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn backend() -> HttpBackend {
        HttpBackend::new(&BackendConfig::new("https://api.example.com/", "anon-key")).unwrap()
    }

    #[test]
    fn fetch_request_shape_is_correct() {
        let backend = backend();
        let request = backend
            .inner
            .build_fetch_request(EntityKind::Case, Some(100))
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/rest/v1/cases?select=*&order=reported_on.desc&limit=100"
        );
        assert_eq!(
            request.headers().get("apikey").unwrap().to_str().unwrap(),
            "anon-key"
        );
        let auth = request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(auth, "Bearer anon-key");
    }

    #[test]
    fn unbounded_fetch_has_no_limit() {
        let request = backend()
            .inner
            .build_fetch_request(EntityKind::Colony, None)
            .unwrap();
        assert!(request.url().query().is_some_and(|query| !query.contains("limit")));
    }

    #[test]
    fn since_request_filters_on_insertion_column() {
        let cursor = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let request = backend()
            .inner
            .build_since_request(EntityKind::Case, cursor)
            .unwrap();
        let query = request.url().query().unwrap().to_string();
        assert!(query.contains("created_at=gte.2024-06-01T12%3A00%3A00.000Z"));
        assert!(query.contains("order=created_at.asc"));
        assert!(!query.contains("reported_on"));
    }

    #[test]
    fn poll_cursor_admits_date_only_rows_inserted_after_start() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut cursor = PollCursor::new(start);
        let fresh_case = serde_json::json!({
            "id": 7,
            "reported_on": "2024-06-01",
            "created_at": "2024-06-01T12:00:05Z"
        });

        assert!(cursor.admit(&fresh_case));
        assert!(!cursor.admit(&fresh_case));
        assert_eq!(
            cursor.at,
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 5).unwrap()
        );
    }

    #[test]
    fn poll_cursor_keeps_distinct_rows_sharing_a_timestamp() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut cursor = PollCursor::new(start);
        let first = serde_json::json!({ "id": "a", "created_at": "2024-06-01T12:00:00Z" });
        let second = serde_json::json!({ "id": "b", "created_at": "2024-06-01T12:00:00Z" });
        let older = serde_json::json!({ "id": "c", "created_at": "2024-06-01T11:59:59Z" });

        assert!(cursor.admit(&first));
        assert!(cursor.admit(&second));
        assert!(!cursor.admit(&first));
        assert!(!cursor.admit(&older));
    }

    #[test]
    fn missing_config_is_rejected() {
        let result = HttpBackend::new(&BackendConfig::default());
        assert!(matches!(result, Err(Error::NotConfigured(_))));
    }

    #[test]
    fn parse_api_error_prefers_message() {
        let message = parse_api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid API key","hint":"check apikey header"}"#,
        );
        assert_eq!(message, "Invalid API key (401)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[test]
    fn inserted_at_reads_text_and_millis() {
        let text = serde_json::json!({ "created_at": "2024-06-01T08:30:00+00:00" });
        let millis = serde_json::json!({ "created_at": 1_717_200_000_000_i64 });
        assert!(inserted_at(&text).is_some());
        assert!(inserted_at(&millis).is_some());
        assert!(inserted_at(&serde_json::json!({ "reported_on": "2024-06-01" })).is_none());
    }
}
