//! Integration test support: an in-process mock of the managed backend.
//!
//! The mock serves the same REST surface the real backend exposes
//! (`/rest/v1/{table}`, `/rest/v1/rpc/{name}`, `/auth/v1/*`) over a real
//! TCP listener, so the storefront's `BackendClient` talks to it without
//! modification. Tests seed rows, set canned RPC responses, induce insert
//! failures per table, and assert on the recorded request log.
//!
//! Range filters (`gt.`, `lte.`) are logged but not applied; tests seed
//! only rows intended to match.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use secrecy::SecretString;
use serde_json::{Value, json};

use pixelmart_core::{Email, UserId};
use pixelmart_storefront::backend::BackendClient;
use pixelmart_storefront::config::BackendConfig;
use pixelmart_storefront::models::CurrentUser;

/// One request the mock handled, in arrival order.
#[derive(Debug, Clone)]
pub struct LoggedRequest {
    pub method: String,
    /// Path below the mock root, e.g. `/rest/v1/orders`.
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct MockState {
    rows: Mutex<HashMap<String, Vec<Value>>>,
    rpc_responses: Mutex<HashMap<String, Value>>,
    failing_inserts: Mutex<HashSet<String>>,
    log: Mutex<Vec<LoggedRequest>>,
}

/// Handle to a running mock backend.
pub struct MockBackend {
    state: Arc<MockState>,
    base_url: String,
}

impl MockBackend {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound (tests only).
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState::default());

        let app = Router::new()
            .route("/rest/v1/rpc/{name}", post(handle_rpc))
            .route("/rest/v1/{table}", get(handle_select).post(handle_insert).patch(handle_patch))
            .route("/auth/v1/token", post(handle_token))
            .route("/auth/v1/signup", post(handle_signup))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend local addr");

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            state,
            base_url: format!("http://{addr}"),
        }
    }

    /// Base URL of the running mock.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// A `BackendClient` pointed at this mock.
    #[must_use]
    pub fn client(&self) -> BackendClient {
        BackendClient::new(&BackendConfig {
            url: self.base_url.clone(),
            realtime_url: "ws://127.0.0.1:1/realtime/v1/websocket".to_string(),
            anon_key: SecretString::from("test-anon-key"),
            storage_bucket: "attachments".to_string(),
        })
    }

    /// Seed rows for a table, replacing anything already there.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.state
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_string(), rows);
    }

    /// Rows currently stored for a table (seeded plus inserted).
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Set the canned response for an RPC.
    pub fn set_rpc(&self, name: &str, response: Value) {
        self.state
            .rpc_responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), response);
    }

    /// Make every insert into `table` fail with HTTP 500.
    pub fn fail_inserts_into(&self, table: &str) {
        self.state
            .failing_inserts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_string());
    }

    /// Everything the mock has handled so far.
    #[must_use]
    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.state
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many logged requests match a method and exact path.
    #[must_use]
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

/// A logged-in user for driving user-scoped services.
///
/// # Panics
///
/// Panics if the fixed test address fails email validation (it cannot).
#[must_use]
pub fn test_user() -> CurrentUser {
    CurrentUser {
        id: UserId::generate(),
        email: Email::parse("customer@example.com").expect("valid test email"),
        access_token: "test-access-token".to_string(),
    }
}

fn record(state: &MockState, method: &str, path: String, query: HashMap<String, String>, body: Option<Value>) {
    state
        .log
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(LoggedRequest {
            method: method.to_string(),
            path,
            query,
            body,
        });
}

/// Loose equality between a stored JSON value and an `eq.` filter string.
fn value_matches(value: Option<&Value>, expected: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == expected,
        None => false,
    }
}

async fn handle_select(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    record(&state, "GET", format!("/rest/v1/{table}"), query.clone(), None);

    let all = state
        .rows
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&table)
        .cloned()
        .unwrap_or_default();

    let mut matched: Vec<Value> = all
        .into_iter()
        .filter(|row| {
            query.iter().all(|(column, filter)| {
                filter.strip_prefix("eq.").is_none_or(|expected| {
                    value_matches(row.get(column), expected)
                })
            })
        })
        .collect();

    if let Some(limit) = query.get("limit").and_then(|l| l.parse::<usize>().ok()) {
        matched.truncate(limit);
    }

    Json(Value::Array(matched))
}

async fn handle_insert(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record(&state, "POST", format!("/rest/v1/{table}"), query, Some(body.clone()));

    let failing = state
        .failing_inserts
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&table);
    if failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "induced insert failure" })),
        );
    }

    let incoming = match body {
        Value::Array(rows) => rows,
        other => vec![other],
    };

    let stored: Vec<Value> = incoming
        .into_iter()
        .map(|mut row| {
            if let Value::Object(fields) = &mut row {
                fields
                    .entry("id")
                    .or_insert_with(|| json!(uuid::Uuid::new_v4()));
                fields
                    .entry("created_at")
                    .or_insert_with(|| json!(chrono::Utc::now().to_rfc3339()));
            }
            row
        })
        .collect();

    state
        .rows
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(table)
        .or_default()
        .extend(stored.clone());

    (StatusCode::CREATED, Json(Value::Array(stored)))
}

async fn handle_patch(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    record(&state, "PATCH", format!("/rest/v1/{table}"), query.clone(), Some(body.clone()));

    if let Value::Object(patch) = &body {
        let mut rows = state.rows.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table_rows) = rows.get_mut(&table) {
            for row in table_rows.iter_mut() {
                let matches = query.iter().all(|(column, filter)| {
                    filter.strip_prefix("eq.").is_none_or(|expected| {
                        value_matches(row.get(column), expected)
                    })
                });
                if matches && let Value::Object(fields) = row {
                    for (key, value) in patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }

    Json(Value::Array(Vec::new()))
}

async fn handle_rpc(
    State(state): State<Arc<MockState>>,
    Path(name): Path<String>,
    Json(args): Json<Value>,
) -> Json<Value> {
    record(
        &state,
        "POST",
        format!("/rest/v1/rpc/{name}"),
        HashMap::new(),
        Some(args),
    );

    let response = state
        .rpc_responses
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&name)
        .cloned()
        .unwrap_or_else(|| json!({}));

    Json(response)
}

async fn handle_token(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    record(&state, "POST", "/auth/v1/token".to_string(), query, None);
    Json(auth_session())
}

async fn handle_signup(State(state): State<Arc<MockState>>) -> Json<Value> {
    record(&state, "POST", "/auth/v1/signup".to_string(), HashMap::new(), None);
    Json(auth_session())
}

/// A realtime endpoint that accepts connections and acks subscribes but
/// never pushes events. Enough for services that hold a hub without
/// exercising the stream.
///
/// # Panics
///
/// Panics if the listener cannot be bound (tests only).
pub async fn mock_realtime() -> String {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    use pixelmart_realtime::WireMessage;

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind mock realtime");
    let addr = listener.local_addr().expect("mock realtime local addr");

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(stream) = tokio_tungstenite::accept_async(socket).await else {
                    return;
                };
                let (mut write, mut read) = stream.split();
                while let Some(Ok(Message::Text(text))) = read.next().await {
                    if let Ok(WireMessage::Subscribe { topic }) = serde_json::from_str(&text) {
                        let Ok(ack) = serde_json::to_string(&WireMessage::Subscribed { topic })
                        else {
                            continue;
                        };
                        if write.send(Message::Text(ack)).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    format!("ws://{addr}")
}

fn auth_session() -> Value {
    json!({
        "access_token": "test-access-token",
        "user": {
            "id": uuid::Uuid::new_v4(),
            "email": "customer@example.com",
        },
    })
}
