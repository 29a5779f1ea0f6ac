//! In-process stand-in for the song API, served by axum on an ephemeral port.
//!
//! Query responses are scripted in order; the last one repeats forever so
//! an unchanged job keeps reporting the same state.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorded {
    generate: Option<(StatusCode, String)>,
    queries: VecDeque<(StatusCode, String)>,
    generate_bodies: Vec<Value>,
    queried_ids: Vec<String>,
    auth_headers: Vec<String>,
}

type Shared = Arc<Mutex<Recorded>>;

pub struct StubApi {
    addr: SocketAddr,
    prefix: String,
    state: Shared,
}

impl StubApi {
    pub async fn start() -> Self {
        Self::start_under("").await
    }

    /// Serve the API below `prefix`, e.g. `/api`, and point `base_url` there.
    pub async fn start_under(prefix: &str) -> Self {
        let state: Shared = Arc::default();
        let api = Router::new()
            .route("/v1/song/generate", post(generate))
            .route("/v1/song/query/{task_id}", get(query))
            .with_state(Arc::clone(&state));
        let app = if prefix.is_empty() {
            api
        } else {
            Router::new().nest(prefix, api)
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            prefix: prefix.to_string(),
            state,
        }
    }

    /// Base URL with a trailing slash, as users tend to configure it.
    pub fn base_url(&self) -> String {
        format!("http://{}{}/", self.addr, self.prefix)
    }

    pub fn set_generate(&self, status: StatusCode, body: String) {
        self.state.lock().unwrap().generate = Some((status, body));
    }

    pub fn push_query(&self, status: StatusCode, body: Value) {
        self.push_query_raw(status, body.to_string());
    }

    pub fn push_query_raw(&self, status: StatusCode, body: String) {
        self.state.lock().unwrap().queries.push_back((status, body));
    }

    pub fn generate_bodies(&self) -> Vec<Value> {
        self.state.lock().unwrap().generate_bodies.clone()
    }

    pub fn queried_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().queried_ids.clone()
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().unwrap().queried_ids.len()
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.state.lock().unwrap().auth_headers.clone()
    }
}

fn record_auth(recorded: &mut Recorded, headers: &HeaderMap) {
    let value = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    recorded.auth_headers.push(value.to_string());
}

async fn generate(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let mut recorded = state.lock().unwrap();
    record_auth(&mut recorded, &headers);
    recorded.generate_bodies.push(body);
    recorded
        .generate
        .clone()
        .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, "no generate response scripted".to_string()))
}

async fn query(
    State(state): State<Shared>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let mut recorded = state.lock().unwrap();
    record_auth(&mut recorded, &headers);
    recorded.queried_ids.push(task_id);
    let next = if recorded.queries.len() > 1 {
        recorded.queries.pop_front()
    } else {
        recorded.queries.front().cloned()
    };
    next.unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, "no query response scripted".to_string()))
}
