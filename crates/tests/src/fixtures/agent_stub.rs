use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tracing::info;

/// In-process stand-in for the hosted interviewer agent service.
///
/// Serves `POST /join-interview` on an ephemeral port, counts hits, and can
/// be scripted to fail its first N requests with 503.
pub struct AgentStub {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    last_body: Arc<parking_lot::Mutex<Option<Value>>>,
}

#[derive(Clone)]
struct StubState {
    hits: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    last_body: Arc<parking_lot::Mutex<Option<Value>>>,
}

impl AgentStub {
    /// Spawns the stub; the first `failures` requests answer 503.
    pub async fn spawn(failures: usize) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind agent stub");
        let addr = listener.local_addr().expect("agent stub addr");

        let hits = Arc::new(AtomicUsize::new(0));
        let last_body = Arc::new(parking_lot::Mutex::new(None));
        let state = StubState {
            hits: hits.clone(),
            failures_left: Arc::new(AtomicUsize::new(failures)),
            last_body: last_body.clone(),
        };

        let app = Router::new()
            .route("/join-interview", post(join_interview))
            .with_state(state);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                info!(%e, "agent stub server exited");
            }
        });

        Self {
            addr,
            hits,
            last_body,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of invitation requests that reached the stub.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// JSON body of the most recent invitation request.
    pub fn last_body(&self) -> Option<Value> {
        self.last_body.lock().clone()
    }
}

async fn join_interview(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock() = Some(body);

    let should_fail = state
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
            left.checked_sub(1)
        })
        .is_ok();
    if should_fail {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "no agent capacity" })),
        )
            .into_response();
    }

    Json(serde_json::json!({ "videoAvatarEnabled": true })).into_response()
}
