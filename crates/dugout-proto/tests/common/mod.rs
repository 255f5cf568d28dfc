use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use dugout_proto::client::BackendClient;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Canned backend.  `analyze_reply` is returned verbatim as the `result`
/// string; `None` makes `/analyze` answer HTTP 500.
#[derive(Clone, Default)]
pub struct MockBackend {
    pub segments: Vec<String>,
    pub analyze_reply: Option<Value>,
    pub latest_video: String,
    pub seen: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockBackend {
    pub fn with_segments(n: usize) -> Self {
        Self {
            segments: (0..n).map(|i| format!("s{}", i)).collect(),
            latest_video: "video_segment_1700000000.mp4".into(),
            ..Self::default()
        }
    }

    pub fn replying(mut self, envelope: Value) -> Self {
        self.analyze_reply = Some(envelope);
        self
    }

    /// Bind on an ephemeral port and return a client pointed at it.
    pub async fn start(self) -> (BackendClient, Arc<Mutex<Vec<(String, Value)>>>) {
        let seen = Arc::clone(&self.seen);
        let app = Router::new()
            .route("/list-segments", get(list_segments))
            .route("/analyze", post(analyze))
            .route("/save-segment", post(save_segment))
            .route("/get-latest-video", get(latest_video))
            .route("/match-overview", post(match_overview))
            .route("/stream-segment", get(stream_segment))
            .with_state(self);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = BackendClient::with_client(reqwest::Client::new(), &format!("http://{}", addr));
        (client, seen)
    }
}

async fn record(state: &MockBackend, route: &str, body: Value) {
    state.seen.lock().await.push((route.to_string(), body));
}

async fn list_segments(State(state): State<MockBackend>) -> Json<Value> {
    Json(json!({ "segments": state.segments }))
}

async fn analyze(
    State(state): State<MockBackend>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    record(&state, "/analyze", body).await;
    match &state.analyze_reply {
        Some(envelope) => Ok(Json(json!({ "result": envelope.to_string() }))),
        None => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn save_segment(State(state): State<MockBackend>, Json(body): Json<Value>) -> Json<Value> {
    record(&state, "/save-segment", body).await;
    Json(json!({ "message": "Video segment saved successfully" }))
}

async fn latest_video(State(state): State<MockBackend>) -> Json<Value> {
    Json(json!({ "latestVideoFile": state.latest_video }))
}

async fn match_overview(State(state): State<MockBackend>, Json(body): Json<Value>) -> Json<Value> {
    let chunk = body["chunk_number"].as_str().unwrap_or_default().to_string();
    record(&state, "/match-overview", body).await;
    Json(json!({
        "current_game_context": { "current_context": format!("context for {}", chunk) },
        "strategic_prediction": { "strategic_prediction": "Expect a bunt." }
    }))
}

async fn stream_segment(
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Result<Vec<u8>, StatusCode> {
    match params.get("segmentName") {
        Some(name) if !name.is_empty() => Ok(name.as_bytes().to_vec()),
        _ => Err(StatusCode::BAD_REQUEST),
    }
}
