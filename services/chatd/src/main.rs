/// chatd - Companion chat backend for the dGPU marketplace
/// Echoes chat messages, or proxies to an LLM inference API when one is
/// configured. Stateless request/response; rental truth never lives here.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub created_at: String,
}

pub struct AppState {
    llm_url: Option<String>,
    llm_token: Option<String>,
    client: reqwest::Client,
}

impl AppState {
    fn from_env() -> Self {
        AppState {
            llm_url: std::env::var("CHATD_LLM_URL").ok(),
            llm_token: std::env::var("CHATD_LLM_TOKEN").ok(),
            client: reqwest::Client::new(),
        }
    }

    async fn generate_response(&self, message: &str) -> String {
        let url = match &self.llm_url {
            Some(url) => url,
            None => return echo_response(message),
        };

        let mut request = self
            .client
            .post(url)
            .json(&serde_json::json!({ "inputs": message }));
        if let Some(token) = &self.llm_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let body: serde_json::Value = response.json().await.unwrap_or_default();
                body.pointer("/0/generated_text")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| echo_response(message))
            }
            Err(e) => {
                println!("LLM upstream error: {}", e);
                echo_response(message)
            }
        }
    }
}

/// Fallback when no LLM upstream is configured or reachable
fn echo_response(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("gpu") || lower.contains("rent") {
        format!(
            "Looking for compute? Browse the marketplace listings and pick a GPU that fits your budget. You said: {}",
            message
        )
    } else {
        format!("Echo: {}", message)
    }
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, StatusCode> {
    if req.message.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let response = state.generate_response(&req.message).await;
    Ok(Json(ChatResponse {
        response,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

async fn create_session() -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id: uuid::Uuid::new_v4().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}

async fn get_session(Path(id): Path<String>) -> Json<SessionResponse> {
    // sessions are stubs: nothing is stored between requests
    Json(SessionResponse {
        session_id: id,
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/session", post(create_session))
        .route("/session/:id", get(get_session))
        .route("/health", get(|| async { "OK" }))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let state = Arc::new(AppState::from_env());
    let port = std::env::var("CHATD_PORT").unwrap_or_else(|_| "8090".to_string());
    let addr = format!("0.0.0.0:{}", port);

    println!("chatd starting on :{}", port);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app(state)).await.unwrap();
}
