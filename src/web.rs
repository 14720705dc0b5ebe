use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::{self, EngineError};
use crate::config::EngineConfig;
use crate::search::Engine;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<Mutex<Engine>>,
    config: Arc<EngineConfig>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        AppState {
            engine: Arc::new(Mutex::new(config.build_engine())),
            config: Arc::new(config),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct MoveRequest {
    fen: String,
    depth: Option<u8>,
}

#[derive(Serialize, Deserialize)]
pub struct AnalyzeRequest {
    fen: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fen: Option<String>,
}

/// Any failed request, rendered as an `ErrorBody`.
struct ApiError {
    status: StatusCode,
    message: String,
    fen: Option<String>,
}

impl ApiError {
    fn engine(error: EngineError, fen: Option<String>) -> Self {
        let status = match error {
            EngineError::InvalidPosition(_) => StatusCode::BAD_REQUEST,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: error.to_string(),
            fen,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::engine(EngineError::Internal(message.into()), None)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError {
            status: rejection.status(),
            message: rejection.body_text(),
            fen: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, error = %self.message, fen = ?self.fen, "request failed");
        let body = ErrorBody {
            error: self.message,
            fen: self.fen,
        };
        (self.status, Json(body)).into_response()
    }
}

#[axum::debug_handler]
async fn make_move(
    State(app_state): State<AppState>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    let depth = app_state.config.clamp_depth(req.depth);
    let engine = Arc::clone(&app_state.engine);
    let fen = req.fen.clone();

    // Searching is CPU bound; keep it off the async workers.
    let joined = tokio::task::spawn_blocking(move || {
        let mut engine = engine
            .lock()
            .map_err(|_| ApiError::internal("engine lock poisoned"))?;
        api::best_move(&mut engine, &fen, depth)
            .map_err(|error| ApiError::engine(error, Some(fen.clone())))
    })
    .await;

    match joined {
        Ok(Ok(outcome)) => Json(outcome).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => ApiError::internal(format!("search task failed: {}", e)).into_response(),
    }
}

#[axum::debug_handler]
async fn analyze(payload: Result<Json<AnalyzeRequest>, JsonRejection>) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    match api::analyze(&req.fen) {
        Ok(analysis) => Json(analysis).into_response(),
        Err(error) => ApiError::engine(error, Some(req.fen)).into_response(),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/move", post(make_move))
        .route("/api/analyze", post(analyze))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run_server(config: EngineConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bind = config.bind;
    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "web server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = EngineConfig {
            hash_mb: 1,
            ..EngineConfig::default()
        };
        router(AppState::new(config))
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_move_endpoint_plays_mate() {
        let (status, json) = post_json(
            app(),
            "/api/move",
            serde_json::json!({ "fen": "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", "depth": 2 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["move"], "a1a8");
        assert_eq!(json["depth"], 2);
        assert_eq!(json["mate"], 1);
    }

    #[tokio::test]
    async fn test_move_endpoint_uses_default_depth_and_clamps() {
        let config = EngineConfig {
            hash_mb: 1,
            default_depth: 1,
            max_depth: 2,
            ..EngineConfig::default()
        };
        let app = router(AppState::new(config));
        let fen = crate::game::START_FEN;

        let (status, json) = post_json(app.clone(), "/api/move", serde_json::json!({ "fen": fen })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["depth"], 1);

        let (_, json) = post_json(app, "/api/move", serde_json::json!({ "fen": fen, "depth": 9 })).await;
        assert_eq!(json["depth"], 2);
    }

    #[tokio::test]
    async fn test_move_endpoint_game_over() {
        let (status, json) = post_json(
            app(),
            "/api/move",
            serde_json::json!({ "fen": "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["game_over"], true);
        assert_eq!(json["result"], "1/2-1/2");
        assert!(json.get("move").is_none());
    }

    #[tokio::test]
    async fn test_bad_fen_is_bad_request() {
        let (status, json) = post_json(app(), "/api/move", serde_json::json!({ "fen": "xyz" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["fen"], "xyz");
        assert!(json["error"].as_str().unwrap().contains("invalid position"));

        let (status, _) = post_json(app(), "/api/analyze", serde_json::json!({ "fen": "xyz" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_gets_json_error() {
        let (status, json) = post_json(
            app(),
            "/api/move",
            serde_json::json!({ "fen": crate::game::START_FEN, "depth": 300 }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].is_string());
        assert!(json.get("fen").is_none());

        let (status, json) = post_json(app(), "/api/analyze", serde_json::json!({ "depth": 2 })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].as_str().unwrap().contains("fen"));

        let request = Request::builder()
            .method("POST")
            .uri("/api/move")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_analyze_endpoint() {
        let (status, json) = post_json(
            app(),
            "/api/analyze",
            serde_json::json!({ "fen": crate::game::START_FEN }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["turn"], "white");
        assert_eq!(json["legal_moves"], 20);
        assert_eq!(json["is_check"], false);
        assert_eq!(json["castling"]["white"]["kingside"], true);
    }
}
