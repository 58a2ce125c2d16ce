//! Axum HTTP server: player profile store for the mini-app.
//!
//! Profiles are opaque JSON objects; the server only stamps timestamps.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/miniapp/player` | Store a new profile, returns `{"_id"}` |
//! | PUT | `/miniapp/player/:id` | Replace a profile |
//! | GET | `/miniapp/player/:id` | Fetch a profile |
//! | GET | `/miniapp/health` | Health check |

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use quizroom_core::{Database, DatabaseError};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub type AppState = Arc<Database>;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn create_router(db: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let api = Router::new()
        .route("/player", post(handle_create_player))
        .route(
            "/player/:id",
            get(handle_get_player).put(handle_replace_player),
        )
        .route("/health", get(handle_health_check));

    Router::new()
        .nest("/miniapp", api)
        .layer(cors)
        .with_state(db)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(db: AppState, host: &str, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(addr = %listener.local_addr()?, "mini-app API listening");
    axum::serve(listener, create_router(db))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

fn error_response(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": msg })))
}

fn storage_error(err: DatabaseError, msg: &str) -> (StatusCode, Json<Value>) {
    match err {
        DatabaseError::Payload(detail) => error_response(StatusCode::BAD_REQUEST, &detail),
        other => {
            error!(error = %other, "{msg}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

async fn handle_health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "miniapp-api" }))
}

async fn handle_create_player(State(db): State<AppState>, Json(body): Json<Value>) -> ApiResult {
    let id = db
        .create_player(body)
        .map_err(|e| storage_error(e, "Failed to create player"))?;
    Ok(Json(json!({ "_id": id })))
}

async fn handle_replace_player(
    State(db): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    db.replace_player(&id, body)
        .map_err(|e| storage_error(e, "Failed to save player"))?;
    Ok(Json(json!({ "success": true, "message": "Player data saved" })))
}

async fn handle_get_player(State(db): State<AppState>, Path(id): Path<String>) -> ApiResult {
    match db.get_player(&id) {
        Ok(Some(player)) => Ok(Json(player)),
        Ok(None) => Err(error_response(StatusCode::NOT_FOUND, "Player not found")),
        Err(e) => Err(storage_error(e, "Failed to load player")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> (Router, AppState) {
        let db = Arc::new(Database::open_memory().unwrap());
        (create_router(Arc::clone(&db)), db)
    }

    async fn body_json(body: Body) -> Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // ── GET /miniapp/health ──────────────────────────────────────────

    #[tokio::test]
    async fn health_returns_ok() {
        let (app, _) = app();
        let resp = app
            .oneshot(Request::get("/miniapp/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json, json!({"status": "ok", "service": "miniapp-api"}));
    }

    // ── POST /miniapp/player ─────────────────────────────────────────

    #[tokio::test]
    async fn create_then_fetch_player() {
        let (app, _) = app();
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/miniapp/player", json!({"name": "Hypatia"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let id = body_json(resp.into_body()).await["_id"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = app
            .oneshot(
                Request::get(format!("/miniapp/player/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let player = body_json(resp.into_body()).await;
        assert_eq!(player["name"], "Hypatia");
        assert!(player["createdAt"].is_string());
        assert!(player["lastUpdated"].is_string());
    }

    #[tokio::test]
    async fn create_rejects_non_object_body() {
        let (app, db) = app();
        let resp = app
            .oneshot(json_request("POST", "/miniapp/player", json!("just a string")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(db.player_count().unwrap(), 0);
    }

    // ── PUT /miniapp/player/:id ──────────────────────────────────────

    #[tokio::test]
    async fn put_replaces_player() {
        let (app, db) = app();
        let id = db.create_player(json!({"level": 1, "name": "A"})).unwrap();

        let resp = app
            .oneshot(json_request(
                "PUT",
                &format!("/miniapp/player/{id}"),
                json!({"level": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp.into_body()).await,
            json!({"success": true, "message": "Player data saved"})
        );

        let stored = db.get_player(&id).unwrap().unwrap();
        assert_eq!(stored["level"], 2);
        assert!(stored.get("name").is_none());
    }

    // ── GET /miniapp/player/:id ──────────────────────────────────────

    #[tokio::test]
    async fn unknown_player_is_404() {
        let (app, _) = app();
        let resp = app
            .oneshot(
                Request::get("/miniapp/player/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(resp.into_body()).await["error"],
            "Player not found"
        );
    }

    #[tokio::test]
    async fn cors_preflight_is_allowed() {
        let (app, _) = app();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/miniapp/player")
                    .header(header::ORIGIN, "https://example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
