use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::db::Database;
use crate::error::AppError;
use crate::hiscores::HiscoresSource;
use crate::tracker;

mod page;

/// Snapshots returned by `GET /players/:username`
const HISTORY_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub hiscores: Arc<dyn HiscoresSource>,
}

/// Build the Axum router for the page and the JSON API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/players", get(list_players_handler).post(add_player_handler))
        .route("/players/:username", get(player_handler))
        .route("/players/:username/sync", post(sync_handler))
        .route("/status", post(status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPlayerRequest {
    osrs_username: Option<String>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    player_id: Option<i64>,
    message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream { .. }
            | AppError::Parse { .. }
            | AppError::Storage(_)
            | AppError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        let mut body = json!({ "error": self.to_string(), "kind": self.kind() });
        if let AppError::Upstream {
            status: Some(code), ..
        } = &self
        {
            body["upstreamStatus"] = json!(code);
        }
        (status, Json(body)).into_response()
    }
}

fn body_or_validation<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e.body_text())))
}

/// GET /
async fn index_handler(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let players = state.db.list_players()?;
    Ok(Html(page::render_index(&players)))
}

/// GET /players
async fn list_players_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let players = state.db.list_players()?;
    Ok(Json(json!({ "players": players })))
}

/// POST /players
async fn add_player_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddPlayerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = body_or_validation(payload)?;
    let (player, stats) = tracker::register_player(
        &state.db,
        state.hiscores.as_ref(),
        req.osrs_username.as_deref(),
        req.display_name.as_deref(),
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "player": player, "stats": stats })),
    ))
}

/// GET /players/:username
async fn player_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (player, snapshots) = tracker::player_history(&state.db, &username, HISTORY_LIMIT)?;
    Ok(Json(json!({ "player": player, "snapshots": snapshots })))
}

/// POST /players/:username/sync
async fn sync_handler(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (player_id, stats) =
        tracker::sync_player(&state.db, state.hiscores.as_ref(), &username).await?;
    Ok(Json(json!({ "playerId": player_id, "stats": stats })))
}

/// POST /status
async fn status_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = body_or_validation(payload)?;
    tracker::post_status(&state.db, req.player_id, req.message.as_deref())?;
    Ok(Json(json!({ "ok": true })))
}
