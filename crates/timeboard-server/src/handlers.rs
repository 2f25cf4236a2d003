//! HTTP handlers for the todo surface.

use std::collections::HashMap;

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Form, Json};

use timeboard_core::{Board, Todo};
use timeboard_store::TodoRepo;

use crate::dispatch::{self, Outcome};
use crate::error::{log_store_failure, ApiError};
use crate::server::AppState;

/// GET /todos
pub async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<Todo>>, ApiError> {
    let repo = TodoRepo::new(state.db.clone());
    let todos = repo.list_all().map_err(ApiError::from).inspect_err(log_store_failure)?;
    Ok(Json(todos))
}

/// POST /todos with a form-encoded intent.
pub async fn submit_intent(
    State(state): State<AppState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Result<Json<Outcome>, ApiError> {
    let Form(params) = form.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let repo = TodoRepo::new(state.db.clone());
    Ok(Json(dispatch::dispatch_params(&repo, &params)?))
}

/// Any other verb on /todos.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// GET /board
pub async fn board(State(state): State<AppState>) -> Result<Json<Board>, ApiError> {
    let repo = TodoRepo::new(state.db.clone());
    let todos = repo.list_all().map_err(ApiError::from).inspect_err(log_store_failure)?;
    Ok(Json(Board::from_todos(todos)))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db.ping();
    let http_status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(serde_json::json!({
            "status": if db_ok { "healthy" } else { "degraded" },
            "components": {
                "database": if db_ok { "ok" } else { "error" },
            },
        })),
    )
}
