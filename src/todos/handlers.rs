use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthPrincipal,
    error::ApiError,
    state::AppState,
    todos::{
        dto::{Pagination, TodoCreateRequest, TodoResponse, TodoUpdateRequest},
        service,
    },
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/todos",
            get(list_todos).post(create_todo).put(update_todo),
        )
        .route("/todos/completed", get(list_completed))
        .route("/todos/:id", get(get_todo))
}

#[instrument(skip(state, payload))]
async fn create_todo(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(payload): Json<TodoCreateRequest>,
) -> Result<StatusCode, ApiError> {
    service::create_todo(&state, &principal, payload).await?;
    Ok(StatusCode::CREATED)
}

#[instrument(skip(state, payload))]
async fn update_todo(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(payload): Json<TodoUpdateRequest>,
) -> Result<Json<TodoResponse>, ApiError> {
    service::update_todo(&state, &principal, payload)
        .await
        .map(Json)
}

#[instrument(skip(state))]
async fn list_todos(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Query(window): Query<Pagination>,
) -> Result<Json<Vec<TodoResponse>>, ApiError> {
    service::list_todos(&state, &principal, window.page, window.size)
        .await
        .map(Json)
}

#[instrument(skip(state))]
async fn list_completed(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Vec<TodoResponse>>, ApiError> {
    service::list_completed(&state, &principal).await.map(Json)
}

#[instrument(skip(state))]
async fn get_todo(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<i64>,
) -> Result<Json<TodoResponse>, ApiError> {
    service::get_todo(&state, &principal, id).await.map(Json)
}
