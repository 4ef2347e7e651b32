use tracing::{info, warn};

use crate::{
    auth::identity::{resolve_user_id, Principal},
    cache::ViewKey,
    error::ApiError,
    state::AppState,
    todos::{
        dto::{TodoCreateRequest, TodoResponse, TodoUpdateRequest},
        repo::TodoUpdate,
    },
};

const TITLE_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be blank".into()));
    }
    if title.chars().count() > TITLE_MAX {
        return Err(ApiError::Validation(
            "title must not exceed 100 characters".into(),
        ));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), ApiError> {
    if let Some(d) = description {
        if d.chars().count() > DESCRIPTION_MAX {
            return Err(ApiError::Validation(
                "description must not exceed 500 characters".into(),
            ));
        }
    }
    Ok(())
}

// Every operation below follows the same discipline: resolve the caller's
// user id before touching todo storage or the cache, then keep that id in
// every predicate.

pub async fn create_todo(
    state: &AppState,
    principal: &Principal,
    payload: TodoCreateRequest,
) -> Result<(), ApiError> {
    let user_id = resolve_user_id(principal, state.users.as_ref()).await?;
    validate_title(&payload.title)?;
    validate_description(payload.description.as_deref())?;

    let todo = state
        .todos
        .insert(user_id, &payload.title, payload.description.as_deref())
        .await?;
    state.cache.invalidate_user(user_id).await;
    info!(user_id, todo_id = todo.id, "todo created");
    Ok(())
}

pub async fn update_todo(
    state: &AppState,
    principal: &Principal,
    payload: TodoUpdateRequest,
) -> Result<TodoResponse, ApiError> {
    let user_id = resolve_user_id(principal, state.users.as_ref()).await?;
    validate_title(&payload.title)?;
    validate_description(payload.description.as_deref())?;

    let update = TodoUpdate {
        id: payload.id,
        title: payload.title,
        description: payload.description,
        completed: payload.completed,
    };
    let updated = state
        .todos
        .update_scoped(user_id, &update)
        .await?
        .ok_or_else(|| {
            // Missing row and foreign-owned row look exactly the same here.
            warn!(user_id, todo_id = update.id, "update matched no row");
            ApiError::NotFound
        })?;

    state.cache.invalidate_user(user_id).await;
    info!(user_id, todo_id = updated.id, "todo updated");
    Ok(updated.into())
}

pub async fn get_todo(
    state: &AppState,
    principal: &Principal,
    todo_id: i64,
) -> Result<TodoResponse, ApiError> {
    let user_id = resolve_user_id(principal, state.users.as_ref()).await?;

    let key = ViewKey::Single { user_id, todo_id };
    if let Some(mut cached) = state.cache.get(&key).await {
        if let Some(todo) = cached.pop() {
            return Ok(todo);
        }
    }

    let todo: TodoResponse = state
        .todos
        .find_scoped(user_id, todo_id)
        .await?
        .ok_or(ApiError::NotFound)?
        .into();
    state.cache.put(key, vec![todo.clone()]).await;
    Ok(todo)
}

pub async fn list_todos(
    state: &AppState,
    principal: &Principal,
    page: i64,
    size: i64,
) -> Result<Vec<TodoResponse>, ApiError> {
    let user_id = resolve_user_id(principal, state.users.as_ref()).await?;
    if page < 1 {
        return Err(ApiError::Validation("page must be at least 1".into()));
    }
    if size < 1 {
        return Err(ApiError::Validation("size must be at least 1".into()));
    }

    let key = ViewKey::Page {
        user_id,
        page,
        size,
    };
    if let Some(cached) = state.cache.get(&key).await {
        return Ok(cached);
    }

    let todos: Vec<TodoResponse> = state
        .todos
        .list_page(user_id, page, size)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    state.cache.put(key, todos.clone()).await;
    Ok(todos)
}

pub async fn list_completed(
    state: &AppState,
    principal: &Principal,
) -> Result<Vec<TodoResponse>, ApiError> {
    let user_id = resolve_user_id(principal, state.users.as_ref()).await?;

    let key = ViewKey::Completed { user_id };
    if let Some(cached) = state.cache.get(&key).await {
        return Ok(cached);
    }

    let todos: Vec<TodoResponse> = state
        .todos
        .list_completed(user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    state.cache.put(key, todos.clone()).await;
    Ok(todos)
}
