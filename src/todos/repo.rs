use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: i64,
    pub user_id: i64, // owner, set once at creation
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Replacement values for an update. The owner is not part of this: it comes
/// from the resolved principal and only ever narrows the predicate.
#[derive(Debug, Clone)]
pub struct TodoUpdate {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

/// Owner-scoped todo storage. Every compound id+owner predicate runs as a
/// single statement (or a single lock hold), so a row owned by someone else
/// is indistinguishable from a missing one and there is no window between
/// the ownership check and the write.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn insert(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Todo, ApiError>;

    /// Full replace of title/description/completed, bumping `updated_at`.
    /// `None` when no row matches both the id and the owner.
    async fn update_scoped(
        &self,
        user_id: i64,
        update: &TodoUpdate,
    ) -> Result<Option<Todo>, ApiError>;

    async fn find_scoped(&self, user_id: i64, todo_id: i64) -> Result<Option<Todo>, ApiError>;

    /// One page of a user's todos in insertion (id) order; `page` is
    /// 1-indexed. A page past the end is an empty vec, not an error.
    async fn list_page(&self, user_id: i64, page: i64, size: i64) -> Result<Vec<Todo>, ApiError>;

    async fn list_completed(&self, user_id: i64) -> Result<Vec<Todo>, ApiError>;
}

pub struct PgTodoStore {
    db: PgPool,
}

impl PgTodoStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn insert(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Todo, ApiError> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (user_id, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, description, completed, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(description)
        .fetch_one(&self.db)
        .await?;
        Ok(todo)
    }

    async fn update_scoped(
        &self,
        user_id: i64,
        update: &TodoUpdate,
    ) -> Result<Option<Todo>, ApiError> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
            SET title = $1, description = $2, completed = $3, updated_at = now()
            WHERE id = $4 AND user_id = $5
            RETURNING id, user_id, title, description, completed, created_at, updated_at
            "#,
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.completed)
        .bind(update.id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(todo)
    }

    async fn find_scoped(&self, user_id: i64, todo_id: i64) -> Result<Option<Todo>, ApiError> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, user_id, title, description, completed, created_at, updated_at
            FROM todos
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(todo_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(todo)
    }

    async fn list_page(&self, user_id: i64, page: i64, size: i64) -> Result<Vec<Todo>, ApiError> {
        let offset = (page - 1).max(0) * size;
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, user_id, title, description, completed, created_at, updated_at
            FROM todos
            WHERE user_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(size)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn list_completed(&self, user_id: i64) -> Result<Vec<Todo>, ApiError> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, user_id, title, description, completed, created_at, updated_at
            FROM todos
            WHERE user_id = $1 AND completed = TRUE
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
pub use mem::MemTodoStore;
