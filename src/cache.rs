use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::todos::dto::TodoResponse;

/// Key for a cached todo view. Every variant carries the owning user id:
/// one user's entries can never be handed to another, and a writer drops
/// exactly its own views.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    Page { user_id: i64, page: i64, size: i64 },
    Completed { user_id: i64 },
    Single { user_id: i64, todo_id: i64 },
}

impl ViewKey {
    pub fn user_id(&self) -> i64 {
        match *self {
            ViewKey::Page { user_id, .. }
            | ViewKey::Completed { user_id }
            | ViewKey::Single { user_id, .. } => user_id,
        }
    }
}

/// Read-through cache for todo views. An optimization only: every code path
/// must behave identically with `NoopTodoCache`.
#[async_trait]
pub trait TodoCache: Send + Sync {
    async fn get(&self, key: &ViewKey) -> Option<Vec<TodoResponse>>;
    async fn put(&self, key: ViewKey, todos: Vec<TodoResponse>);
    /// Drops every cached view owned by `user_id`. Writers call this before
    /// returning, so a later read never sees a pre-mutation view.
    async fn invalidate_user(&self, user_id: i64);
}

#[derive(Default)]
pub struct MemoryTodoCache {
    entries: RwLock<HashMap<ViewKey, Vec<TodoResponse>>>,
}

#[async_trait]
impl TodoCache for MemoryTodoCache {
    async fn get(&self, key: &ViewKey) -> Option<Vec<TodoResponse>> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .get(key)
            .cloned()
    }

    async fn put(&self, key: ViewKey, todos: Vec<TodoResponse>) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key, todos);
    }

    async fn invalidate_user(&self, user_id: i64) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .retain(|key, _| key.user_id() != user_id);
        debug!(user_id, "cached todo views invalidated");
    }
}

/// Stand-in when `CACHE_ENABLED=false`: every read is a miss.
pub struct NoopTodoCache;

#[async_trait]
impl TodoCache for NoopTodoCache {
    async fn get(&self, _key: &ViewKey) -> Option<Vec<TodoResponse>> {
        None
    }

    async fn put(&self, _key: ViewKey, _todos: Vec<TodoResponse>) {}

    async fn invalidate_user(&self, _user_id: i64) {}
}
