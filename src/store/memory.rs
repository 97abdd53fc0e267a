use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{EventFilter, SigninStore, UserDirectory};
use crate::error::{SigninError, SigninResult};
use crate::models::{SigninEvent, User};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    signins: Vec<SigninEvent>,
}

/// In-process store for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn upsert_user(&self, id: &str, username: &str) -> User {
        let user = User {
            id: id.to_string(),
            username: username.to_string(),
        };
        self.tables().users.insert(user.id.clone(), user.clone());
        user
    }

    /// Every stored event in insertion order.
    pub fn events(&self) -> Vec<SigninEvent> {
        self.tables().signins.clone()
    }
}

#[async_trait]
impl SigninStore for MemoryStore {
    async fn insert(&self, event: &SigninEvent) -> SigninResult<()> {
        self.tables().signins.push(event.clone());
        Ok(())
    }

    async fn insert_unless_since(
        &self,
        event: &SigninEvent,
        since: DateTime<Utc>,
    ) -> SigninResult<bool> {
        let filter = EventFilter::new()
            .user(&event.user_id)
            .kind(event.signin_type)
            .since(since);

        let mut tables = self.tables();
        if tables.signins.iter().any(|existing| filter.matches(existing)) {
            return Ok(false);
        }
        tables.signins.push(event.clone());
        Ok(true)
    }

    async fn count(&self, filter: &EventFilter) -> SigninResult<i64> {
        let count = self
            .tables()
            .signins
            .iter()
            .filter(|event| filter.matches(event))
            .count();
        Ok(count as i64)
    }

    async fn exists(&self, filter: &EventFilter) -> SigninResult<bool> {
        Ok(self.tables().signins.iter().any(|event| filter.matches(event)))
    }

    async fn query_with_users(
        &self,
        filter: &EventFilter,
    ) -> SigninResult<Vec<(SigninEvent, User)>> {
        let tables = self.tables();
        let mut rows = Vec::new();
        for event in tables.signins.iter().filter(|event| filter.matches(event)) {
            let user = tables
                .users
                .get(&event.user_id)
                .cloned()
                .ok_or_else(|| SigninError::UserNotFound(event.user_id.clone()))?;
            rows.push((event.clone(), user));
        }
        Ok(rows)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn get(&self, user_id: &str) -> SigninResult<User> {
        self.tables()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| SigninError::UserNotFound(user_id.to_string()))
    }
}
