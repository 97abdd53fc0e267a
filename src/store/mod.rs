//! Persistence seam for sign-in events and the user directory.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SigninResult;
use crate::models::{SigninEvent, SigninType, TypeFilter, User};

/// Conjunction of event predicates. Unset fields match everything; both
/// timestamp bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub user_id: Option<String>,
    pub signin_type: Option<SigninType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn kind(mut self, filter: impl Into<TypeFilter>) -> Self {
        let filter: TypeFilter = filter.into();
        self.signin_type = filter.signin_type();
        self
    }

    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.since = Some(at);
        self
    }

    pub fn until(mut self, at: DateTime<Utc>) -> Self {
        self.until = Some(at);
        self
    }

    pub fn matches(&self, event: &SigninEvent) -> bool {
        self.user_id
            .as_deref()
            .map_or(true, |user_id| event.user_id == user_id)
            && self
                .signin_type
                .map_or(true, |kind| event.signin_type == kind)
            && self.since.map_or(true, |since| event.recorded_at >= since)
            && self.until.map_or(true, |until| event.recorded_at <= until)
    }
}

/// Append-only event persistence.
#[async_trait]
pub trait SigninStore: Send + Sync {
    async fn insert(&self, event: &SigninEvent) -> SigninResult<()>;

    /// Inserts `event` only when no event for the same user and type exists
    /// at or after `since`. The check and the write are atomic per
    /// `(user, type)`. Returns whether the event was written.
    async fn insert_unless_since(
        &self,
        event: &SigninEvent,
        since: DateTime<Utc>,
    ) -> SigninResult<bool>;

    async fn count(&self, filter: &EventFilter) -> SigninResult<i64>;

    async fn exists(&self, filter: &EventFilter) -> SigninResult<bool>;

    /// Matching events joined with their owner. Order is unspecified.
    async fn query_with_users(&self, filter: &EventFilter)
        -> SigninResult<Vec<(SigninEvent, User)>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails with `UserNotFound` when the id is unknown.
    async fn get(&self, user_id: &str) -> SigninResult<User>;
}
