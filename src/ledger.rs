use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use uuid::Uuid;

use crate::aggregate::Window;
use crate::clock::{Clock, SystemClock};
use crate::context::RequestContext;
use crate::error::SigninResult;
use crate::models::{SigninEvent, SigninType, TypeFilter, User};
use crate::store::{EventFilter, SigninStore, UserDirectory};

/// Sign-in recording and analytics over an injected store.
///
/// Holds no event data of its own; every call reads or writes through the
/// store, so a single ledger can be shared freely between tasks.
#[derive(Clone)]
pub struct SigninLedger {
    pub(crate) store: Arc<dyn SigninStore>,
    pub(crate) users: Arc<dyn UserDirectory>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) day_offset: FixedOffset,
}

impl SigninLedger {
    pub fn new(store: Arc<dyn SigninStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            store,
            users,
            clock: Arc::new(SystemClock),
            day_offset: Utc.fix(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Offset whose midnight bounds calendar-day windows.
    pub fn with_day_offset(mut self, offset: FixedOffset) -> Self {
        self.day_offset = offset;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn new_event(&self, user: &User, signin_type: SigninType) -> SigninEvent {
        SigninEvent {
            id: Uuid::new_v4(),
            user_id: user.id.clone(),
            signin_type,
            recorded_at: self.clock.now(),
        }
    }

    /// Records a sign-in for an existing user, stamped with the ledger clock.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        signin_type: SigninType,
    ) -> SigninResult<SigninEvent> {
        ctx.run("signin.create", async {
            let user = self.users.get(user_id).await?;
            let event = self.new_event(&user, signin_type);
            self.store.insert(&event).await?;
            tracing::info!(
                user_id = %event.user_id,
                signin_type = %event.signin_type,
                event_id = %event.id,
                "recorded sign-in"
            );
            Ok(event)
        })
        .await
    }

    /// Total sign-ins ever recorded for a user, any type.
    pub async fn count_by_user(&self, ctx: &RequestContext, user_id: &str) -> SigninResult<i64> {
        ctx.run("signin.count_by_user", async {
            self.store.count(&EventFilter::new().user(user_id)).await
        })
        .await
    }

    pub async fn count_by_user_and_type(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        signin_type: SigninType,
    ) -> SigninResult<i64> {
        ctx.run("signin.count_by_user_and_type", async {
            self.store
                .count(&EventFilter::new().user(user_id).kind(signin_type))
                .await
        })
        .await
    }

    pub async fn exists_since(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        signin_type: SigninType,
        since: DateTime<Utc>,
    ) -> SigninResult<bool> {
        ctx.run("signin.exists_since", async {
            self.store
                .exists(&EventFilter::new().user(user_id).kind(signin_type).since(since))
                .await
        })
        .await
    }

    /// Events with `start <= recorded_at <= end`, joined with their owner.
    /// A reversed range is rejected before the store is consulted.
    pub async fn query_in_range(
        &self,
        ctx: &RequestContext,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: TypeFilter,
    ) -> SigninResult<Vec<(SigninEvent, User)>> {
        let window = Window::new(start, end)?;
        ctx.run("signin.query_in_range", self.fetch_window(window, filter))
            .await
    }

    pub(crate) async fn fetch_window(
        &self,
        window: Window,
        filter: TypeFilter,
    ) -> SigninResult<Vec<(SigninEvent, User)>> {
        let filter = EventFilter::new()
            .kind(filter)
            .since(window.start())
            .until(window.end());
        self.store.query_with_users(&filter).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::SigninError;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    pub(crate) struct Fixture {
        pub store: Arc<MemoryStore>,
        pub clock: Arc<ManualClock>,
        pub ledger: SigninLedger,
    }

    pub(crate) fn fixture(now: DateTime<Utc>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store.upsert_user("alice", "Alice");
        store.upsert_user("bob", "Bob");
        store.upsert_user("carol", "Carol");
        let clock = Arc::new(ManualClock::new(now));
        let ledger = SigninLedger::new(store.clone(), store.clone()).with_clock(clock.clone());
        Fixture {
            store,
            clock,
            ledger,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 14, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn create_appends_exactly_one_event() {
        let fx = fixture(noon());
        let ctx = RequestContext::new();

        let earlier = fx
            .ledger
            .create(&ctx, "alice", SigninType::Meeting)
            .await
            .unwrap();
        let before = fx
            .ledger
            .count_by_user_and_type(&ctx, "alice", SigninType::Meeting)
            .await
            .unwrap();

        fx.clock.advance(Duration::minutes(5));
        let event = fx
            .ledger
            .create(&ctx, "alice", SigninType::Meeting)
            .await
            .unwrap();
        let after = fx
            .ledger
            .count_by_user_and_type(&ctx, "alice", SigninType::Meeting)
            .await
            .unwrap();

        assert_eq!(after, before + 1);
        assert_eq!(event.recorded_at, noon() + Duration::minutes(5));
        assert_eq!(fx.store.events()[0], earlier);
    }

    #[tokio::test]
    async fn create_rejects_unknown_user_without_writing() {
        let fx = fixture(noon());
        let err = fx
            .ledger
            .create(&RequestContext::new(), "mallory", SigninType::Event)
            .await
            .unwrap_err();

        assert!(matches!(err, SigninError::UserNotFound(id) if id == "mallory"));
        assert!(fx.store.events().is_empty());
    }

    #[tokio::test]
    async fn counts_split_by_type() {
        let fx = fixture(noon());
        let ctx = RequestContext::new();
        for kind in [SigninType::Meeting, SigninType::Meeting, SigninType::Workshop] {
            fx.ledger.create(&ctx, "bob", kind).await.unwrap();
        }

        assert_eq!(fx.ledger.count_by_user(&ctx, "bob").await.unwrap(), 3);
        assert_eq!(
            fx.ledger
                .count_by_user_and_type(&ctx, "bob", SigninType::Workshop)
                .await
                .unwrap(),
            1
        );
        assert_eq!(fx.ledger.count_by_user(&ctx, "carol").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn exists_since_is_inclusive() {
        let fx = fixture(noon());
        let ctx = RequestContext::new();
        fx.ledger
            .create(&ctx, "alice", SigninType::Event)
            .await
            .unwrap();

        assert!(fx
            .ledger
            .exists_since(&ctx, "alice", SigninType::Event, noon())
            .await
            .unwrap());
        assert!(!fx
            .ledger
            .exists_since(&ctx, "alice", SigninType::Event, noon() + Duration::seconds(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn reversed_range_is_rejected() {
        let fx = fixture(noon());
        let err = fx
            .ledger
            .query_in_range(
                &RequestContext::new(),
                noon(),
                noon() - Duration::hours(1),
                TypeFilter::All,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SigninError::InvalidWindow { .. }));
    }

    #[tokio::test]
    async fn range_query_joins_users() {
        let fx = fixture(noon());
        let ctx = RequestContext::new();
        fx.ledger
            .create(&ctx, "carol", SigninType::Volunteer)
            .await
            .unwrap();

        let rows = fx
            .ledger
            .query_in_range(
                &ctx,
                noon() - Duration::hours(1),
                noon(),
                TypeFilter::Only(SigninType::Volunteer),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.username, "Carol");
    }
}
