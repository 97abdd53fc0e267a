use chrono::Duration;

use crate::context::RequestContext;
use crate::error::SigninResult;
use crate::ledger::SigninLedger;
use crate::models::{SigninEvent, SigninType};
use crate::store::EventFilter;

pub const COOLDOWN_HOURS: i64 = 12;

/// Trailing window within which a repeat sign-in of the same type counts as recent.
pub fn cooldown() -> Duration {
    Duration::hours(COOLDOWN_HOURS)
}

/// Outcome of [`SigninLedger::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Recorded(SigninEvent),
    CoolingDown,
}

impl SigninLedger {
    /// Whether the user already has a sign-in of this type inside the cooldown.
    ///
    /// A plain read: pairing it with [`SigninLedger::create`] is not atomic.
    /// Use [`SigninLedger::admit`] when duplicates must be ruled out.
    pub async fn recently_signed_in(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        signin_type: SigninType,
    ) -> SigninResult<bool> {
        ctx.run("signin.recently_signed_in", async {
            let since = self.now() - cooldown();
            let filter = EventFilter::new().user(user_id).kind(signin_type).since(since);
            self.store.exists(&filter).await
        })
        .await
    }

    /// Records a sign-in unless one of the same type landed inside the
    /// cooldown, with the check and the write done atomically by the store.
    pub async fn admit(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        signin_type: SigninType,
    ) -> SigninResult<Admission> {
        ctx.run("signin.admit", async {
            let user = self.users.get(user_id).await?;
            let event = self.new_event(&user, signin_type);
            let since = event.recorded_at - cooldown();

            if self.store.insert_unless_since(&event, since).await? {
                tracing::info!(
                    user_id = %event.user_id,
                    signin_type = %event.signin_type,
                    event_id = %event.id,
                    "admitted sign-in"
                );
                Ok(Admission::Recorded(event))
            } else {
                tracing::debug!(user_id, %signin_type, "sign-in still cooling down");
                Ok(Admission::CoolingDown)
            }
        })
        .await
    }
}
