use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};

use crate::context::RequestContext;
use crate::error::{SigninError, SigninResult};
use crate::ledger::SigninLedger;
use crate::models::{RankedList, SigninType, TypeFilter};
use crate::rank::rank;

/// Closed time interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> SigninResult<Self> {
        if end < start {
            return Err(SigninError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// `[now - delta, now]`. A delta reaching past the representable range
    /// is an invalid window.
    pub fn trailing(now: DateTime<Utc>, delta: Duration) -> SigninResult<Self> {
        let start = now
            .checked_sub_signed(delta)
            .ok_or(SigninError::InvalidWindow {
                start: DateTime::<Utc>::MIN_UTC,
                end: now,
            })?;
        Self::new(start, now)
    }

    /// Midnight through 23:59:59 of `date` at the given offset.
    pub fn calendar_day(date: NaiveDate, offset: FixedOffset) -> SigninResult<Self> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let start = local_midnight
            .checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))
            .map(|midnight| midnight.and_utc())
            .ok_or(SigninError::InvalidWindow {
                start: DateTime::<Utc>::MIN_UTC,
                end: DateTime::<Utc>::MAX_UTC,
            })?;
        let end = start
            .checked_add_signed(Duration::days(1) - Duration::seconds(1))
            .ok_or(SigninError::InvalidWindow {
                start,
                end: DateTime::<Utc>::MAX_UTC,
            })?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl SigninLedger {
    /// Per-user sign-in counts over the trailing `delta`, ranked.
    pub async fn aggregate(
        &self,
        ctx: &RequestContext,
        delta: Duration,
        filter: TypeFilter,
    ) -> SigninResult<RankedList<String>> {
        let window = Window::trailing(self.now(), delta)?;
        self.aggregate_window(ctx, window, filter).await
    }

    /// Per-user sign-in counts for one calendar day in the ledger's offset.
    pub async fn aggregate_day(
        &self,
        ctx: &RequestContext,
        date: NaiveDate,
        filter: TypeFilter,
    ) -> SigninResult<RankedList<String>> {
        let window = Window::calendar_day(date, self.day_offset)?;
        self.aggregate_window(ctx, window, filter).await
    }

    pub async fn aggregate_window(
        &self,
        ctx: &RequestContext,
        window: Window,
        filter: TypeFilter,
    ) -> SigninResult<RankedList<String>> {
        ctx.run("signin.aggregate", async {
            let rows = self.fetch_window(window, filter).await?;

            let mut counts: HashMap<String, usize> = HashMap::new();
            for (_, user) in rows {
                *counts.entry(user.id).or_insert(0) += 1;
            }

            tracing::debug!(
                start = %window.start(),
                end = %window.end(),
                %filter,
                users = counts.len(),
                "aggregated sign-ins"
            );
            Ok(rank(counts))
        })
        .await
    }

    /// Sign-in totals per type over a window, ranked.
    pub async fn aggregate_types(
        &self,
        ctx: &RequestContext,
        window: Window,
    ) -> SigninResult<RankedList<SigninType>> {
        ctx.run("signin.aggregate_types", async {
            let rows = self.fetch_window(window, TypeFilter::All).await?;

            let mut counts: HashMap<SigninType, usize> = HashMap::new();
            for (event, _) in rows {
                *counts.entry(event.signin_type).or_insert(0) += 1;
            }
            Ok(rank(counts))
        })
        .await
    }
}
