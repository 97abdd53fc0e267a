//! Per-request deadline and tracing parent, applied around every ledger
//! operation by [`RequestContext::run`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Instrument, Span};

use crate::error::{SigninError, SigninResult};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    parent: Option<Span>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_parent(mut self, parent: Span) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `work` inside a span named after `operation`, dropping it with
    /// [`SigninError::Timeout`] once the deadline passes.
    pub async fn run<T, F>(&self, operation: &'static str, work: F) -> SigninResult<T>
    where
        F: Future<Output = SigninResult<T>>,
    {
        let parent = self
            .parent
            .as_ref()
            .map_or_else(|| Span::current().id(), Span::id);
        let span = tracing::info_span!(parent: parent, "signin", operation);
        let work = work.instrument(span.clone());

        let result = match self.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, work).await {
                Ok(result) => result,
                Err(_) => Err(SigninError::Timeout { operation }),
            },
            None => work.await,
        };

        span.in_scope(|| match &result {
            Ok(_) => tracing::debug!("operation complete"),
            Err(err) => tracing::warn!(error = %err, "operation failed"),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_results_through() {
        let ctx = RequestContext::new();
        let value = ctx.run("signin.test", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);

        let err = ctx
            .run::<(), _>("signin.test", async {
                Err(SigninError::UserNotFound("ghost".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SigninError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn expired_deadline_surfaces_timeout() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(10));
        let err = ctx
            .run("signin.slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SigninError::Timeout { operation: "signin.slow" }));
    }
}
