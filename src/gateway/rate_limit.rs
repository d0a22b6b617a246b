//! Rate limit policy contracts consulted before the gateway dispatches an upstream query.

// std
use std::num::NonZeroU32;
// crates.io
use time::PrimitiveDateTime;
// self
use crate::{_prelude::*, gateway::AggregationLevel};

/// Boxed future returned by [`RateLimitPolicy::evaluate`].
pub type RateLimitFuture<'a> = Pin<Box<dyn Future<Output = RateLimitDecision> + 'a + Send>>;

/// Strategy that decides whether the next upstream query may go out now.
pub trait RateLimitPolicy
where
	Self: Send + Sync,
{
	/// Evaluates whether the next call should be delayed.
	fn evaluate(&self, context: &RateLimitContext) -> RateLimitFuture<'_>;
}

/// Context shared with a [`RateLimitPolicy`] before an upstream call is made.
#[derive(Clone, Debug)]
pub struct RateLimitContext {
	/// Upstream object the query targets.
	pub target_id: String,
	/// Aggregation level of the query.
	pub level: AggregationLevel,
	/// Timestamp the gateway observed before invoking the policy.
	pub observed_at: OffsetDateTime,
}
impl RateLimitContext {
	/// Creates a context stamped with the current time.
	pub fn new(target_id: impl Into<String>, level: AggregationLevel) -> Self {
		Self { target_id: target_id.into(), level, observed_at: OffsetDateTime::now_utc() }
	}

	/// Overrides the timestamp associated with the observation.
	pub fn with_observed_at(mut self, instant: OffsetDateTime) -> Self {
		self.observed_at = instant;

		self
	}
}

/// Result emitted by a [`RateLimitPolicy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Allow,
	/// The request should be delayed.
	Delay(RetryDirective),
}

/// Advises callers when to retry after a [`RateLimitDecision::Delay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when it is safe to retry.
	pub earliest_retry_at: OffsetDateTime,
	/// Suggested backoff duration.
	pub recommended_backoff: Duration,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff }
	}
}

/// Allows at most `limit` upstream queries per fixed `window`, shared by all targets.
#[derive(Debug)]
pub struct FixedWindowLimiter {
	limit: NonZeroU32,
	window: Duration,
	state: Mutex<WindowState>,
}
impl FixedWindowLimiter {
	/// Creates a limiter admitting `limit` calls per `window`.
	pub fn new(limit: NonZeroU32, window: Duration) -> Self {
		Self {
			limit,
			window,
			state: Mutex::new(WindowState { started_at: OffsetDateTime::UNIX_EPOCH, used: 0 }),
		}
	}

	/// Configured call budget per window.
	pub fn limit(&self) -> NonZeroU32 {
		self.limit
	}

	/// Configured window length.
	pub fn window(&self) -> Duration {
		self.window
	}

	fn decide(&self, now: OffsetDateTime) -> RateLimitDecision {
		let mut state = self.state.lock();

		if state.used == 0 || now - state.started_at >= self.window {
			*state = WindowState { started_at: now, used: 0 };
		}
		if state.used < self.limit.get() {
			state.used += 1;

			return RateLimitDecision::Allow;
		}

		let earliest_retry_at = state
			.started_at
			.checked_add(self.window)
			.unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc());

		RateLimitDecision::Delay(RetryDirective::new(earliest_retry_at, earliest_retry_at - now))
	}
}
impl RateLimitPolicy for FixedWindowLimiter {
	fn evaluate(&self, context: &RateLimitContext) -> RateLimitFuture<'_> {
		let decision = self.decide(context.observed_at);

		Box::pin(async move { decision })
	}
}

#[derive(Debug)]
struct WindowState {
	started_at: OffsetDateTime,
	used: u32,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn limiter(limit: u32) -> FixedWindowLimiter {
		FixedWindowLimiter::new(
			NonZeroU32::new(limit).expect("Fixture limit should be non-zero."),
			Duration::seconds(1),
		)
	}

	#[test]
	fn window_admits_up_to_limit_then_delays() {
		let limiter = limiter(2);
		let start = macros::datetime!(2025-01-01 00:00:00 UTC);

		assert_eq!(limiter.decide(start), RateLimitDecision::Allow);
		assert_eq!(limiter.decide(start + Duration::milliseconds(100)), RateLimitDecision::Allow);

		let decision = limiter.decide(start + Duration::milliseconds(400));

		assert_eq!(
			decision,
			RateLimitDecision::Delay(RetryDirective::new(
				macros::datetime!(2025-01-01 00:00:01 UTC),
				Duration::milliseconds(600)
			))
		);
	}

	#[test]
	fn new_window_resets_budget() {
		let limiter = limiter(1);
		let start = macros::datetime!(2025-01-01 00:00:00 UTC);

		assert_eq!(limiter.decide(start), RateLimitDecision::Allow);
		assert!(matches!(limiter.decide(start), RateLimitDecision::Delay(_)));
		assert_eq!(limiter.decide(start + Duration::seconds(1)), RateLimitDecision::Allow);
	}

	#[test]
	fn huge_window_saturates_retry_instant() {
		let limiter = FixedWindowLimiter::new(
			NonZeroU32::new(1).expect("Fixture limit should be non-zero."),
			Duration::MAX,
		);
		let start = macros::datetime!(2025-01-01 00:00:00 UTC);

		assert_eq!(limiter.decide(start), RateLimitDecision::Allow);

		match limiter.decide(start + Duration::seconds(1)) {
			RateLimitDecision::Delay(directive) => {
				assert_eq!(directive.earliest_retry_at, PrimitiveDateTime::MAX.assume_utc());
				assert!(directive.recommended_backoff.is_positive());
			},
			RateLimitDecision::Allow => panic!("Second call should be delayed."),
		}
	}

	#[tokio::test]
	async fn policy_evaluates_context_timestamp() {
		let limiter = limiter(1);
		let context = RateLimitContext::new("123", AggregationLevel::Campaign)
			.with_observed_at(macros::datetime!(2025-01-01 00:00:00 UTC));

		assert_eq!(limiter.evaluate(&context).await, RateLimitDecision::Allow);
		assert!(matches!(limiter.evaluate(&context).await, RateLimitDecision::Delay(_)));
	}
}
