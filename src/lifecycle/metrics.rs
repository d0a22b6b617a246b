// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for credential lifecycle activity.
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
	refresh_attempts: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_failures: AtomicU64,
	refresh_reuses: AtomicU64,
	introspections: AtomicU64,
	introspection_rejections: AtomicU64,
}
impl LifecycleMetrics {
	/// Number of token exchanges sent to the token endpoint.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Number of exchanges that produced a new credential.
	pub fn refresh_successes(&self) -> u64 {
		self.refresh_successes.load(Ordering::Relaxed)
	}

	/// Number of exchanges that failed.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Number of refresh requests satisfied by a concurrent caller's exchange.
	pub fn refresh_reuses(&self) -> u64 {
		self.refresh_reuses.load(Ordering::Relaxed)
	}

	/// Number of introspection calls issued.
	pub fn introspections(&self) -> u64 {
		self.introspections.load(Ordering::Relaxed)
	}

	/// Number of introspection calls that did not confirm the token.
	pub fn introspection_rejections(&self) -> u64 {
		self.introspection_rejections.load(Ordering::Relaxed)
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_success(&self) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_reuse(&self) {
		self.refresh_reuses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_introspection(&self) {
		self.introspections.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_introspection_rejection(&self) {
		self.introspection_rejections.fetch_add(1, Ordering::Relaxed);
	}
}
