//! In-process TTL cache for insights payloads with per-key singleflight.
//!
//! [`ResponseCache::get_or_compute`] serves live entries directly. On a miss it takes the
//! fingerprint's guard, checks again, and runs the compute closure at most once for all
//! callers queued on that guard. Only successful payloads are stored.
//!
//! Both maps stay bounded by live traffic: a guard is dropped as soon as its last holder
//! finishes (or is cancelled), and every insert sweeps entries that can no longer be served.

// crates.io
use time::PrimitiveDateTime;
// self
use crate::{_prelude::*, gateway::UpstreamRequestSpec, obs};

type GuardMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Upstream `data` array returned for one query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightsPayload {
	/// Raw insight rows as returned upstream.
	pub insights: Vec<serde_json::Value>,
}

/// Cached payload plus its expiry.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	/// Payload served on hits.
	pub payload: InsightsPayload,
	/// First instant at which the entry is no longer served.
	pub expires_at: OffsetDateTime,
}
impl CacheEntry {
	/// Returns `true` while the entry may still be served.
	pub fn is_live_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}

/// Fixed-TTL response cache keyed by [`UpstreamRequestSpec::fingerprint`].
#[derive(Debug)]
pub struct ResponseCache {
	ttl: Duration,
	entries: Mutex<HashMap<String, CacheEntry>>,
	guards: GuardMap,
}
impl ResponseCache {
	/// Default time-to-live (five minutes).
	pub const DEFAULT_TTL: Duration = Duration::minutes(5);

	/// Creates a cache with the provided TTL; a non-positive TTL never serves hits.
	///
	/// Expiries past the representable range saturate, so a huge TTL means "never expires".
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, entries: Default::default(), guards: Default::default() }
	}

	/// Configured time-to-live.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Returns the live payload for `spec`, if any.
	pub fn get(&self, spec: &UpstreamRequestSpec) -> Option<InsightsPayload> {
		self.lookup(&spec.fingerprint(), OffsetDateTime::now_utc())
	}

	/// Returns the cached payload for `spec`, or runs `compute` and caches its success.
	///
	/// Concurrent callers for the same fingerprint share one `compute` run; errors are
	/// returned to the caller that ran it and are never cached, so the next caller retries.
	pub async fn get_or_compute<F, Fut, E>(
		&self,
		spec: &UpstreamRequestSpec,
		compute: F,
	) -> Result<InsightsPayload, E>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<InsightsPayload, E>>,
	{
		let key = spec.fingerprint();

		if let Some(payload) = self.lookup(&key, OffsetDateTime::now_utc()) {
			obs::record_cache_lookup(obs::CacheLookup::Hit);

			return Ok(payload);
		}

		let lease = GuardLease::acquire(&self.guards, &key);
		let _singleflight = lease.guard.lock().await;

		if let Some(payload) = self.lookup(&key, OffsetDateTime::now_utc()) {
			obs::record_cache_lookup(obs::CacheLookup::Coalesced);

			return Ok(payload);
		}

		obs::record_cache_lookup(obs::CacheLookup::Miss);

		let payload = compute().await?;

		self.insert(key.clone(), payload.clone(), OffsetDateTime::now_utc());

		Ok(payload)
	}

	/// Drops every entry that can no longer be served; returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		let now = OffsetDateTime::now_utc();
		let mut entries = self.entries.lock();
		let before = entries.len();

		entries.retain(|_, entry| entry.is_live_at(now));

		let removed = before - entries.len();

		drop(entries);
		self.guards.lock().retain(|_, guard| Arc::strong_count(guard) > 1);

		removed
	}

	/// Number of stored entries, including expired ones not yet purged.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	fn lookup(&self, key: &str, now: OffsetDateTime) -> Option<InsightsPayload> {
		self.entries
			.lock()
			.get(key)
			.filter(|entry| entry.is_live_at(now))
			.map(|entry| entry.payload.clone())
	}

	fn insert(&self, key: String, payload: InsightsPayload, now: OffsetDateTime) {
		let expires_at =
			now.checked_add(self.ttl).unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc());
		let mut entries = self.entries.lock();

		entries.retain(|_, entry| entry.is_live_at(now));
		entries.insert(key, CacheEntry { payload, expires_at });
	}

	#[cfg(test)]
	fn guard_count(&self) -> usize {
		self.guards.lock().len()
	}
}
/// Shared handle on a key's singleflight guard; the map entry goes away with its last holder.
struct GuardLease<'a> {
	guards: &'a GuardMap,
	key: &'a str,
	guard: Arc<AsyncMutex<()>>,
}
impl<'a> GuardLease<'a> {
	fn acquire(guards: &'a GuardMap, key: &'a str) -> Self {
		let guard = guards
			.lock()
			.entry(key.to_owned())
			.or_insert_with(|| Arc::new(AsyncMutex::new(())))
			.clone();

		Self { guards, key, guard }
	}
}
impl Drop for GuardLease<'_> {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		// Clones are only handed out under this lock, so a count of two (map + us) is final.
		if Arc::strong_count(&self.guard) == 2
			&& guards.get(self.key).is_some_and(|current| Arc::ptr_eq(current, &self.guard))
		{
			guards.remove(self.key);
		}
	}
}

impl Default for ResponseCache {
	fn default() -> Self {
		Self::new(Self::DEFAULT_TTL)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{error::GatewayError, gateway::InsightsQuery};

	fn spec(id: &str) -> UpstreamRequestSpec {
		InsightsQuery::new(id, "campaign", "2025-01-01", "2025-01-31")
			.try_into()
			.expect("Fixture query should be valid.")
	}

	fn payload(reach: u64) -> InsightsPayload {
		InsightsPayload { insights: vec![serde_json::json!({ "reach": reach })] }
	}

	#[tokio::test]
	async fn live_entry_skips_compute() {
		let cache = ResponseCache::default();
		let calls = AtomicUsize::new(0);

		for _ in 0..2 {
			let value = cache
				.get_or_compute(&spec("1"), || async {
					calls.fetch_add(1, Ordering::SeqCst);

					Ok::<_, GatewayError>(payload(100))
				})
				.await
				.expect("Compute should succeed.");

			assert_eq!(value, payload(100));
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get(&spec("1")), Some(payload(100)));
		assert_eq!(cache.get(&spec("2")), None);
	}

	#[tokio::test]
	async fn errors_are_not_cached() {
		let cache = ResponseCache::default();
		let err = cache
			.get_or_compute(&spec("1"), || async {
				Err::<InsightsPayload, _>(GatewayError::UpstreamError {
					status: Some(500),
					detail: "boom".into(),
				})
			})
			.await
			.expect_err("Compute failure should propagate.");

		assert_eq!(err.status_code(), 502);
		assert!(cache.is_empty());
		assert_eq!(cache.guard_count(), 0);

		let value = cache
			.get_or_compute(&spec("1"), || async { Ok::<_, GatewayError>(payload(7)) })
			.await
			.expect("Retry should compute again.");

		assert_eq!(value, payload(7));
	}

	#[tokio::test]
	async fn zero_ttl_always_recomputes_and_purges() {
		let cache = ResponseCache::new(Duration::ZERO);
		let calls = AtomicUsize::new(0);

		for _ in 0..3 {
			cache
				.get_or_compute(&spec("1"), || async {
					calls.fetch_add(1, Ordering::SeqCst);

					Ok::<_, GatewayError>(payload(1))
				})
				.await
				.expect("Compute should succeed.");
		}

		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.purge_expired(), 1);
		assert!(cache.is_empty());
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_misses_share_one_compute() {
		let cache = Arc::new(ResponseCache::default());
		let calls = Arc::new(AtomicUsize::new(0));
		let tasks = (0..8)
			.map(|_| {
				let cache = cache.clone();
				let calls = calls.clone();

				tokio::spawn(async move {
					cache
						.get_or_compute(&spec("1"), || async {
							calls.fetch_add(1, Ordering::SeqCst);
							tokio::time::sleep(std::time::Duration::from_millis(50)).await;

							Ok::<_, GatewayError>(payload(42))
						})
						.await
				})
			})
			.collect::<Vec<_>>();

		for task in tasks {
			let value = task
				.await
				.expect("Task should not panic.")
				.expect("Compute should succeed.");

			assert_eq!(value, payload(42));
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(cache.guard_count(), 0);
	}

	#[tokio::test]
	async fn guards_are_released_after_compute() {
		let cache = ResponseCache::default();

		for id in ["1", "2", "3"] {
			cache
				.get_or_compute(&spec(id), || async {
					assert_eq!(cache.guard_count(), 1);

					Ok::<_, GatewayError>(payload(1))
				})
				.await
				.expect("Compute should succeed.");
		}

		assert_eq!(cache.len(), 3);
		assert_eq!(cache.guard_count(), 0);
	}

	#[tokio::test]
	async fn cancelled_compute_releases_its_guard() {
		let cache = ResponseCache::default();
		let target = spec("1");
		let pending = cache.get_or_compute(&target, || async {
			std::future::pending::<Result<InsightsPayload, GatewayError>>().await
		});
		let timed_out =
			tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;

		assert!(timed_out.is_err());
		assert_eq!(cache.guard_count(), 0);
		assert!(cache.is_empty());
	}

	#[tokio::test]
	async fn insert_sweeps_expired_entries() {
		let cache = ResponseCache::new(Duration::ZERO);

		for id in ["1", "2", "3"] {
			cache
				.get_or_compute(&spec(id), || async { Ok::<_, GatewayError>(payload(1)) })
				.await
				.expect("Compute should succeed.");
		}

		assert_eq!(cache.len(), 1);
	}

	#[tokio::test]
	async fn huge_ttl_saturates_instead_of_overflowing() {
		let cache = ResponseCache::new(Duration::MAX);
		let calls = AtomicUsize::new(0);

		for _ in 0..2 {
			cache
				.get_or_compute(&spec("1"), || async {
					calls.fetch_add(1, Ordering::SeqCst);

					Ok::<_, GatewayError>(payload(1))
				})
				.await
				.expect("Compute should succeed.");
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
