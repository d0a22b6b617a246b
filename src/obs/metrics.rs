// self
use crate::obs::{Phase, PhaseOutcome};

/// How a [`ResponseCache`](crate::cache::ResponseCache) lookup was served.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheLookup {
	/// A live entry answered the lookup without waiting.
	Hit,
	/// The caller waited on a concurrent computation and reused its payload.
	Coalesced,
	/// Nothing was cached; the caller ran the upstream query.
	Miss,
}
impl CacheLookup {
	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CacheLookup::Hit => "hit",
			CacheLookup::Coalesced => "coalesced",
			CacheLookup::Miss => "miss",
		}
	}
}

/// Counts one attempt/success/failure of `phase` in `insights_gateway_phase_total`.
pub fn record_phase_outcome(phase: Phase, outcome: PhaseOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"insights_gateway_phase_total",
		"phase" => phase.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (phase, outcome);
}

/// Counts a failure in `insights_gateway_failure_total`, labeled by the stage that raised it
/// (`exchange`, `introspect`, `parse_query`, `fetch_insights`).
pub fn record_stage_failure(phase: Phase, stage: &'static str) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"insights_gateway_failure_total",
		"phase" => phase.as_str(),
		"stage" => stage
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (phase, stage);
}

/// Counts a response cache lookup in `insights_gateway_cache_total`.
pub fn record_cache_lookup(lookup: CacheLookup) {
	#[cfg(feature = "metrics")]
	metrics::counter!("insights_gateway_cache_total", "result" => lookup.as_str()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = lookup;
}
