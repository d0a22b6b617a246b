//! Optional observability helpers for lifecycle and gateway phases.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `insights_gateway.phase` with the `phase`
//!   and `stage` (call site) fields, plus `warn`-level events for every failure.
//! - Enable `metrics` to increment `insights_gateway_phase_total` (labels `phase`, `outcome`),
//!   `insights_gateway_failure_total` (labels `phase`, `stage`), and
//!   `insights_gateway_cache_total` (label `result`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Phases of the credential lifecycle and request path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
	/// Introspection of the stored bearer token.
	Validate,
	/// Exchange of the refresh credential for a new bearer token.
	Refresh,
	/// Upstream insights query.
	Fetch,
}
impl Phase {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Phase::Validate => "validate",
			Phase::Refresh => "refresh",
			Phase::Fetch => "fetch",
		}
	}

	/// Label of the endpoint contacted during this phase.
	pub const fn endpoint(self) -> &'static str {
		match self {
			Phase::Validate => "the introspection endpoint",
			Phase::Refresh => "the token endpoint",
			Phase::Fetch => "the insights endpoint",
		}
	}
}
impl Display for Phase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseOutcome {
	/// Entry to a phase.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl PhaseOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			PhaseOutcome::Attempt => "attempt",
			PhaseOutcome::Success => "success",
			PhaseOutcome::Failure => "failure",
		}
	}
}
impl Display for PhaseOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Logs a failure and counts it against the stage that raised it.
pub fn report_failure(phase: Phase, stage: &'static str, error: &dyn Display) {
	log_failure(phase, stage, error);
	record_stage_failure(phase, stage);
}
