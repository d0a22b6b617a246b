// self
use crate::{_prelude::*, obs::Phase};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedPhase<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedPhase<F> = F;

/// A span builder used by lifecycle and gateway phases.
#[derive(Clone, Debug)]
pub struct PhaseSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl PhaseSpan {
	/// Creates a new span tagged with the provided phase + stage.
	pub fn new(phase: Phase, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("insights_gateway.phase", phase = phase.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (phase, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedPhase<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a failure with its phase so it can be diagnosed without reproducing.
pub fn log_failure(phase: Phase, stage: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(phase = phase.as_str(), stage, error = %error, "phase failed");
	#[cfg(not(feature = "tracing"))]
	let _ = (phase, stage, error);
}

/// Logs a noteworthy lifecycle transition.
pub fn log_event(phase: Phase, message: &'static str) {
	#[cfg(feature = "tracing")]
	tracing::info!(phase = phase.as_str(), "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = (phase, message);
}

/// Logs a failure that escaped a background task boundary.
pub fn log_task_failure(task: &'static str, retry_in_secs: u64, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::error!(task, retry_in_secs, error = %error, "background task iteration failed");
	#[cfg(not(feature = "tracing"))]
	let _ = (task, retry_in_secs, error);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn log_helpers_accept_any_display() {
		log_failure(Phase::Refresh, "test", &"token endpoint unreachable");
		log_event(Phase::Validate, "token accepted");
		log_task_failure("renewal", 300, &"boom");
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = PhaseSpan::new(Phase::Fetch, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
