//! Background renewal loop that keeps the credential valid independently of inbound traffic.
//!
//! The loop sleeps, runs one validation, and picks the next delay from the outcome: the
//! steady interval after a success, the shorter backoff interval after an error or a panic.
//! Each validation runs in its own spawned task so a panic surfaces as a
//! [`JoinError`](tokio::task::JoinError) at this boundary instead of killing the loop.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::task::JoinHandle;
// self
use crate::{_prelude::*, error::AuthError, obs};

/// Boxed future returned by [`RenewalTarget::renew`].
pub type RenewalFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AuthError>> + 'a + Send>>;

/// Anything the scheduler can keep valid.
pub trait RenewalTarget
where
	Self: 'static + Send + Sync,
{
	/// Runs one validation pass.
	fn renew(&self) -> RenewalFuture<'_>;
}

/// Timing constants for the renewal loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenewalSchedule {
	/// Delay between proactive validations after a success.
	pub steady: StdDuration,
	/// Delay before retrying after a failed or panicked validation.
	pub backoff: StdDuration,
	/// Delay before the first validation.
	pub initial_delay: StdDuration,
}
impl RenewalSchedule {
	/// Default steady-state interval (one hour).
	pub const DEFAULT_STEADY: StdDuration = StdDuration::from_secs(60 * 60);
	/// Default failure backoff (five minutes).
	pub const DEFAULT_BACKOFF: StdDuration = StdDuration::from_secs(5 * 60);
	/// Floor applied to the delay between validations; shorter intervals are raised to it.
	pub const MIN_INTERVAL: StdDuration = StdDuration::from_secs(1);

	/// Creates a schedule that validates immediately, then every `steady`.
	pub fn new(steady: StdDuration, backoff: StdDuration) -> Self {
		Self { steady, backoff, initial_delay: StdDuration::ZERO }
	}

	/// Overrides the delay before the first validation.
	pub fn with_initial_delay(mut self, delay: StdDuration) -> Self {
		self.initial_delay = delay;

		self
	}
}
impl Default for RenewalSchedule {
	fn default() -> Self {
		Self::new(Self::DEFAULT_STEADY, Self::DEFAULT_BACKOFF)
	}
}

/// Perpetual renewal loop over a [`RenewalTarget`].
pub struct RenewalScheduler<T>
where
	T: RenewalTarget,
{
	target: Arc<T>,
	schedule: RenewalSchedule,
}
impl<T> RenewalScheduler<T>
where
	T: RenewalTarget,
{
	const TASK: &'static str = "credential_renewal";

	/// Creates a scheduler; nothing runs until [`spawn`](Self::spawn) or [`run`](Self::run).
	pub fn new(target: Arc<T>, schedule: RenewalSchedule) -> Self {
		Self { target, schedule }
	}

	/// Spawns the loop on the current Tokio runtime.
	pub fn spawn(self) -> RenewalHandle {
		RenewalHandle { task: tokio::spawn(self.run()) }
	}

	/// Drives the loop on the calling task; never returns.
	pub async fn run(self) {
		let mut delay = self.schedule.initial_delay;

		loop {
			if !delay.is_zero() {
				tokio::time::sleep(delay).await;
			}

			delay = self.tick().await.max(RenewalSchedule::MIN_INTERVAL);
		}
	}

	/// Runs one validation and returns the delay until the next one.
	async fn tick(&self) -> StdDuration {
		let target = self.target.clone();
		let outcome = tokio::spawn(async move { target.renew().await }).await;

		match outcome {
			Ok(Ok(())) => self.schedule.steady,
			Ok(Err(err)) => {
				obs::log_task_failure(Self::TASK, self.schedule.backoff.as_secs(), &err);

				self.schedule.backoff
			},
			Err(err) => {
				obs::log_task_failure(Self::TASK, self.schedule.backoff.as_secs(), &err);

				self.schedule.backoff
			},
		}
	}
}
impl<T> Debug for RenewalScheduler<T>
where
	T: RenewalTarget,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RenewalScheduler").field("schedule", &self.schedule).finish()
	}
}

/// Handle to a spawned renewal loop.
///
/// Dropping the handle detaches the loop; it keeps running until the runtime shuts down.
#[derive(Debug)]
pub struct RenewalHandle {
	task: JoinHandle<()>,
}
impl RenewalHandle {
	/// Stops the loop at its next await point.
	pub fn shutdown(self) {
		self.task.abort();
	}

	/// Returns `true` once the loop task has ended.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}
}
