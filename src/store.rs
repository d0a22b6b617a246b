//! Lock-guarded home of the single process-wide bearer credential.

// self
use crate::{_prelude::*, auth::Credential};

/// Point-in-time view of the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialSnapshot {
	/// Stored credential; `None` until the first successful refresh.
	pub credential: Option<Credential>,
	/// Monotonic counter bumped on every swap; `0` means nothing was ever stored.
	pub generation: u64,
}
impl CredentialSnapshot {
	/// Returns `true` once a credential has been stored.
	pub fn is_present(&self) -> bool {
		self.credential.is_some()
	}
}

/// Thread-safe store holding at most one [`Credential`].
///
/// Reads clone a snapshot under a short read lock, and the only writes are whole-value swaps,
/// so a reader either sees the previous credential or the new one, never a mix. No lock is
/// ever held across an `.await`.
#[derive(Debug, Default)]
pub struct CredentialStore(RwLock<CredentialSnapshot>);
impl CredentialStore {
	/// Clones the current credential and its generation.
	pub fn snapshot(&self) -> CredentialSnapshot {
		self.0.read().clone()
	}

	/// Current generation without cloning the credential.
	pub fn generation(&self) -> u64 {
		self.0.read().generation
	}

	/// Returns `true` once a credential has been stored.
	pub fn is_present(&self) -> bool {
		self.0.read().credential.is_some()
	}

	/// Atomically replaces the stored credential and returns the new generation.
	pub(crate) fn replace(&self, credential: Credential) -> u64 {
		let mut guard = self.0.write();

		guard.generation += 1;
		guard.credential = Some(credential);

		guard.generation
	}

	/// Stamps `validated_at` if `generation` is still current.
	///
	/// Returns `false` when a newer credential superseded the one that was validated.
	pub(crate) fn mark_validated(&self, generation: u64, instant: OffsetDateTime) -> bool {
		let mut guard = self.0.write();

		if guard.generation != generation {
			return false;
		}

		match guard.credential.as_mut() {
			Some(credential) => {
				credential.mark_validated(instant);

				true
			},
			None => false,
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn credential(token: &str) -> Credential {
		Credential::issued(token, macros::datetime!(2025-01-01 00:00 UTC), None)
			.expect("Open-ended credential should build.")
	}

	#[test]
	fn store_starts_absent() {
		let store = CredentialStore::default();
		let snapshot = store.snapshot();

		assert!(!snapshot.is_present());
		assert_eq!(snapshot.generation, 0);
		assert!(!store.mark_validated(0, macros::datetime!(2025-01-01 00:00 UTC)));
	}

	#[test]
	fn replace_bumps_generation_and_supersedes() {
		let store = CredentialStore::default();

		assert_eq!(store.replace(credential("first")), 1);
		assert_eq!(store.replace(credential("second")), 2);

		let snapshot = store.snapshot();

		assert_eq!(
			snapshot.credential.as_ref().map(|credential| credential.bearer_token().expose()),
			Some("second")
		);
		assert!(store.is_present());
	}

	#[test]
	fn stale_validation_is_ignored() {
		let store = CredentialStore::default();
		let stale = store.replace(credential("first"));

		store.replace(credential("second"));

		assert!(!store.mark_validated(stale, macros::datetime!(2025-01-01 00:05 UTC)));
		assert!(store.mark_validated(stale + 1, macros::datetime!(2025-01-01 00:05 UTC)));
		assert_eq!(
			store.snapshot().credential.and_then(|credential| credential.validated_at()),
			Some(macros::datetime!(2025-01-01 00:05 UTC))
		);
	}
}
