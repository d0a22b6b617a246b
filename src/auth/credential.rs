//! The process-wide bearer credential and the static refresh credential that mints it.

// self
use crate::{_prelude::*, auth::secret::TokenSecret};

/// Bearer credential currently trusted for upstream calls.
///
/// Only the refresher builds these; everything else reads them out of the
/// [`CredentialStore`](crate::store::CredentialStore).
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	bearer_token: TokenSecret,
	obtained_at: OffsetDateTime,
	validated_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
}
impl Credential {
	/// Returns `None` when `obtained_at + expires_in` falls outside the representable range.
	pub(crate) fn issued(
		bearer_token: impl Into<String>,
		obtained_at: OffsetDateTime,
		expires_in: Option<Duration>,
	) -> Option<Self> {
		let expires_at = match expires_in {
			Some(delta) => Some(obtained_at.checked_add(delta)?),
			None => None,
		};

		Some(Self {
			bearer_token: TokenSecret::new(bearer_token),
			obtained_at,
			validated_at: None,
			expires_at,
		})
	}

	/// Bearer token presented on upstream calls.
	pub fn bearer_token(&self) -> &TokenSecret {
		&self.bearer_token
	}

	/// Instant the token endpoint issued this credential.
	pub fn obtained_at(&self) -> OffsetDateTime {
		self.obtained_at
	}

	/// Instant introspection last confirmed the credential, if ever.
	pub fn validated_at(&self) -> Option<OffsetDateTime> {
		self.validated_at
	}

	/// Expiry derived from the token endpoint's `expires_in`, when it reported one.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expires_at
	}

	/// Returns `true` if the credential has a known expiry at or before `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expiry| instant >= expiry)
	}

	pub(crate) fn mark_validated(&mut self, instant: OffsetDateTime) {
		self.validated_at = Some(instant);
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("bearer_token", &"<redacted>")
			.field("obtained_at", &self.obtained_at)
			.field("validated_at", &self.validated_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Long-lived secret used to mint bearer tokens; immutable for the process lifetime.
#[derive(Clone, Debug, Deserialize)]
pub struct RefreshCredential {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Long-lived refresh (or exchangeable) token.
	pub refresh_token: TokenSecret,
}
impl RefreshCredential {
	/// Bundles the three startup secrets.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			refresh_token: TokenSecret::new(refresh_token),
		}
	}

	/// App access token (`client_id|client_secret`) used to authenticate introspection calls.
	pub fn app_access_token(&self) -> TokenSecret {
		TokenSecret::new(format!("{}|{}", self.client_id, self.client_secret.expose()))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn expiry_follows_expires_in() {
		let obtained = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = Credential::issued("bearer", obtained, Some(Duration::hours(1)))
			.expect("One hour expiry should be representable.");

		assert_eq!(credential.expires_at(), Some(macros::datetime!(2025-01-01 01:00 UTC)));
		assert!(!credential.is_expired_at(macros::datetime!(2025-01-01 00:59 UTC)));
		assert!(credential.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC)));

		let open_ended =
			Credential::issued("bearer", obtained, None).expect("Open-ended credential should build.");

		assert!(!open_ended.is_expired_at(macros::datetime!(2030-01-01 00:00 UTC)));
	}

	#[test]
	fn out_of_range_expiry_is_rejected() {
		let obtained = macros::datetime!(2025-01-01 00:00 UTC);

		let far = Duration::seconds(9_000_000_000_000);

		assert!(Credential::issued("bearer", obtained, Some(far)).is_none());
		assert!(Credential::issued("bearer", obtained, Some(Duration::MAX)).is_none());
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let credential =
			Credential::issued("bearer-secret", macros::datetime!(2025-01-01 00:00 UTC), None)
				.expect("Open-ended credential should build.");
		let refresh = RefreshCredential::new("client", "client-secret", "refresh-secret");
		let rendered = format!("{credential:?} {refresh:?}");

		assert!(!rendered.contains("bearer-secret"));
		assert!(!rendered.contains("client-secret"));
		assert!(!rendered.contains("refresh-secret"));
		assert_eq!(refresh.app_access_token().expose(), "client|client-secret");
	}
}
