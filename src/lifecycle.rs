//! Credential lifecycle: validation, refresh, and the hook the renewal scheduler drives.
//!
//! [`CredentialManager`] owns the single [`CredentialStore`], the refresh credential, and the
//! transport used to reach the authorization server. [`CredentialManager::ensure_valid`]
//! introspects the stored token and falls back to [`CredentialManager::refresh`] whenever the
//! answer is negative or ambiguous. Refreshes are serialized by a singleflight guard so
//! concurrent callers that all decide a refresh is needed converge on one new token.

/// Counters describing refresh and introspection activity.
pub mod metrics;

mod refresh;
mod validate;

pub use metrics::LifecycleMetrics;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{RefreshCredential, TokenSecret},
	error::ConfigError,
	http::{HttpTransport, ReqwestHttpClient},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
	provider::ProviderDescriptor,
	scheduler::{RenewalFuture, RenewalHandle, RenewalSchedule, RenewalScheduler, RenewalTarget},
	store::{CredentialSnapshot, CredentialStore},
};

/// Credential manager specialized for the crate's default reqwest transport stack.
pub type ReqwestCredentialManager =
	CredentialManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Owner of the process-wide bearer credential.
pub struct CredentialManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every call to the authorization server.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors.
	pub transport_mapper: Arc<M>,
	/// Provider descriptor that defines the token and introspection endpoints.
	pub descriptor: ProviderDescriptor,
	/// Shared counters for lifecycle activity.
	pub metrics: Arc<LifecycleMetrics>,
	refresh_credential: RefreshCredential,
	store: CredentialStore,
	refresh_guard: AsyncMutex<()>,
	renewal_claimed: AtomicBool,
}
impl<C, M> CredentialManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a manager that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		refresh_credential: RefreshCredential,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			descriptor,
			metrics: Default::default(),
			refresh_credential,
			store: CredentialStore::default(),
			refresh_guard: AsyncMutex::new(()),
			renewal_claimed: AtomicBool::new(false),
		}
	}

	/// Read-only view of the credential store.
	pub fn store(&self) -> &CredentialStore {
		&self.store
	}

	/// Clones the current credential state.
	pub fn snapshot(&self) -> CredentialSnapshot {
		self.store.snapshot()
	}

	/// Bearer token currently stored, if any.
	pub fn bearer_token(&self) -> Option<TokenSecret> {
		self.store.snapshot().credential.map(|credential| credential.bearer_token().clone())
	}

	/// Starts the background renewal task for this manager.
	///
	/// Only one scheduler may drive a given manager; a second call fails with
	/// [`ConfigError::RenewalAlreadyRunning`]. Must be called inside a Tokio runtime.
	pub fn spawn_renewal(
		self: &Arc<Self>,
		schedule: RenewalSchedule,
	) -> Result<RenewalHandle, ConfigError> {
		if self.renewal_claimed.swap(true, Ordering::AcqRel) {
			return Err(ConfigError::RenewalAlreadyRunning);
		}

		Ok(RenewalScheduler::new(self.clone(), schedule).spawn())
	}
}
impl CredentialManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a manager with its own reqwest-backed transport.
	///
	/// The transport uses [`ReqwestHttpClient::DEFAULT_TIMEOUT`] and never follows redirects.
	pub fn new(
		descriptor: ProviderDescriptor,
		refresh_credential: RefreshCredential,
	) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(
			descriptor,
			refresh_credential,
			ReqwestHttpClient::new()?,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}
}
impl<C, M> RenewalTarget for CredentialManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn renew(&self) -> RenewalFuture<'_> {
		Box::pin(self.ensure_valid())
	}
}
impl<C, M> Debug for CredentialManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialManager")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.refresh_credential.client_id)
			.field("credential_present", &self.store.is_present())
			.finish()
	}
}
