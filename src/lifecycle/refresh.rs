//! Token exchange against the authorization server, serialized by a singleflight guard.
//!
//! [`CredentialManager::refresh`] always performs one exchange. The validator instead calls
//! `refresh_superseding` with the generation it inspected; if another caller already swapped
//! in a newer credential while this one waited on the guard, that credential is adopted and
//! no second exchange is sent.

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::AuthError,
	http::{self, HttpTransport},
	lifecycle::CredentialManager,
	oauth::{ExchangedToken, RefreshGrantFacade, TransportErrorMapper},
	obs::{self, Phase, PhaseOutcome, PhaseSpan},
	provider::ExchangeGrant,
};

/// Token endpoint payload for the `fb_exchange_token` grant.
#[derive(Debug, Deserialize)]
struct ExchangeResponse {
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}

impl<C, M> CredentialManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges the refresh credential for a new bearer token and swaps it into the store.
	///
	/// On failure the previously stored credential (if any) is left untouched.
	pub async fn refresh(&self) -> Result<(), AuthError> {
		self.refresh_guarded(None).await
	}

	/// Refreshes unless the store moved past `observed` while waiting for the guard.
	pub(crate) async fn refresh_superseding(&self, observed: u64) -> Result<(), AuthError> {
		self.refresh_guarded(Some(observed)).await
	}

	async fn refresh_guarded(&self, observed: Option<u64>) -> Result<(), AuthError> {
		const PHASE: Phase = Phase::Refresh;

		let span = PhaseSpan::new(PHASE, "refresh");

		obs::record_phase_outcome(PHASE, PhaseOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = self.refresh_guard.lock().await;

				if observed.is_some_and(|observed| self.store.generation() != observed) {
					self.metrics.record_refresh_reuse();

					return Ok(());
				}

				self.metrics.record_refresh_attempt();

				let obtained_at = OffsetDateTime::now_utc();
				let credential = match self.exchange().await.and_then(|exchanged| {
					let status = exchanged.status;

					Credential::issued(exchanged.access_token, obtained_at, exchanged.expires_in)
						.ok_or_else(|| {
							AuthError::refresh_failed(
								"expires_in exceeds the supported range",
								status,
							)
						})
				}) {
					Ok(credential) => credential,
					Err(err) => {
						self.metrics.record_refresh_failure();
						obs::report_failure(PHASE, "exchange", &err);

						return Err(err);
					},
				};

				self.store.replace(credential);
				self.metrics.record_refresh_success();
				obs::log_event(PHASE, "bearer credential replaced");

				Ok(())
			})
			.await;

		match &result {
			Ok(_) => obs::record_phase_outcome(PHASE, PhaseOutcome::Success),
			Err(_) => obs::record_phase_outcome(PHASE, PhaseOutcome::Failure),
		}

		result
	}

	async fn exchange(&self) -> Result<ExchangedToken, AuthError> {
		match self.descriptor.exchange_grant {
			ExchangeGrant::FbExchangeToken => self.exchange_fb_token().await,
			ExchangeGrant::RefreshToken => {
				let facade = <RefreshGrantFacade<C, M>>::from_descriptor(
					&self.descriptor,
					&self.refresh_credential,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;

				facade.exchange(self.refresh_credential.refresh_token.expose()).await
			},
		}
	}

	async fn exchange_fb_token(&self) -> Result<ExchangedToken, AuthError> {
		let mut url = self.descriptor.endpoints.token.clone();

		url.query_pairs_mut()
			.append_pair("grant_type", ExchangeGrant::FbExchangeToken.as_str())
			.append_pair("client_id", &self.refresh_credential.client_id)
			.append_pair("client_secret", self.refresh_credential.client_secret.expose())
			.append_pair("fb_exchange_token", self.refresh_credential.refresh_token.expose());

		let request = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.body(Vec::new())
			.map_err(|err| {
				AuthError::refresh_failed(format!("exchange request could not be built: {err}"), None)
			})?;
		let response = http::dispatch(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			Phase::Refresh,
			request,
		)
		.await
		.map_err(|err| AuthError::refresh_failed(err.to_string(), err.status()))?;
		let status = response.status();

		if !status.is_success() {
			return Err(AuthError::refresh_failed(
				format!("token endpoint returned {status}: {}", http::error_detail(response.body())),
				Some(status.as_u16()),
			));
		}

		let payload = http::decode_json::<ExchangeResponse>(response.body()).map_err(|err| {
			AuthError::refresh_failed(
				format!("token endpoint returned malformed JSON at `{}`", err.path()),
				Some(status.as_u16()),
			)
		})?;
		let access_token = payload
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or_else(|| {
				AuthError::refresh_failed(
					"token endpoint response is missing `access_token`",
					Some(status.as_u16()),
				)
			})?;
		let expires_in = payload.expires_in.filter(|secs| *secs > 0).map(Duration::seconds);

		Ok(ExchangedToken { access_token, expires_in, status: Some(status.as_u16()) })
	}
}
