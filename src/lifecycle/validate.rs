//! Introspection of the stored credential with a fail-safe fallback to refresh.

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	error::{AuthError, TransportError},
	http::{self, HttpTransport},
	lifecycle::CredentialManager,
	oauth::TransportErrorMapper,
	obs::{self, Phase, PhaseOutcome, PhaseSpan},
};

/// Why the introspection endpoint did not confirm the token.
#[derive(Debug, ThisError)]
enum IntrospectionError {
	#[error("introspection request could not be built: {0}")]
	Request(#[from] oauth2::http::Error),
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error("introspection endpoint returned {status}: {detail}")]
	Status { status: u16, detail: String },
	#[error("introspection payload is malformed: {0}")]
	Malformed(String),
}

/// Graph `debug_token` shape (`data.is_valid`) or RFC 7662 shape (`active`).
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
	#[serde(default)]
	data: Option<IntrospectionData>,
	#[serde(default)]
	active: Option<bool>,
}
impl IntrospectionResponse {
	fn verdict(&self) -> Option<bool> {
		self.data.as_ref().and_then(|data| data.is_valid).or(self.active)
	}
}

#[derive(Debug, Deserialize)]
struct IntrospectionData {
	#[serde(default)]
	is_valid: Option<bool>,
}

impl<C, M> CredentialManager<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Makes sure the store holds a credential the authorization server accepts.
	///
	/// An absent or locally expired credential is refreshed directly. A present credential is
	/// introspected; any answer other than an explicit "valid" (rejection, transport failure,
	/// non-2xx, malformed body) triggers exactly one refresh whose outcome is returned.
	pub async fn ensure_valid(&self) -> Result<(), AuthError> {
		const PHASE: Phase = Phase::Validate;

		let span = PhaseSpan::new(PHASE, "ensure_valid");

		obs::record_phase_outcome(PHASE, PhaseOutcome::Attempt);

		let result = span
			.instrument(async move {
				let snapshot = self.store.snapshot();
				let Some(credential) = snapshot.credential else {
					obs::log_event(PHASE, "no credential stored; refreshing");

					return self.refresh_superseding(snapshot.generation).await;
				};
				let now = OffsetDateTime::now_utc();

				if credential.is_expired_at(now) {
					obs::log_event(PHASE, "credential expired locally; refreshing");

					return self.refresh_superseding(snapshot.generation).await;
				}

				self.metrics.record_introspection();

				match self.introspect(credential.bearer_token().expose()).await {
					Ok(true) => {
						self.store.mark_validated(snapshot.generation, OffsetDateTime::now_utc());

						Ok(())
					},
					Ok(false) => {
						self.metrics.record_introspection_rejection();
						obs::log_event(PHASE, "credential rejected by introspection; refreshing");

						self.refresh_superseding(snapshot.generation).await
					},
					Err(err) => {
						self.metrics.record_introspection_rejection();
						obs::report_failure(PHASE, "introspect", &err);

						self.refresh_superseding(snapshot.generation).await
					},
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_phase_outcome(PHASE, PhaseOutcome::Success),
			Err(_) => obs::record_phase_outcome(PHASE, PhaseOutcome::Failure),
		}

		result
	}

	async fn introspect(&self, bearer_token: &str) -> Result<bool, IntrospectionError> {
		let mut url = self.descriptor.endpoints.introspection.clone();

		url.query_pairs_mut()
			.append_pair("input_token", bearer_token)
			.append_pair("access_token", self.refresh_credential.app_access_token().expose());

		let request = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.body(Vec::new())?;
		let response = http::dispatch(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			Phase::Validate,
			request,
		)
		.await?;
		let status = response.status();

		if !status.is_success() {
			return Err(IntrospectionError::Status {
				status: status.as_u16(),
				detail: http::error_detail(response.body()),
			});
		}

		let payload = http::decode_json::<IntrospectionResponse>(response.body())
			.map_err(|err| IntrospectionError::Malformed(format!("at `{}`", err.path())))?;

		payload
			.verdict()
			.ok_or_else(|| IntrospectionError::Malformed("validity flag is missing".into()))
	}
}
