//! Request gateway: validation-before-call, credential checks, and the single upstream query.
//!
//! [`InsightsGateway::fetch_insights`] consults the optional [`ResponseCache`] first. On a miss
//! it asks the optional [`RateLimitPolicy`] for a slot, makes sure the credential is valid via
//! [`CredentialManager::ensure_valid`], and sends exactly one upstream request. Every failure
//! is mapped onto [`GatewayError`] and returned to the caller without internal retries.

pub mod fields;
pub mod rate_limit;
pub mod request;

pub use fields::*;
pub use rate_limit::*;
pub use request::*;

pub use crate::cache::InsightsPayload;

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, AUTHORIZATION, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	cache::ResponseCache,
	error::{AuthError, GatewayError},
	http::{self, HttpTransport},
	lifecycle::CredentialManager,
	oauth::TransportErrorMapper,
	obs::{self, Phase, PhaseOutcome, PhaseSpan},
};

/// Upstream insights body; only `data` is kept, and a body without it means no rows.
#[derive(Debug, Deserialize)]
struct InsightsResponse {
	#[serde(default)]
	data: Vec<serde_json::Value>,
}

/// Front door for upstream insights queries.
pub struct InsightsGateway<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	manager: Arc<CredentialManager<C, M>>,
	cache: Option<Arc<ResponseCache>>,
	rate_limit: Option<Arc<dyn RateLimitPolicy>>,
	default_fields: FieldSet,
}
impl<C, M> InsightsGateway<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a gateway without cache or rate gate, requesting the standard metric set.
	pub fn new(manager: Arc<CredentialManager<C, M>>) -> Self {
		Self { manager, cache: None, rate_limit: None, default_fields: FieldSet::default() }
	}

	/// Serves repeated queries from `cache` while its entries are live.
	pub fn with_cache(mut self, cache: impl Into<Arc<ResponseCache>>) -> Self {
		self.cache = Some(cache.into());

		self
	}

	/// Consults `policy` before each upstream dispatch; cache hits are not charged.
	pub fn with_rate_limit(mut self, policy: Arc<dyn RateLimitPolicy>) -> Self {
		self.rate_limit = Some(policy);

		self
	}

	/// Overrides the metrics requested by [`fetch_insights_query`](Self::fetch_insights_query).
	pub fn with_default_fields(mut self, fields: FieldSet) -> Self {
		self.default_fields = fields;

		self
	}

	/// Credential manager this gateway validates against.
	pub fn manager(&self) -> &Arc<CredentialManager<C, M>> {
		&self.manager
	}

	/// Response cache, when one is attached.
	pub fn cache(&self) -> Option<&ResponseCache> {
		self.cache.as_deref()
	}

	/// Validates a raw query and fetches it.
	pub async fn fetch_insights_query(
		&self,
		query: InsightsQuery,
	) -> Result<InsightsPayload, GatewayError> {
		let spec = UpstreamRequestSpec::try_from(query)
			.map(|spec| spec.with_fields(self.default_fields.clone()))
			.inspect_err(|err| obs::report_failure(Phase::Fetch, "parse_query", err))?;

		self.fetch_insights(spec).await
	}

	/// Fetches insights for an already validated request.
	pub async fn fetch_insights(
		&self,
		spec: UpstreamRequestSpec,
	) -> Result<InsightsPayload, GatewayError> {
		const PHASE: Phase = Phase::Fetch;

		let span = PhaseSpan::new(PHASE, "fetch_insights");

		obs::record_phase_outcome(PHASE, PhaseOutcome::Attempt);

		let result = span
			.instrument(async {
				match self.cache.as_deref() {
					Some(cache) => cache.get_or_compute(&spec, || self.dispatch(&spec)).await,
					None => self.dispatch(&spec).await,
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_phase_outcome(PHASE, PhaseOutcome::Success),
			Err(err) => {
				obs::record_phase_outcome(PHASE, PhaseOutcome::Failure);
				obs::report_failure(PHASE, "fetch_insights", err);
			},
		}

		result
	}

	async fn dispatch(&self, spec: &UpstreamRequestSpec) -> Result<InsightsPayload, GatewayError> {
		if let Some(policy) = self.rate_limit.as_deref() {
			let context = RateLimitContext::new(&spec.target_id, spec.aggregation_level);

			if let RateLimitDecision::Delay(directive) = policy.evaluate(&context).await {
				return Err(GatewayError::RateLimited {
					retry_after: directive.recommended_backoff,
				});
			}
		}

		self.manager.ensure_valid().await?;

		let bearer = self.manager.bearer_token().ok_or_else(|| {
			AuthError::refresh_failed("no credential is stored after validation", None)
		})?;
		let mut url = self
			.manager
			.descriptor
			.insights_url(&spec.target_id)
			.map_err(|err| GatewayError::invalid_input(err.to_string()))?;

		url.query_pairs_mut()
			.append_pair("fields", &spec.requested_fields.joined())
			.append_pair("time_range", &spec.date_range.time_range_json())
			.append_pair("level", spec.aggregation_level.as_str());

		let request = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.header(AUTHORIZATION, format!("Bearer {}", bearer.expose()))
			.body(Vec::new())
			.map_err(|err| GatewayError::UpstreamError {
				status: None,
				detail: format!("request could not be built: {err}"),
			})?;
		let response = http::dispatch(
			self.manager.http_client.as_ref(),
			self.manager.transport_mapper.as_ref(),
			Phase::Fetch,
			request,
		)
		.await
		.map_err(|err| GatewayError::UpstreamError { status: err.status(), detail: err.to_string() })?;
		let status = response.status();

		if !status.is_success() {
			return Err(GatewayError::UpstreamError {
				status: Some(status.as_u16()),
				detail: http::error_detail(response.body()),
			});
		}

		let body = http::decode_json::<InsightsResponse>(response.body()).map_err(|err| {
			GatewayError::UpstreamError {
				status: Some(status.as_u16()),
				detail: format!("insights payload is malformed at `{}`", err.path()),
			}
		})?;

		Ok(InsightsPayload { insights: body.data })
	}
}
impl<C, M> Debug for InsightsGateway<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InsightsGateway")
			.field("manager", &self.manager)
			.field("cache", &self.cache)
			.field("rate_limited", &self.rate_limit.is_some())
			.field("default_fields", &self.default_fields)
			.finish()
	}
}
