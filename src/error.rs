//! Gateway-wide error types shared by the credential lifecycle, the request gateway, and the
//! transport layer.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by construction and startup APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential lifecycle failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Request gateway failure.
	#[error(transparent)]
	Gateway(#[from] GatewayError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and validation failures raised while wiring the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// A renewal scheduler is already attached to this credential manager.
	#[error("A renewal scheduler is already running for this credential.")]
	RenewalAlreadyRunning,
	/// Default upstream field list could not be normalized.
	#[error("Requested fields are invalid.")]
	InvalidFields(#[from] crate::gateway::FieldValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while obtaining a bearer credential.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// The refresh exchange failed; the previously stored credential is untouched.
	#[error("Credential refresh failed: {reason}.")]
	RefreshFailed {
		/// Human-readable failure summary.
		reason: String,
		/// HTTP status code returned by the token endpoint, when available.
		status: Option<u16>,
	},
}
impl AuthError {
	pub(crate) fn refresh_failed(reason: impl Into<String>, status: Option<u16>) -> Self {
		Self::RefreshFailed { reason: reason.into(), status }
	}
}

/// Caller-visible failures returned by [`InsightsGateway`](crate::gateway::InsightsGateway).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum GatewayError {
	/// The caller's request is malformed; never retried.
	#[error("Invalid request: {reason}.")]
	InvalidInput {
		/// Which part of the request was rejected and why.
		reason: String,
	},
	/// No valid credential could be obtained for this call; callers may retry later.
	#[error("Unable to obtain a valid upstream credential.")]
	AuthFailure(#[from] AuthError),
	/// The upstream data API failed or rejected the query; not retried internally.
	#[error("Upstream request failed: {detail}.")]
	UpstreamError {
		/// HTTP status code returned upstream, absent for transport failures.
		status: Option<u16>,
		/// Upstream-supplied or transport-level detail.
		detail: String,
	},
	/// The local rate gate refused the call.
	#[error("Rate limit exceeded; retry in {retry_after}.")]
	RateLimited {
		/// Suggested wait before retrying.
		retry_after: Duration,
	},
}
impl GatewayError {
	pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
		Self::InvalidInput { reason: reason.into() }
	}

	/// HTTP-style status code used by the inbound error envelope.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::InvalidInput { .. } => 400,
			Self::RateLimited { .. } => 429,
			Self::UpstreamError { .. } => 502,
			Self::AuthFailure(_) => 503,
		}
	}

	/// Returns `true` when retrying the same request later may succeed.
	pub fn is_retryable(&self) -> bool {
		!matches!(self, Self::InvalidInput { .. })
	}
}

/// Transport-level failures (network, IO, request construction).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Logical endpoint label (token, introspection, insights).
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// The outbound request could not be assembled.
	#[error("Outbound request could not be constructed.")]
	InvalidRequest(#[from] oauth2::http::Error),
	/// Transport failure without a structured source.
	#[error("Transport failure: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
		/// HTTP status captured before the failure, when available.
		status: Option<u16>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}

	/// HTTP status attached to the failure, if the transport captured one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Other { status, .. } => *status,
			_ => None,
		}
	}
}
