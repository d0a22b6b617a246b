//! OAuth client facade for the standard refresh-token grant and transport error mapping.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::RefreshCredential,
	error::{AuthError, TransportError},
	http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
	obs::Phase,
	provider::{ClientAuthMethod, ProviderDescriptor},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Maps HTTP transport failures into [`TransportError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a transport error.
	fn map_transport_error(
		&self,
		phase: Phase,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> TransportError;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		phase: Phase,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> TransportError {
		match err {
			HttpClientError::Reqwest(inner) => {
				if let Some(status) = inner.status().map(|s| s.as_u16()).or(meta_status(meta)) {
					TransportError::Other { message: inner.to_string(), status: Some(status) }
				} else {
					TransportError::network(phase.endpoint(), *inner)
				}
			},
			HttpClientError::Http(inner) => TransportError::InvalidRequest(inner),
			HttpClientError::Io(inner) => TransportError::Io(inner),
			HttpClientError::Other(message) =>
				TransportError::Other { message, status: meta_status(meta) },
			_ => TransportError::Other {
				message: "Unknown transport failure".into(),
				status: meta_status(meta),
			},
		}
	}
}

/// Token returned by a successful exchange, before it becomes a stored credential.
#[derive(Clone, Debug)]
pub(crate) struct ExchangedToken {
	pub(crate) access_token: String,
	pub(crate) expires_in: Option<Duration>,
	/// Status of the token endpoint response that carried the token.
	pub(crate) status: Option<u16>,
}

/// `grant_type=refresh_token` exchange performed through the `oauth2` client.
pub(crate) struct RefreshGrantFacade<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> RefreshGrantFacade<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		credential: &RefreshCredential,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self, AuthError> {
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string()).map_err(|err| {
			AuthError::refresh_failed(format!("token endpoint is invalid: {err}"), None)
		})?;
		let mut oauth_client = BasicClient::new(ClientId::new(credential.client_id.clone()))
			.set_client_secret(ClientSecret::new(credential.client_secret.expose().to_owned()))
			.set_token_uri(token_url);

		if matches!(descriptor.client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	pub(crate) async fn exchange(&self, refresh_token: &str) -> Result<ExchangedToken, AuthError> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;
		let status = meta_status(meta.take().as_ref());
		let expires_in = match response.expires_in() {
			Some(delta) => Some(
				i64::try_from(delta.as_secs()).map(Duration::seconds).map_err(|_| {
					AuthError::refresh_failed("expires_in exceeds the supported range", status)
				})?,
			),
			None => None,
		};

		Ok(ExchangedToken {
			access_token: response.access_token().secret().to_owned(),
			expires_in,
			status,
		})
	}
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> AuthError
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) => format!("token endpoint rejected the grant: {description}"),
				None => format!("token endpoint rejected the grant: {}", response.error().as_ref()),
			};

			AuthError::refresh_failed(reason, meta_status(meta_ref))
		},
		RequestTokenError::Request(error) => {
			let transport = mapper.map_transport_error(Phase::Refresh, meta_ref, error);

			AuthError::refresh_failed(transport.to_string(), transport.status())
		},
		RequestTokenError::Parse(error, _body) => AuthError::refresh_failed(
			format!("token endpoint returned malformed JSON at `{}`", error.path()),
			meta_status(meta_ref),
		),
		RequestTokenError::Other(message) => AuthError::refresh_failed(
			format!("token endpoint returned an unexpected response: {message}"),
			meta_status(meta_ref),
		),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}
