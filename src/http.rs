//! Transport primitives shared by the token exchange, introspection, and insights calls.
//!
//! The module exposes [`HttpTransport`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so embedders can plug in custom HTTP clients without losing
//! the gateway's error classification. Implementations call
//! [`ResponseMetadataSlot::take`] before dispatching a request and
//! [`ResponseMetadataSlot::store`] once an HTTP status or retry hint is known.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError, oauth::TransportErrorMapper, obs::Phase};

/// Abstraction over HTTP transports used for every outbound call.
///
/// The trait is the crate's only dependency on an HTTP stack. Each outbound request asks for
/// a short-lived [`AsyncHttpClient`] handle carrying a clone of a [`ResponseMetadataSlot`],
/// so the caller can read the status and `Retry-After` hint after the request resolves.
/// Handles must own their state so request futures stay `Send` for the lifetime of the
/// in-flight call.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across calls.
	/// - Once an HTTP response provides a status, save it with [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token and introspection endpoints return results directly, so custom clients should
/// disable redirect following.
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Per-request timeout used by [`ReqwestHttpClient::new`].
	pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

	/// Builds a client with [`DEFAULT_TIMEOUT`](Self::DEFAULT_TIMEOUT) and redirects disabled.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		Self::with_timeout(Self::DEFAULT_TIMEOUT)
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with a per-request timeout and redirects disabled.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl HttpTransport for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`HttpTransport`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Dispatches `request` through a fresh transport handle and maps transport failures.
///
/// Non-2xx responses are returned as-is; classifying them is the caller's job.
pub(crate) async fn dispatch<C, M>(
	http_client: &C,
	mapper: &M,
	phase: Phase,
	request: HttpRequest,
) -> Result<HttpResponse, TransportError>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let slot = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(slot.clone());

	handle
		.call(request)
		.await
		.map_err(|err| mapper.map_transport_error(phase, slot.take().as_ref(), err))
}

/// Returns at most `limit` characters of a response body for error details.
pub(crate) fn body_preview(body: &[u8], limit: usize) -> String {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	match trimmed.char_indices().nth(limit) {
		Some((idx, _)) => format!("{}...", &trimmed[..idx]),
		None => trimmed.to_owned(),
	}
}

/// Decodes a JSON body, keeping the path of the first offending field.
pub(crate) fn decode_json<T>(
	body: &[u8],
) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
where
	T: serde::de::DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
}

/// Extracts a human-readable failure detail from an error body.
///
/// Understands Graph-style `{"error":{"message":..}}` and OAuth-style
/// `{"error":"..","error_description":".."}` payloads, falling back to a bounded preview.
pub(crate) fn error_detail(body: &[u8]) -> String {
	#[derive(Deserialize)]
	struct ErrorEnvelope {
		error: Option<serde_json::Value>,
		error_description: Option<String>,
	}

	if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
		if let Some(description) = envelope.error_description {
			return description;
		}

		match envelope.error {
			Some(serde_json::Value::Object(fields)) => {
				if let Some(message) = fields.get("message").and_then(|value| value.as_str()) {
					return message.to_owned();
				}
			},
			Some(serde_json::Value::String(code)) => return code,
			_ => {},
		}
	}

	let preview = body_preview(body, ERROR_PREVIEW_LIMIT);

	if preview.is_empty() { "empty response body".into() } else { preview }
}

const ERROR_PREVIEW_LIMIT: usize = 256;

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
