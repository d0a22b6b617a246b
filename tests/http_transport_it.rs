// self
use insights_gateway::{
	_preludet::*,
	error::{AuthError, TransportError},
	http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
	lifecycle::CredentialManager,
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
	obs::Phase,
	provider::{ExchangeGrant, ProviderDescriptor},
};

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Copy)]
struct FakeHttpClient {
	retry_after: Duration,
}
impl FakeHttpClient {
	fn throttled(retry_after: Duration) -> Self {
		Self { retry_after }
	}
}
impl HttpTransport for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, retry_after: self.retry_after }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	retry_after: Duration,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, _request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let retry_after = self.retry_after;

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);
			slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

			Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	observed: Arc<Mutex<Vec<(Phase, Option<ResponseMetadata>)>>>,
}
impl RecordingTransportErrorMapper {
	fn observed(&self) -> Vec<(Phase, Option<ResponseMetadata>)> {
		self.observed.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		phase: Phase,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> TransportError {
		self.observed.lock().push((phase, meta.cloned()));

		match err {
			HttpClientError::Reqwest(inner) => TransportError::Other {
				message: format!("Fake transport error: {inner}"),
				status: meta.and_then(|value| value.status),
			},
			HttpClientError::Http(inner) => TransportError::InvalidRequest(inner),
			HttpClientError::Io(inner) => TransportError::Io(inner),
			other => TransportError::Other {
				message: format!("Unhandled HTTP client error variant: {other:?}"),
				status: None,
			},
		}
	}
}

fn build_descriptor(grant: ExchangeGrant) -> ProviderDescriptor {
	test_descriptor("https://mock.example.com", grant)
}

fn build_manager(
	grant: ExchangeGrant,
	retry_after: Duration,
	mapper: RecordingTransportErrorMapper,
) -> CredentialManager<FakeHttpClient, RecordingTransportErrorMapper> {
	CredentialManager::with_http_client(
		build_descriptor(grant),
		test_refresh_credential(),
		FakeHttpClient::throttled(retry_after),
		mapper,
	)
}

#[tokio::test]
async fn fake_transport_status_reaches_refresh_error() {
	let manager = build_manager(
		ExchangeGrant::FbExchangeToken,
		Duration::seconds(5),
		RecordingTransportErrorMapper::default(),
	);
	let err = manager.refresh().await.expect_err("Throttled exchange should fail.");

	match err {
		AuthError::RefreshFailed { status, reason } => {
			assert_eq!(status, Some(429));
			assert!(reason.contains("Fake transport error"), "Unexpected reason: {reason}.");
		},
	}

	assert!(!manager.store().is_present());
	assert_eq!(manager.metrics.refresh_failures(), 1);
}

#[tokio::test]
async fn fake_mapper_captures_metadata_for_both_grants() {
	for grant in [ExchangeGrant::FbExchangeToken, ExchangeGrant::RefreshToken] {
		let mapper = RecordingTransportErrorMapper::default();
		let manager = build_manager(grant, Duration::seconds(30), mapper.clone());
		let _ = manager.ensure_valid().await.expect_err("Throttled exchange should fail.");
		let observed = mapper.observed();

		assert_eq!(observed.len(), 1, "Mapper must record a single request for {grant}.");

		let (phase, meta) = observed.first().cloned().expect("One observation should exist.");
		let meta = meta.expect("Response metadata should be recorded.");

		assert_eq!(phase, Phase::Refresh);
		assert_eq!(meta.status, Some(429));
		assert_eq!(meta.retry_after, Some(Duration::seconds(30)));
	}
}
