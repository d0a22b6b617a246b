//! Inbound HTTP surface over [`InsightsGateway`].
//!
//! Routes:
//!
//! - `POST /insights-query` (alias `POST /dynamic_insights`): body `{id, level, start_date,
//!   end_date}`; success returns `{"status":"success","data":{"insights":[...]}}`.
//! - `GET /healthz`: liveness plus whether a credential is stored.
//!
//! Failures use the envelope `{"status":"error","code":<u16>,"detail":"..."}` with the HTTP
//! status from [`GatewayError::status_code`].

// std
use std::io;
// crates.io
use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::{HeaderValue, StatusCode, header::RETRY_AFTER},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	cache::InsightsPayload,
	error::GatewayError,
	gateway::{InsightsGateway, InsightsQuery},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
};

/// Gateway specialized for the crate's default reqwest transport stack.
pub type ReqwestInsightsGateway = InsightsGateway<ReqwestHttpClient, ReqwestTransportErrorMapper>;

type SharedGateway = Arc<ReqwestInsightsGateway>;

#[derive(Debug, Serialize)]
struct SuccessEnvelope {
	status: &'static str,
	data: InsightsPayload,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
	status: &'static str,
	code: u16,
	detail: String,
}

#[derive(Debug, Serialize)]
struct HealthEnvelope {
	status: &'static str,
	credential: &'static str,
}

/// Inbound failure rendered through the error envelope.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);
impl From<GatewayError> for ApiError {
	fn from(err: GatewayError) -> Self {
		Self(err)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let code = self.0.status_code();
		let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let retry_after = match &self.0 {
			GatewayError::RateLimited { retry_after } => Some(retry_after_secs(*retry_after)),
			_ => None,
		};
		let body = ErrorEnvelope { status: "error", code, detail: self.0.to_string() };
		let mut response = (status, Json(body)).into_response();

		if let Some(secs) = retry_after {
			response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
		}

		response
	}
}

/// Builds the router; state is the shared gateway.
pub fn router(gateway: SharedGateway) -> Router {
	Router::new()
		.route("/insights-query", post(insights_query))
		.route("/dynamic_insights", post(insights_query))
		.route("/healthz", get(healthz))
		.with_state(gateway)
}

/// Serves `router(gateway)` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, gateway: SharedGateway, shutdown: F) -> io::Result<()>
where
	F: 'static + Send + Future<Output = ()>,
{
	axum::serve(listener, router(gateway)).with_graceful_shutdown(shutdown).await
}

async fn insights_query(
	State(gateway): State<SharedGateway>,
	payload: Result<Json<InsightsQuery>, JsonRejection>,
) -> Result<Json<SuccessEnvelope>, ApiError> {
	let Json(query) =
		payload.map_err(|rejection| GatewayError::invalid_input(rejection.body_text()))?;
	let data = gateway.fetch_insights_query(query).await?;

	Ok(Json(SuccessEnvelope { status: "success", data }))
}

async fn healthz(State(gateway): State<SharedGateway>) -> Json<HealthEnvelope> {
	let credential = if gateway.manager().store().is_present() { "present" } else { "absent" };

	Json(HealthEnvelope { status: "ok", credential })
}

fn retry_after_secs(retry_after: Duration) -> u64 {
	let secs = retry_after.whole_seconds() + i64::from(retry_after.subsec_nanoseconds() > 0);

	u64::try_from(secs.max(1)).unwrap_or(1)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retry_after_rounds_up_to_whole_seconds() {
		assert_eq!(retry_after_secs(Duration::milliseconds(200)), 1);
		assert_eq!(retry_after_secs(Duration::milliseconds(1_500)), 2);
		assert_eq!(retry_after_secs(Duration::ZERO), 1);
	}

	#[test]
	fn error_envelope_carries_status_and_retry_hint() {
		let response = ApiError(GatewayError::RateLimited { retry_after: Duration::seconds(3) })
			.into_response();

		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(
			response.headers().get(RETRY_AFTER).and_then(|value| value.to_str().ok()),
			Some("3")
		);

		let response = ApiError(GatewayError::invalid_input("bad level")).into_response();

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert!(response.headers().get(RETRY_AFTER).is_none());
	}
}
