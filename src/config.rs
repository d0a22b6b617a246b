//! Command-line and environment configuration for the server binary.

// std
use std::{net::SocketAddr, num::NonZeroU32, time::Duration as StdDuration};
// crates.io
use clap::Parser;
// self
use crate::{
	_prelude::*,
	auth::RefreshCredential,
	cache::ResponseCache,
	error::ConfigError,
	gateway::{FieldSet, FixedWindowLimiter, InsightsGateway},
	http::ReqwestHttpClient,
	lifecycle::{CredentialManager, ReqwestCredentialManager},
	oauth::ReqwestTransportErrorMapper,
	provider::{ExchangeGrant, ProviderDescriptor},
	scheduler::RenewalSchedule,
	server::ReqwestInsightsGateway,
};

/// Upper bound for every seconds-valued flag (ten years).
pub const MAX_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Insights gateway server options; every flag can also come from the environment.
#[derive(Clone, Debug, Parser)]
#[command(name = "insights-gateway", version, about)]
pub struct Cli {
	/// OAuth client identifier.
	#[arg(long, env = "INSIGHTS_CLIENT_ID")]
	pub client_id: String,
	/// OAuth client secret.
	#[arg(long, env = "INSIGHTS_CLIENT_SECRET", hide_env_values = true)]
	pub client_secret: String,
	/// Long-lived token exchanged for bearer tokens.
	#[arg(long, env = "INSIGHTS_REFRESH_TOKEN", hide_env_values = true)]
	pub refresh_token: String,
	/// Upstream data API base URL.
	#[arg(long, env = "INSIGHTS_BASE_URL", default_value = "https://graph.facebook.com/v21.0")]
	pub base_url: Url,
	/// Token endpoint used for exchanges.
	#[arg(
		long,
		env = "INSIGHTS_TOKEN_ENDPOINT",
		default_value = "https://graph.facebook.com/oauth/access_token"
	)]
	pub token_endpoint: Url,
	/// Introspection endpoint used for validation.
	#[arg(
		long,
		env = "INSIGHTS_INTROSPECTION_ENDPOINT",
		default_value = "https://graph.facebook.com/debug_token"
	)]
	pub introspection_endpoint: Url,
	/// Exchange style spoken by the token endpoint (`fb-exchange-token` or `refresh-token`).
	#[arg(long, env = "INSIGHTS_EXCHANGE_GRANT", default_value_t = ExchangeGrant::FbExchangeToken)]
	pub exchange_grant: ExchangeGrant,
	/// Comma-separated metrics requested upstream; defaults to the standard set.
	#[arg(long, env = "INSIGHTS_FIELDS")]
	pub fields: Option<String>,
	/// Address the HTTP server binds to.
	#[arg(long, env = "INSIGHTS_LISTEN", default_value = "127.0.0.1:8000")]
	pub listen: SocketAddr,
	/// Seconds between proactive credential validations.
	#[arg(
		long,
		env = "INSIGHTS_RENEW_EVERY_SECS",
		default_value_t = 3_600,
		value_parser = clap::value_parser!(u64).range(1..=MAX_SECS)
	)]
	pub renew_every_secs: u64,
	/// Seconds before retrying a failed validation.
	#[arg(
		long,
		env = "INSIGHTS_RENEW_BACKOFF_SECS",
		default_value_t = 300,
		value_parser = clap::value_parser!(u64).range(1..=MAX_SECS)
	)]
	pub renew_backoff_secs: u64,
	/// Response cache TTL in seconds; `0` disables caching.
	#[arg(
		long,
		env = "INSIGHTS_CACHE_TTL_SECS",
		default_value_t = 300,
		value_parser = clap::value_parser!(u64).range(0..=MAX_SECS)
	)]
	pub cache_ttl_secs: u64,
	/// Upstream queries allowed per rate window; `0` disables the gate.
	#[arg(long, env = "INSIGHTS_RATE_LIMIT", default_value_t = 5)]
	pub rate_limit: u32,
	/// Rate window length in seconds.
	#[arg(
		long,
		env = "INSIGHTS_RATE_WINDOW_SECS",
		default_value_t = 1,
		value_parser = clap::value_parser!(u64).range(1..=MAX_SECS)
	)]
	pub rate_window_secs: u64,
	/// Per-request timeout for outbound HTTP calls, in seconds.
	#[arg(
		long,
		env = "INSIGHTS_HTTP_TIMEOUT_SECS",
		default_value_t = 30,
		value_parser = clap::value_parser!(u64).range(1..=MAX_SECS)
	)]
	pub http_timeout_secs: u64,
}
impl Cli {
	/// Validated provider descriptor.
	pub fn descriptor(&self) -> Result<ProviderDescriptor, ConfigError> {
		Ok(ProviderDescriptor::builder()
			.token_endpoint(self.token_endpoint.clone())
			.introspection_endpoint(self.introspection_endpoint.clone())
			.api_base(self.base_url.clone())
			.exchange_grant(self.exchange_grant)
			.build()?)
	}

	/// Startup secrets.
	pub fn refresh_credential(&self) -> RefreshCredential {
		RefreshCredential::new(&self.client_id, &self.client_secret, &self.refresh_token)
	}

	/// Renewal timing.
	pub fn renewal_schedule(&self) -> RenewalSchedule {
		RenewalSchedule::new(
			StdDuration::from_secs(self.renew_every_secs),
			StdDuration::from_secs(self.renew_backoff_secs),
		)
	}

	/// Response cache, or `None` when caching is disabled.
	pub fn response_cache(&self) -> Option<ResponseCache> {
		(self.cache_ttl_secs > 0).then(|| ResponseCache::new(seconds(self.cache_ttl_secs)))
	}

	/// Rate gate, or `None` when the limit is `0`.
	pub fn rate_limiter(&self) -> Option<FixedWindowLimiter> {
		NonZeroU32::new(self.rate_limit)
			.map(|limit| FixedWindowLimiter::new(limit, seconds(self.rate_window_secs)))
	}

	/// Requested metric set.
	pub fn field_set(&self) -> Result<FieldSet, ConfigError> {
		match self.fields.as_deref() {
			Some(raw) => Ok(raw.parse::<FieldSet>()?),
			None => Ok(FieldSet::default()),
		}
	}

	/// Wires the credential manager and the gateway in front of it.
	pub fn build(&self) -> Result<(Arc<ReqwestInsightsGateway>, Arc<ReqwestCredentialManager>)> {
		let http_client =
			ReqwestHttpClient::with_timeout(StdDuration::from_secs(self.http_timeout_secs))?;
		let manager = Arc::new(CredentialManager::with_http_client(
			self.descriptor()?,
			self.refresh_credential(),
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		));
		let mut gateway =
			InsightsGateway::new(manager.clone()).with_default_fields(self.field_set()?);

		if let Some(cache) = self.response_cache() {
			gateway = gateway.with_cache(cache);
		}
		if let Some(limiter) = self.rate_limiter() {
			gateway = gateway.with_rate_limit(Arc::new(limiter));
		}

		Ok((Arc::new(gateway), manager))
	}
}

fn seconds(secs: u64) -> Duration {
	Duration::seconds(i64::try_from(secs.min(MAX_SECS)).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn parse(extra: &[&str]) -> Cli {
		let mut args =
			vec!["insights-gateway", "--client-id", "id", "--client-secret", "s", "--refresh-token", "r"];

		args.extend_from_slice(extra);

		Cli::try_parse_from(args).expect("Fixture arguments should parse.")
	}

	#[test]
	fn defaults_match_the_documented_settings() {
		let cli = parse(&[]);

		assert_eq!(
			cli.listen,
			"127.0.0.1:8000".parse::<SocketAddr>().expect("Fixture address should parse.")
		);
		assert_eq!(cli.exchange_grant, ExchangeGrant::FbExchangeToken);
		assert_eq!(cli.renewal_schedule(), RenewalSchedule::default());
		assert_eq!(cli.response_cache().map(|cache| cache.ttl()), Some(Duration::minutes(5)));
		assert_eq!(cli.rate_limiter().map(|limiter| limiter.limit().get()), Some(5));
		assert_eq!(cli.field_set().expect("Default fields should be valid."), FieldSet::default());

		let descriptor = cli.descriptor().expect("Default endpoints should validate.");

		assert_eq!(descriptor.endpoints.api_base.as_str(), "https://graph.facebook.com/v21.0");
	}

	#[test]
	fn zero_disables_cache_and_rate_gate() {
		let cli = parse(&[
			"--cache-ttl-secs",
			"0",
			"--rate-limit",
			"0",
			"--exchange-grant",
			"refresh-token",
			"--fields",
			"reach,spend",
		]);

		assert!(cli.response_cache().is_none());
		assert!(cli.rate_limiter().is_none());
		assert_eq!(cli.exchange_grant, ExchangeGrant::RefreshToken);
		assert_eq!(cli.field_set().expect("Custom fields should parse.").joined(), "reach,spend");
	}

	#[test]
	fn zero_or_oversized_intervals_are_rejected() {
		let base = [
			"insights-gateway",
			"--client-id",
			"id",
			"--client-secret",
			"s",
			"--refresh-token",
			"r",
		];
		let oversized = (MAX_SECS + 1).to_string();

		for flag in [
			"--renew-every-secs",
			"--renew-backoff-secs",
			"--rate-window-secs",
			"--http-timeout-secs",
		] {
			let mut zero = base.to_vec();

			zero.extend([flag, "0"]);

			assert!(Cli::try_parse_from(zero).is_err(), "{flag} 0 should be rejected.");
		}

		for flag in ["--renew-every-secs", "--cache-ttl-secs", "--rate-window-secs"] {
			let mut args = base.to_vec();

			args.extend([flag, oversized.as_str()]);

			assert!(Cli::try_parse_from(args).is_err(), "{flag} {oversized} should be rejected.");
		}

		let cli = parse(&["--cache-ttl-secs", MAX_SECS.to_string().as_str()]);

		assert_eq!(
			cli.response_cache().map(|cache| cache.ttl()),
			Some(Duration::seconds(MAX_SECS as i64))
		);
	}

	#[test]
	fn plain_http_endpoints_are_rejected() {
		let cli = parse(&["--base-url", "http://graph.example.com/v21.0"]);

		assert!(matches!(cli.descriptor(), Err(ConfigError::Descriptor(_))));
	}
}
