// std
use std::net::IpAddr;
// self
use crate::{
	_prelude::*,
	provider::{ClientAuthMethod, ExchangeGrant, ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Introspection endpoint is mandatory.
	#[error("Missing introspection endpoint.")]
	MissingIntrospectionEndpoint,
	/// Upstream API base URL is mandatory.
	#[error("Missing upstream API base URL.")]
	MissingApiBase,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A URL could not be parsed or cannot carry path segments.
	#[error("Invalid provider URL: {url}.")]
	InvalidUrl {
		/// Offending URL.
		url: String,
	},
	/// Exchange grant label is not recognized.
	#[error("Unknown exchange grant `{value}`; expected fb-exchange-token or refresh-token.")]
	UnknownExchangeGrant {
		/// Rejected label.
		value: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug, Default)]
pub struct ProviderDescriptorBuilder {
	/// Token endpoint used for refresh exchanges.
	pub token_endpoint: Option<Url>,
	/// Token introspection endpoint.
	pub introspection_endpoint: Option<Url>,
	/// Upstream data API base URL.
	pub api_base: Option<Url>,
	/// Exchange style spoken by the token endpoint.
	pub exchange_grant: ExchangeGrant,
	/// Client authentication method for the standard refresh grant.
	pub client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptorBuilder {
	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the introspection endpoint.
	pub fn introspection_endpoint(mut self, url: Url) -> Self {
		self.introspection_endpoint = Some(url);

		self
	}

	/// Sets the upstream data API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Overrides the exchange style (defaults to [`ExchangeGrant::FbExchangeToken`]).
	pub fn exchange_grant(mut self, grant: ExchangeGrant) -> Self {
		self.exchange_grant = grant;

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let introspection = self
			.introspection_endpoint
			.ok_or(ProviderDescriptorError::MissingIntrospectionEndpoint)?;
		let api_base = self.api_base.ok_or(ProviderDescriptorError::MissingApiBase)?;
		let descriptor = ProviderDescriptor {
			endpoints: ProviderEndpoints { token, introspection, api_base },
			exchange_grant: self.exchange_grant,
			client_auth_method: self.client_auth_method,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("introspection", &self.endpoints.introspection)?;
		validate_endpoint("api_base", &self.endpoints.api_base)?;

		if self.endpoints.api_base.cannot_be_a_base() {
			return Err(ProviderDescriptorError::InvalidUrl {
				url: self.endpoints.api_base.to_string(),
			});
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.is_ok_and(|ip| ip.is_loopback()),
		None => false,
	}
}
