//! Provider descriptor describing the authorization server and the upstream data API.
//!
//! A descriptor bundles the token, introspection, and data endpoints together with the
//! exchange style the token endpoint speaks, so the lifecycle and gateway layers never
//! hard-code provider URLs.

/// Builder API and validation for descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::_prelude::*;

/// Client authentication modes for the standard refresh-token grant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// How the token endpoint turns the refresh credential into a bearer token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeGrant {
	/// Graph-style `GET ?grant_type=fb_exchange_token&fb_exchange_token=...` exchange.
	#[default]
	FbExchangeToken,
	/// RFC 6749 `grant_type=refresh_token` POST.
	RefreshToken,
}
impl ExchangeGrant {
	/// Returns the `grant_type` value sent to the token endpoint.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeGrant::FbExchangeToken => "fb_exchange_token",
			ExchangeGrant::RefreshToken => "refresh_token",
		}
	}
}
impl Display for ExchangeGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ExchangeGrant {
	type Err = ProviderDescriptorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
			"fb_exchange_token" => Ok(Self::FbExchangeToken),
			"refresh_token" => Ok(Self::RefreshToken),
			_ => Err(ProviderDescriptorError::UnknownExchangeGrant { value: s.to_owned() }),
		}
	}
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Token endpoint used for refresh exchanges.
	pub token: Url,
	/// Introspection endpoint answering "is this token still accepted?".
	pub introspection: Url,
	/// Base URL of the upstream data API (e.g. `https://graph.facebook.com/v21.0`).
	pub api_base: Url,
}

/// Immutable provider descriptor consumed by the lifecycle and gateway layers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Exchange style spoken by the token endpoint.
	pub exchange_grant: ExchangeGrant,
	/// Client authentication mechanism for [`ExchangeGrant::RefreshToken`].
	pub client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptor {
	/// Creates a new builder.
	pub fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::default()
	}

	/// Descriptor pointing at the public Graph API endpoints.
	pub fn graph_api(version: &str) -> Result<Self, ProviderDescriptorError> {
		let parse = |raw: String| {
			Url::parse(&raw).map_err(|_| ProviderDescriptorError::InvalidUrl { url: raw })
		};

		Self::builder()
			.token_endpoint(parse("https://graph.facebook.com/oauth/access_token".into())?)
			.introspection_endpoint(parse("https://graph.facebook.com/debug_token".into())?)
			.api_base(parse(format!("https://graph.facebook.com/{version}"))?)
			.build()
	}

	/// URL of the insights edge for `target_id` (`{api_base}/{target_id}/insights`).
	pub fn insights_url(&self, target_id: &str) -> Result<Url, ProviderDescriptorError> {
		let mut url = self.endpoints.api_base.clone();

		url.path_segments_mut()
			.map_err(|_| ProviderDescriptorError::InvalidUrl {
				url: self.endpoints.api_base.to_string(),
			})?
			.pop_if_empty()
			.push(target_id)
			.push("insights");

		Ok(url)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn graph_descriptor_points_at_public_endpoints() {
		let descriptor =
			ProviderDescriptor::graph_api("v21.0").expect("Graph descriptor should build.");

		assert_eq!(
			descriptor.endpoints.token.as_str(),
			"https://graph.facebook.com/oauth/access_token"
		);
		assert_eq!(descriptor.exchange_grant, ExchangeGrant::FbExchangeToken);
		assert_eq!(
			descriptor.insights_url("123").expect("Insights URL should build.").as_str(),
			"https://graph.facebook.com/v21.0/123/insights"
		);
	}

	#[test]
	fn insights_url_escapes_target_and_tolerates_trailing_slash() {
		let descriptor = ProviderDescriptor::builder()
			.token_endpoint(Url::parse("https://auth.example.com/token").expect("URL should parse."))
			.introspection_endpoint(
				Url::parse("https://auth.example.com/introspect").expect("URL should parse."),
			)
			.api_base(Url::parse("https://api.example.com/v1/").expect("URL should parse."))
			.build()
			.expect("Descriptor should build.");

		assert_eq!(
			descriptor.insights_url("act_1/2").expect("Insights URL should build.").as_str(),
			"https://api.example.com/v1/act_1%2F2/insights"
		);
	}

	#[test]
	fn exchange_grant_parses_cli_spellings() {
		assert_eq!("fb-exchange-token".parse::<ExchangeGrant>(), Ok(ExchangeGrant::FbExchangeToken));
		assert_eq!("REFRESH_TOKEN".parse::<ExchangeGrant>(), Ok(ExchangeGrant::RefreshToken));
		assert!("password".parse::<ExchangeGrant>().is_err());
	}
}
