//! Single-credential OAuth 2.0 lifecycle manager and insights request gateway.
//!
//! One bearer token is kept valid and renewed in the background, and an analytics API is fronted
//! with response caching and a rate gate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
#[cfg(feature = "server")] pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod scheduler;
#[cfg(feature = "server")] pub mod server;
pub mod store;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::RefreshCredential,
		gateway::InsightsGateway,
		http::ReqwestHttpClient,
		lifecycle::{CredentialManager, ReqwestCredentialManager},
		oauth::ReqwestTransportErrorMapper,
		provider::{ExchangeGrant, ProviderDescriptor},
	};

	/// Gateway type alias used by reqwest-backed integration tests.
	pub type ReqwestTestGateway = InsightsGateway<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Client identifier shared by test fixtures.
	pub const TEST_CLIENT_ID: &str = "client-insights";
	/// Client secret shared by test fixtures.
	pub const TEST_CLIENT_SECRET: &str = "secret-insights";
	/// Long-lived refresh token shared by test fixtures.
	pub const TEST_REFRESH_TOKEN: &str = "long-lived-refresh";

	/// Refresh credential built from the shared fixture constants.
	pub fn test_refresh_credential() -> RefreshCredential {
		RefreshCredential::new(TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_REFRESH_TOKEN)
	}

	/// Builds a descriptor whose endpoints all live under `base` (usually a mock server URL).
	///
	/// Endpoints: `{base}/oauth/access_token`, `{base}/debug_token`, `{base}/v21.0`.
	pub fn test_descriptor(base: &str, grant: ExchangeGrant) -> ProviderDescriptor {
		let base = base.trim_end_matches('/');

		ProviderDescriptor::builder()
			.token_endpoint(
				Url::parse(&format!("{base}/oauth/access_token"))
					.expect("Mock token endpoint should parse."),
			)
			.introspection_endpoint(
				Url::parse(&format!("{base}/debug_token"))
					.expect("Mock introspection endpoint should parse."),
			)
			.api_base(Url::parse(&format!("{base}/v21.0")).expect("Mock API base should parse."))
			.exchange_grant(grant)
			.build()
			.expect("Mock descriptor should build.")
	}

	/// Constructs a credential manager backed by the default reqwest transport.
	pub fn build_reqwest_test_manager(
		descriptor: ProviderDescriptor,
	) -> Arc<ReqwestCredentialManager> {
		Arc::new(
			CredentialManager::new(descriptor, test_refresh_credential())
				.expect("Default reqwest transport should build."),
		)
	}

	/// Constructs a gateway (no cache, no rate gate) plus the manager it drives.
	pub fn build_reqwest_test_gateway(
		descriptor: ProviderDescriptor,
	) -> (ReqwestTestGateway, Arc<ReqwestCredentialManager>) {
		let manager = build_reqwest_test_manager(descriptor);
		let gateway = InsightsGateway::new(manager.clone());

		(gateway, manager)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(feature = "server")] use {color_eyre as _, tracing_subscriber as _};
#[cfg(test)] use {color_eyre as _, httpmock as _};
