//! Transport seams for the lease endpoint and the downstream inference endpoint.
//!
//! The cache depends only on [`LeaseFetcher`] and the executor only on [`InferenceTransport`], so
//! callers can bring their own HTTP stack. With the default `reqwest` feature the crate ships
//! [`ReqwestLeaseFetcher`] and [`ReqwestInferenceTransport`], which speak the JSON contracts below:
//!
//! - lease: `GET <lease>` with `Accept: application/json`, reply `{ "token": string, "ttl": seconds }`
//! - inference: `GET <inference>?text=<urlencoded>` with `Authorization: Bearer <token>`, reply
//!   `{ "response": string }`

// self
use crate::{
	_prelude::*,
	error::{CredentialError, DownstreamError},
	lease::{Lease, TokenSecret},
};
#[cfg(feature = "reqwest")]
use crate::{
	config::{Endpoints, ExecutorConfig, LeaseCacheConfig},
	error::ConfigError,
};

/// Boxed future returned by [`LeaseFetcher::fetch`].
pub type FetchFuture<'a> =
	Pin<Box<dyn Future<Output = Result<LeaseGrant, CredentialError>> + 'a + Send>>;

/// Boxed future returned by [`InferenceTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<InferenceReply, DownstreamError>> + 'a + Send>>;

/// Issues one request against the lease endpoint.
///
/// Implementations must not cache or retry; the lease cache owns both concerns and guarantees that
/// concurrent demand produces a single `fetch` call per refresh cycle.
pub trait LeaseFetcher
where
	Self: 'static + Send + Sync,
{
	/// Requests a fresh lease grant.
	fn fetch(&self) -> FetchFuture<'_>;
}

/// Sends user text to the inference endpoint with a bearer credential.
pub trait InferenceTransport
where
	Self: 'static + Send + Sync,
{
	/// Performs the authenticated call.
	fn send<'a>(
		&'a self,
		token: &'a TokenSecret,
		request: &'a InferenceRequest,
	) -> TransportFuture<'a>;
}

/// Lease endpoint payload.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseGrant {
	/// Issued bearer token.
	pub token: String,
	/// Lifetime in seconds; fractional values are honoured to the millisecond.
	pub ttl: f64,
}
impl LeaseGrant {
	/// Longest lifetime accepted from the lease endpoint.
	pub const MAX_TTL: Duration = Duration::days(365);

	/// Parses a raw response body.
	pub fn from_slice(body: &[u8]) -> Result<Self, CredentialError> {
		let mut de = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut de).map_err(CredentialError::malformed)
	}

	/// Validates the TTL and converts it into a duration.
	pub fn ttl_duration(&self) -> Result<Duration, CredentialError> {
		let millis = (self.ttl * 1_000.).round();

		if !millis.is_finite() || millis <= 0. {
			return Err(CredentialError::NonPositiveTtl);
		}
		if millis > Self::MAX_TTL.whole_milliseconds() as f64 {
			return Err(CredentialError::TtlOutOfRange);
		}

		Ok(Duration::milliseconds(millis as i64))
	}

	/// Validates the grant and stamps it into a [`Lease`] issued at `now`.
	pub fn into_lease(self, now: OffsetDateTime) -> Result<Lease, CredentialError> {
		if self.token.is_empty() {
			return Err(CredentialError::EmptyToken);
		}

		let ttl = self.ttl_duration()?;

		Ok(Lease::issue(self.token, now, ttl))
	}
}
impl Debug for LeaseGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LeaseGrant").field("token", &"<redacted>").field("ttl", &self.ttl).finish()
	}
}

/// User text forwarded downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferenceRequest {
	/// Raw user input; transports URL-encode it.
	pub text: String,
}
impl InferenceRequest {
	/// Wraps user input.
	pub fn new(text: impl Into<String>) -> Self {
		Self { text: text.into() }
	}
}

/// Inference endpoint payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceReply {
	/// Model output shown to the user.
	pub response: String,
}
impl InferenceReply {
	/// Parses a raw response body.
	pub fn from_slice(body: &[u8]) -> Result<Self, DownstreamError> {
		let mut de = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| DownstreamError::Malformed { source })
	}
}

/// Lease fetcher backed by [`ReqwestClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestLeaseFetcher {
	client: ReqwestClient,
	endpoint: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestLeaseFetcher {
	/// Builds a fetcher whose client enforces the configured fetch timeout.
	pub fn new(endpoints: &Endpoints, config: &LeaseCacheConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let client = ReqwestClient::builder().timeout(config.fetch_timeout_std()).build()?;

		Ok(Self::with_client(client, endpoints.lease.clone()))
	}

	/// Wraps an existing client; the caller owns its timeout policy.
	pub fn with_client(client: ReqwestClient, endpoint: Url) -> Self {
		Self { client, endpoint }
	}
}
#[cfg(feature = "reqwest")]
impl LeaseFetcher for ReqwestLeaseFetcher {
	fn fetch(&self) -> FetchFuture<'_> {
		Box::pin(async move {
			let response = self
				.client
				.get(self.endpoint.clone())
				.header(reqwest::header::ACCEPT, "application/json")
				.send()
				.await?;
			let status = response.status();

			if !status.is_success() {
				return Err(CredentialError::Status { status: status.as_u16() });
			}

			let body = response.bytes().await?;

			LeaseGrant::from_slice(&body)
		})
	}
}

/// Inference transport backed by [`ReqwestClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestInferenceTransport {
	client: ReqwestClient,
	endpoint: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestInferenceTransport {
	/// Builds a transport whose client enforces the configured transport timeout.
	pub fn new(endpoints: &Endpoints, config: &ExecutorConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let client = ReqwestClient::builder().timeout(config.transport_timeout_std()).build()?;

		Ok(Self::with_client(client, endpoints.inference.clone()))
	}

	/// Wraps an existing client; the executor still bounds each call by its transport timeout.
	pub fn with_client(client: ReqwestClient, endpoint: Url) -> Self {
		Self { client, endpoint }
	}

	fn request_url(&self, request: &InferenceRequest) -> Url {
		let mut url = self.endpoint.clone();

		url.query_pairs_mut().append_pair("text", &request.text);

		url
	}
}
#[cfg(feature = "reqwest")]
impl InferenceTransport for ReqwestInferenceTransport {
	fn send<'a>(
		&'a self,
		token: &'a TokenSecret,
		request: &'a InferenceRequest,
	) -> TransportFuture<'a> {
		Box::pin(async move {
			let response = self
				.client
				.get(self.request_url(request))
				.header(reqwest::header::AUTHORIZATION, token.bearer_header())
				.header(reqwest::header::ACCEPT, "application/json")
				.send()
				.await?;
			let status = response.status();

			if matches!(status.as_u16(), 401 | 403) {
				return Err(DownstreamError::Unauthorized { status: status.as_u16() });
			}
			if !status.is_success() {
				return Err(DownstreamError::Status { status: status.as_u16() });
			}

			let body = response.bytes().await?;

			InferenceReply::from_slice(&body)
		})
	}
}
