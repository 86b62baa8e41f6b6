//! Transport primitives for authenticated backend calls.
//!
//! The module exposes [`HttpTransport`], the crate's only dependency on an HTTP stack,
//! alongside the request/response values that cross it. [`Operation`] is what surrounding
//! screens hand to the dispatch entry point; the gate resolves it into an [`OutboundRequest`]
//! and attaches the bearer credential before the transport executes it.

// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransientError},
};
#[cfg(feature = "reqwest")] use crate::error::TransportError;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing backend requests.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// the session service, the dispatch gate, and the refresh coordinator's background task.
/// The transport attaches `Authorization: Bearer <token>` when [`OutboundRequest::bearer`]
/// is set and must report every HTTP status as an [`ApiResponse`]; only failures that
/// produced no response at all map to an error.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and returns the raw response.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// HTTP methods used by backend operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical upper-case label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Backend operation described relative to the configured base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the base URL (a leading `/` is ignored).
	pub path: String,
	/// Query parameters appended in order.
	pub query: Vec<(String, String)>,
	/// Serialized JSON body.
	pub body: Option<Vec<u8>>,
}
impl Operation {
	/// Creates an operation without query or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: Vec::new(), body: None }
	}

	/// Shorthand for a `GET` operation.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` operation.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Shorthand for a `PATCH` operation.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// Shorthand for a `DELETE` operation.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn with_json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(
			serde_json::to_vec(body).map_err(|source| ConfigError::RequestBody { source })?,
		);

		Ok(self)
	}

	/// Resolves the operation against `base` into a transport-ready request.
	pub fn resolve(self, base: &Url) -> Result<OutboundRequest, ConfigError> {
		let mut url = join_path(base, &self.path)?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}

		Ok(OutboundRequest { method: self.method, url, body: self.body, bearer: None })
	}
}

/// Fully resolved request handed to an [`HttpTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Serialized JSON body.
	pub body: Option<Vec<u8>>,
	/// Bearer credential to attach, if any.
	pub bearer: Option<TokenSecret>,
}
impl OutboundRequest {
	/// Builds a JSON `POST` to an absolute URL.
	pub fn post_json<T>(url: Url, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(body).map_err(|source| ConfigError::RequestBody { source })?;

		Ok(Self { method: Method::Post, url, body: Some(body), bearer: None })
	}

	/// Builds a `GET` to an absolute URL.
	pub fn get(url: Url) -> Self {
		Self { method: Method::Get, url, body: None, bearer: None }
	}

	/// Replaces the bearer credential.
	pub fn with_bearer(mut self, bearer: Option<TokenSecret>) -> Self {
		self.bearer = bearer;

		self
	}
}

/// Raw backend response; every HTTP status is represented here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes.
	pub body: Vec<u8>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ApiResponse {
	/// Status that signals a stale or missing credential.
	pub const UNAUTHORIZED: u16 = 401;

	/// Creates a response without a retry hint.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into(), retry_after: None }
	}

	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns true when the backend rejected the attached credential.
	pub fn is_unauthorized(&self) -> bool {
		self.status == Self::UNAUTHORIZED
	}

	/// Deserializes the body, reporting the failing JSON path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| {
			TransientError::ResponseParse { source, status: Some(self.status) }.into()
		})
	}

	/// Human-readable `detail` field from an error payload, when present.
	pub fn detail(&self) -> Option<String> {
		#[derive(Deserialize)]
		struct ErrorPayload {
			detail: Option<serde_json::Value>,
		}

		let payload: ErrorPayload = serde_json::from_slice(&self.body).ok()?;

		match payload.detail? {
			serde_json::Value::String(detail) => Some(detail),
			other => Some(other.to_string()),
		}
	}

	/// Converts non-success statuses into [`Error`] values.
	pub fn error_for_status(self) -> Result<Self> {
		if self.is_success() {
			return Ok(self);
		}

		let detail = self.detail().unwrap_or_else(|| format!("HTTP {}", self.status));

		if self.is_unauthorized() {
			Err(Error::Unauthorized { detail })
		} else {
			Err(Error::Status { status: self.status, detail })
		}
	}
}

/// Joins a relative path onto `base`, ignoring any leading `/` on `path`.
pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url, ConfigError> {
	base.join(path.trim_start_matches('/'))
		.map_err(|source| ConfigError::InvalidEndpoint { path: path.to_owned(), source })
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are followed according to the wrapped client's policy; configure a custom
/// client when the backend must not be allowed to bounce bearer credentials elsewhere.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Patch => reqwest::Method::PATCH,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = self.0.request(method, request.url);

			if let Some(token) = &request.bearer {
				builder = builder.bearer_auth(token.expose());
			}
			if let Some(body) = request.body {
				builder = builder.header(CONTENT_TYPE, "application/json").body(body);
			}

			let response = builder.send().await.map_err(map_reqwest_error)?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

			Ok(ApiResponse { status, body, retry_after })
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::UnexpectedResponse {
			message: "Request timed out while calling the backend".into(),
			status: err.status().map(|code| code.as_u16()),
			retry_after: None,
		}
		.into();
	}

	TransportError::from(err).into()
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return Some(Duration::seconds(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("https://api.example.com/api/").expect("Base URL fixture should parse.")
	}

	#[test]
	fn operations_resolve_relative_to_base() {
		let request = Operation::get("/members/")
			.with_query("page", "2")
			.resolve(&base())
			.expect("Operation should resolve.");

		assert_eq!(request.url.as_str(), "https://api.example.com/api/members/?page=2");
		assert_eq!(request.method, Method::Get);
		assert!(request.bearer.is_none());
	}

	#[test]
	fn json_bodies_are_serialized_up_front() {
		let request = Operation::post("plans/")
			.with_json(&serde_json::json!({ "title": "Push" }))
			.expect("Body should serialize.")
			.resolve(&base())
			.expect("Operation should resolve.");

		assert_eq!(request.body.as_deref(), Some(br#"{"title":"Push"}"#.as_slice()));
	}

	#[test]
	fn error_for_status_extracts_detail() {
		let err = ApiResponse::new(401, r#"{"detail":"Token is invalid or expired"}"#)
			.error_for_status()
			.expect_err("401 should map to an error.");

		assert!(matches!(err, Error::Unauthorized { ref detail } if detail == "Token is invalid or expired"));

		let err = ApiResponse::new(503, "upstream down")
			.error_for_status()
			.expect_err("503 should map to an error.");

		assert!(matches!(err, Error::Status { status: 503, ref detail } if detail == "HTTP 503"));
		assert!(ApiResponse::new(204, Vec::new()).error_for_status().is_ok());
	}

	#[test]
	fn json_reports_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Pair {
			#[allow(dead_code)]
			access: String,
		}

		let err = ApiResponse::new(200, r#"{"access":5}"#)
			.json::<Pair>()
			.expect_err("Wrong type should fail to parse.");

		match err {
			Error::Transient(TransientError::ResponseParse { source, status }) => {
				assert_eq!(source.path().to_string(), "access");
				assert_eq!(status, Some(200));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
