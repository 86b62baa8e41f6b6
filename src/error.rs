//! Session-level error types shared across the store, gate, coordinator, and facade.

// self
use crate::{
	_prelude::*,
	auth::{Role, RoleSet},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical session error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the caller may retry.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Login was rejected by the backend.
	#[error("Login was rejected: {detail}.")]
	InvalidCredentials {
		/// Backend-supplied `detail` string, surfaced verbatim.
		detail: String,
	},
	/// The operation requires a session but none is active.
	#[error("No authenticated session is available.")]
	NotAuthenticated,
	/// The backend rejected the attached access token.
	#[error("Access token was rejected: {detail}.")]
	Unauthorized {
		/// Backend-supplied `detail` string, when present.
		detail: String,
	},
	/// The refresh exchange failed and the session has been destroyed.
	#[error("Session expired and could not be refreshed: {reason}.")]
	RefreshFailed {
		/// Summary of the refresh failure.
		reason: String,
	},
	/// The current role is not permitted to attempt the operation.
	#[error("Role `{current}` is not permitted; requires one of {required}.")]
	Forbidden {
		/// Roles the operation declared.
		required: RoleSet,
		/// Role held by the session.
		current: Role,
	},
	/// The backend answered with a non-success status.
	#[error("Backend returned HTTP {status}: {detail}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Backend-supplied `detail` string, when present.
		detail: String,
	},
}
impl Error {
	/// Coarse navigation signal consumers should act on, if any.
	pub fn redirect(&self) -> Option<Redirect> {
		match self {
			Self::NotAuthenticated | Self::RefreshFailed { .. } => Some(Redirect::Login),
			Self::Forbidden { .. } => Some(Redirect::Landing),
			_ => None,
		}
	}
}

/// Navigation signal surfaced for authentication and authorization denials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Redirect {
	/// Send the user to the login screen.
	Login,
	/// Send the user to the default landing page.
	Landing,
}

/// Configuration and validation failures raised by the session core.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot carry relative endpoint paths.
	#[error("Base URL `{url}` cannot be used as a base for endpoint paths.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// An endpoint or operation path could not be joined onto the base URL.
	#[error("Path `{path}` cannot be resolved against the base URL.")]
	InvalidEndpoint {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Refresh timeout must be positive.
	#[error("The refresh timeout must be greater than zero.")]
	ZeroRefreshTimeout,
	/// Event channel capacity must be positive.
	#[error("The session event capacity must be greater than zero.")]
	ZeroEventCapacity,
	/// Configuration document could not be parsed.
	#[error("Session configuration is malformed.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// Role strings could not be normalized.
	#[error("Declared roles are invalid.")]
	InvalidRole(#[from] crate::auth::RoleError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Backend returned an unexpected but non-fatal response.
	#[error("Backend returned an unexpected response: {message}.")]
	UnexpectedResponse {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Backend responded with JSON that did not match the expected shape.
	#[error("Backend returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
