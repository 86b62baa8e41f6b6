//! Session configuration, its builder, and the resolved endpoint set.

// self
use crate::{_prelude::*, error::ConfigError, http};

/// Whether claims embedded in the access token may fill identity gaps after login.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimsPolicy {
	/// Decode claims and use them for fields `/users/me/` leaves empty.
	#[default]
	Fallback,
	/// Never decode the access token.
	Ignore,
}

/// Endpoint paths relative to [`SessionConfig::base_url`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
	/// Username/password exchange.
	pub login: String,
	/// Refresh token exchange.
	pub refresh: String,
	/// Caller's own identity record.
	pub me: String,
}
impl Default for EndpointPaths {
	fn default() -> Self {
		Self { login: "auth/login/".into(), refresh: "auth/refresh/".into(), me: "users/me/".into() }
	}
}

/// Absolute endpoint URLs resolved from a [`SessionConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
	/// Base every operation path is joined onto.
	pub base: Url,
	/// Login endpoint (exempt from bearer attachment and refresh).
	pub login: Url,
	/// Refresh endpoint (exempt from bearer attachment and refresh).
	pub refresh: Url,
	/// Identity endpoint.
	pub me: Url,
}
impl Endpoints {
	/// Returns true when `url` targets one of the two auth endpoints.
	///
	/// Matching is by prefix, so anything nested under the login or refresh path (a trailing
	/// query, a sub-path) is exempt as well.
	pub fn is_exempt(&self, url: &Url) -> bool {
		let target = url.as_str();

		target.starts_with(self.login.as_str()) || target.starts_with(self.refresh.as_str())
	}
}

/// Configuration consumed by [`Client`](crate::client::Client) and the session service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Backend base URL; always ends with `/` once validated.
	pub base_url: Url,
	/// Auth endpoint paths.
	#[serde(default)]
	pub endpoints: EndpointPaths,
	/// Bound on the refresh exchange, in milliseconds.
	#[serde(default = "default_refresh_timeout_ms")]
	pub refresh_timeout_ms: u64,
	/// Claims usage after login.
	#[serde(default)]
	pub claims: ClaimsPolicy,
	/// Buffer size for [`SessionEvent`](crate::session::SessionEvent) subscribers.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}
impl SessionConfig {
	/// Default refresh exchange timeout.
	pub const DEFAULT_REFRESH_TIMEOUT: StdDuration = StdDuration::from_secs(10);
	/// Default event channel capacity.
	pub const DEFAULT_EVENT_CAPACITY: usize = 64;

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> SessionConfigBuilder {
		SessionConfigBuilder::new(base_url)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Parse { source })?;

		config.validated()
	}

	/// Refresh exchange timeout.
	pub fn refresh_timeout(&self) -> StdDuration {
		StdDuration::from_millis(self.refresh_timeout_ms)
	}

	/// Resolves the endpoint paths against the base URL.
	pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
		Ok(Endpoints {
			base: self.base_url.clone(),
			login: http::join_path(&self.base_url, &self.endpoints.login)?,
			refresh: http::join_path(&self.base_url, &self.endpoints.refresh)?,
			me: http::join_path(&self.base_url, &self.endpoints.me)?,
		})
	}

	fn validated(mut self) -> Result<Self, ConfigError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}
		if !self.base_url.path().ends_with('/') {
			let path = format!("{}/", self.base_url.path());

			self.base_url.set_path(&path);
		}
		if self.refresh_timeout_ms == 0 {
			return Err(ConfigError::ZeroRefreshTimeout);
		}
		if self.event_capacity == 0 {
			return Err(ConfigError::ZeroEventCapacity);
		}

		self.endpoints()?;

		Ok(self)
	}
}

fn default_refresh_timeout_ms() -> u64 {
	SessionConfig::DEFAULT_REFRESH_TIMEOUT.as_millis() as u64
}

fn default_event_capacity() -> usize {
	SessionConfig::DEFAULT_EVENT_CAPACITY
}

/// Builder for [`SessionConfig`].
#[derive(Clone, Debug)]
pub struct SessionConfigBuilder {
	config: SessionConfig,
}
impl SessionConfigBuilder {
	fn new(base_url: Url) -> Self {
		Self {
			config: SessionConfig {
				base_url,
				endpoints: EndpointPaths::default(),
				refresh_timeout_ms: default_refresh_timeout_ms(),
				claims: ClaimsPolicy::default(),
				event_capacity: default_event_capacity(),
			},
		}
	}

	/// Overrides the login path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.config.endpoints.login = path.into();

		self
	}

	/// Overrides the refresh path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.config.endpoints.refresh = path.into();

		self
	}

	/// Overrides the identity path.
	pub fn me_path(mut self, path: impl Into<String>) -> Self {
		self.config.endpoints.me = path.into();

		self
	}

	/// Overrides the refresh exchange timeout.
	pub fn refresh_timeout(mut self, timeout: StdDuration) -> Self {
		self.config.refresh_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

		self
	}

	/// Overrides the claims policy.
	pub fn claims_policy(mut self, policy: ClaimsPolicy) -> Self {
		self.config.claims = policy;

		self
	}

	/// Overrides the event channel capacity.
	pub fn event_capacity(mut self, capacity: usize) -> Self {
		self.config.event_capacity = capacity;

		self
	}

	/// Validates the configuration.
	pub fn build(self) -> Result<SessionConfig, ConfigError> {
		self.config.validated()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse.")
	}

	#[test]
	fn builder_normalizes_base_and_resolves_endpoints() {
		let config = SessionConfig::builder(url("https://gym.example.com/api"))
			.refresh_timeout(StdDuration::from_millis(1500))
			.build()
			.expect("Config should build.");
		let endpoints = config.endpoints().expect("Endpoints should resolve.");

		assert_eq!(config.base_url.as_str(), "https://gym.example.com/api/");
		assert_eq!(endpoints.login.as_str(), "https://gym.example.com/api/auth/login/");
		assert_eq!(endpoints.refresh.as_str(), "https://gym.example.com/api/auth/refresh/");
		assert_eq!(endpoints.me.as_str(), "https://gym.example.com/api/users/me/");
		assert_eq!(config.refresh_timeout(), StdDuration::from_millis(1500));
		assert!(endpoints.is_exempt(&url("https://gym.example.com/api/auth/refresh/")));
		assert!(!endpoints.is_exempt(&url("https://gym.example.com/api/users/me/")));
	}

	#[test]
	fn exemption_covers_paths_nested_under_auth_endpoints() {
		let endpoints = SessionConfig::builder(url("https://gym.example.com/api/"))
			.build()
			.and_then(|config| config.endpoints())
			.expect("Endpoints should resolve.");

		assert!(endpoints.is_exempt(&url("https://gym.example.com/api/auth/login/?next=home")));
		assert!(endpoints.is_exempt(&url("https://gym.example.com/api/auth/refresh/verify/")));
		assert!(!endpoints.is_exempt(&url("https://gym.example.com/api/auth/")));
		assert!(!endpoints.is_exempt(&url("https://gym.example.com/other/auth/login/")));
	}

	#[test]
	fn builder_rejects_zero_limits() {
		let err = SessionConfig::builder(url("https://gym.example.com/"))
			.refresh_timeout(StdDuration::ZERO)
			.build()
			.expect_err("Zero timeout should be rejected.");

		assert!(matches!(err, ConfigError::ZeroRefreshTimeout));

		let err = SessionConfig::builder(url("https://gym.example.com/"))
			.event_capacity(0)
			.build()
			.expect_err("Zero capacity should be rejected.");

		assert!(matches!(err, ConfigError::ZeroEventCapacity));
		assert!(matches!(
			SessionConfig::builder(url("mailto:ops@example.com")).build(),
			Err(ConfigError::InvalidBaseUrl { .. })
		));
	}

	#[test]
	fn json_documents_apply_defaults_and_report_paths() {
		let config = SessionConfig::from_json_str(
			r#"{"base_url":"https://gym.example.com/api/","endpoints":{"me":"auth/me/"},"claims":"ignore"}"#,
		)
		.expect("Config document should parse.");

		assert_eq!(config.endpoints.me, "auth/me/");
		assert_eq!(config.endpoints.login, "auth/login/");
		assert_eq!(config.claims, ClaimsPolicy::Ignore);
		assert_eq!(config.refresh_timeout(), SessionConfig::DEFAULT_REFRESH_TIMEOUT);
		assert_eq!(config.event_capacity, SessionConfig::DEFAULT_EVENT_CAPACITY);

		let err = SessionConfig::from_json_str(
			r#"{"base_url":"https://gym.example.com/","refresh_timeout_ms":"soon"}"#,
		)
		.expect_err("Wrong type should be rejected.");

		match err {
			ConfigError::Parse { source } =>
				assert_eq!(source.path().to_string(), "refresh_timeout_ms"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
