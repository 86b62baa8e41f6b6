//! Session core for token-protected backends: bearer attachment, single-flight token
//! refresh, role gating, and persisted session state in one crate.
//!
//! Build a [`Client`](client::Client) once at process start and hand clones to every screen
//! that talks to the backend. Authenticated operations go through
//! [`Client::dispatch`](client::Client::dispatch), which checks the declared roles locally,
//! attaches the access token, and recovers from a stale token with exactly one refresh
//! exchange no matter how many requests fail at the same time.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod authz;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and an in-process fake backend for tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::{
		_prelude::*,
		client::Client,
		config::SessionConfig,
		session::{SessionEvent, SessionService},
		store::{MemoryStore, SessionStore, StoreError, StoreFuture, StoreKey},
	};

	// std
	use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use serde_json::{Value, json};
	use tokio::sync::Semaphore;
	// self
	use crate::http::{ApiResponse, HttpTransport, Method, OutboundRequest, TransportFuture};

	/// Base URL served by [`FakeBackend`].
	pub const FAKE_BASE_URL: &str = "https://gym.test/api/";
	/// Username accepted by [`FakeBackend`].
	pub const FAKE_USERNAME: &str = "ada";
	/// Password accepted by [`FakeBackend`].
	pub const FAKE_PASSWORD: &str = "s3cret";

	const INVALID_TOKEN: &str = "Given token not valid for any token type";

	/// Refresh endpoint behavior.
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
	pub enum FakeRefresh {
		/// Answer immediately.
		#[default]
		Immediate,
		/// Hold each exchange until [`FakeBackend::open_refresh_gate`] is called.
		Gated,
	}

	/// Request observed by [`FakeBackend`].
	#[derive(Clone, Debug, PartialEq, Eq)]
	pub struct RecordedCall {
		/// HTTP method.
		pub method: Method,
		/// URL path.
		pub path: String,
		/// Bearer secret, if one was attached.
		pub bearer: Option<String>,
	}

	/// In-process backend modelling the login, refresh, identity, and resource endpoints.
	///
	/// Login issues `access-<n>`/`refresh-<n>` (or a JWT-shaped access token when claims
	/// are configured). Resources accept only the most recently issued access token.
	#[derive(Debug)]
	pub struct FakeBackend {
		me: Mutex<Value>,
		me_status: Mutex<Option<u16>>,
		access_claims: Mutex<Option<Value>>,
		refresh_mode: Mutex<FakeRefresh>,
		refresh_gate: Semaphore,
		valid_access: Mutex<Option<String>>,
		valid_refresh: Mutex<Option<String>>,
		generation: AtomicU64,
		reject_refresh: AtomicBool,
		reject_resources: AtomicBool,
		rotate_refresh: AtomicBool,
		login_calls: AtomicUsize,
		me_calls: AtomicUsize,
		refresh_calls: AtomicUsize,
		resource_calls: AtomicUsize,
		calls: Mutex<Vec<RecordedCall>>,
	}
	impl FakeBackend {
		/// Creates a backend whose `/users/me/` describes a trainer named `ada`.
		pub fn new() -> Self {
			Self {
				me: Mutex::new(json!({
					"id": 7,
					"role": "Trainer",
					"username": FAKE_USERNAME,
					"email": "ada@gym.test",
				})),
				me_status: Mutex::new(None),
				access_claims: Mutex::new(None),
				refresh_mode: Mutex::new(FakeRefresh::default()),
				refresh_gate: Semaphore::new(0),
				valid_access: Mutex::new(None),
				valid_refresh: Mutex::new(None),
				generation: AtomicU64::new(0),
				reject_refresh: AtomicBool::new(false),
				reject_resources: AtomicBool::new(false),
				rotate_refresh: AtomicBool::new(false),
				login_calls: AtomicUsize::new(0),
				me_calls: AtomicUsize::new(0),
				refresh_calls: AtomicUsize::new(0),
				resource_calls: AtomicUsize::new(0),
				calls: Mutex::new(Vec::new()),
			}
		}

		/// Replaces the `/users/me/` payload.
		pub fn set_me(&self, me: Value) {
			*self.me.lock() = me;
		}

		/// Makes `/users/me/` answer with `status`.
		pub fn fail_me(&self, status: u16) {
			*self.me_status.lock() = Some(status);
		}

		/// Issues JWT-shaped access tokens carrying `claims`.
		pub fn set_access_claims(&self, claims: Value) {
			*self.access_claims.lock() = Some(claims);
		}

		/// Switches the refresh endpoint behavior.
		pub fn set_refresh(&self, mode: FakeRefresh) {
			*self.refresh_mode.lock() = mode;
		}

		/// Releases every held (and future) gated refresh exchange.
		pub fn open_refresh_gate(&self) {
			self.refresh_gate.add_permits(1024);
		}

		/// Invalidates the current access token; refresh issues a new one.
		pub fn expire_access(&self) {
			*self.valid_access.lock() = None;
		}

		/// Rejects every refresh exchange.
		pub fn reject_refresh(&self) {
			self.reject_refresh.store(true, Ordering::SeqCst);
		}

		/// Rejects every resource request, even with a valid token.
		pub fn reject_resources(&self) {
			self.reject_resources.store(true, Ordering::SeqCst);
		}

		/// Issues a new refresh token on every refresh exchange.
		pub fn rotate_refresh(&self, rotate: bool) {
			self.rotate_refresh.store(rotate, Ordering::SeqCst);
		}

		/// Access token currently accepted by resources.
		pub fn valid_access(&self) -> Option<String> {
			self.valid_access.lock().clone()
		}

		/// Refresh token currently accepted by the refresh endpoint.
		pub fn valid_refresh(&self) -> Option<String> {
			self.valid_refresh.lock().clone()
		}

		/// Number of login exchanges.
		pub fn login_calls(&self) -> usize {
			self.login_calls.load(Ordering::SeqCst)
		}

		/// Number of `/users/me/` fetches.
		pub fn me_calls(&self) -> usize {
			self.me_calls.load(Ordering::SeqCst)
		}

		/// Number of refresh exchanges.
		pub fn refresh_calls(&self) -> usize {
			self.refresh_calls.load(Ordering::SeqCst)
		}

		/// Number of resource requests.
		pub fn resource_calls(&self) -> usize {
			self.resource_calls.load(Ordering::SeqCst)
		}

		/// Every request observed so far.
		pub fn calls(&self) -> Vec<RecordedCall> {
			self.calls.lock().clone()
		}

		/// Most recent request whose path ends with `suffix`.
		pub fn last_call(&self, suffix: &str) -> Option<RecordedCall> {
			self.calls.lock().iter().rev().find(|call| call.path.ends_with(suffix)).cloned()
		}

		fn issue_access(&self, generation: u64) -> String {
			match self.access_claims.lock().as_ref() {
				Some(claims) => format!(
					"eyJhbGciOiJIUzI1NiJ9.{}.sig{generation}",
					URL_SAFE_NO_PAD.encode(claims.to_string())
				),
				None => format!("access-{generation}"),
			}
		}

		fn login(&self, request: &OutboundRequest) -> ApiResponse {
			self.login_calls.fetch_add(1, Ordering::SeqCst);

			let body = body_json(request);

			if body["username"] != FAKE_USERNAME || body["password"] != FAKE_PASSWORD {
				return respond(
					401,
					json!({ "detail": "No active account found with the given credentials" }),
				);
			}

			let generation = self.generation.fetch_add(1, Ordering::SeqCst);
			let access = self.issue_access(generation);
			let refresh = format!("refresh-{generation}");

			*self.valid_access.lock() = Some(access.clone());
			*self.valid_refresh.lock() = Some(refresh.clone());

			respond(200, json!({ "access": access, "refresh": refresh }))
		}

		async fn refresh(&self, request: &OutboundRequest) -> ApiResponse {
			self.refresh_calls.fetch_add(1, Ordering::SeqCst);

			let gated = *self.refresh_mode.lock() == FakeRefresh::Gated;

			if gated {
				match self.refresh_gate.acquire().await {
					Ok(permit) => permit.forget(),
					Err(_) => return respond(503, json!({ "detail": "Gate closed." })),
				}
			}

			let body = body_json(request);
			let presented = body["refresh"].as_str().map(ToOwned::to_owned);

			if self.reject_refresh.load(Ordering::SeqCst)
				|| presented.is_none()
				|| presented != self.valid_refresh()
			{
				return respond(
					401,
					json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" }),
				);
			}

			let generation = self.generation.fetch_add(1, Ordering::SeqCst);
			let access = self.issue_access(generation);

			*self.valid_access.lock() = Some(access.clone());

			if self.rotate_refresh.load(Ordering::SeqCst) {
				let refresh = format!("refresh-{generation}");

				*self.valid_refresh.lock() = Some(refresh.clone());

				respond(200, json!({ "access": access, "refresh": refresh }))
			} else {
				respond(200, json!({ "access": access }))
			}
		}

		fn me(&self, bearer: Option<&str>) -> ApiResponse {
			self.me_calls.fetch_add(1, Ordering::SeqCst);

			if let Some(status) = *self.me_status.lock() {
				return respond(status, json!({ "detail": "Service unavailable." }));
			}
			if bearer.is_none() || bearer.map(ToOwned::to_owned) != self.valid_access() {
				return respond(401, json!({ "detail": INVALID_TOKEN }));
			}

			respond(200, self.me.lock().clone())
		}

		fn resource(&self, path: &str, bearer: Option<&str>) -> ApiResponse {
			self.resource_calls.fetch_add(1, Ordering::SeqCst);

			if self.reject_resources.load(Ordering::SeqCst)
				|| bearer.is_none()
				|| bearer.map(ToOwned::to_owned) != self.valid_access()
			{
				return respond(401, json!({ "detail": INVALID_TOKEN, "code": "token_not_valid" }));
			}
			if path.contains("missing") {
				return respond(404, json!({ "detail": "Not found." }));
			}

			respond(200, json!({ "path": path }))
		}
	}
	impl Default for FakeBackend {
		fn default() -> Self {
			Self::new()
		}
	}
	impl HttpTransport for FakeBackend {
		fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				let path = request.url.path().to_owned();
				let bearer = request.bearer.as_ref().map(|token| token.expose().to_owned());

				self.calls.lock().push(RecordedCall {
					method: request.method,
					path: path.clone(),
					bearer: bearer.clone(),
				});

				let response = if path.ends_with("/auth/login/") {
					self.login(&request)
				} else if path.ends_with("/auth/refresh/") {
					self.refresh(&request).await
				} else if path.ends_with("/users/me/") {
					self.me(bearer.as_deref())
				} else {
					self.resource(&path, bearer.as_deref())
				};

				Ok(response)
			})
		}
	}

	/// Store whose every operation fails, for exercising degraded persistence.
	#[derive(Clone, Copy, Debug, Default)]
	pub struct FailingStore;
	impl SessionStore for FailingStore {
		fn load(&self, _: StoreKey) -> StoreFuture<'_, Option<String>> {
			Box::pin(async { Err(StoreError::Backend { message: "store offline".into() }) })
		}

		fn save(&self, _: StoreKey, _: String) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "store offline".into() }) })
		}

		fn remove(&self, _: StoreKey) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "store offline".into() }) })
		}
	}

	/// Configuration pointing at [`FAKE_BASE_URL`].
	pub fn test_config() -> SessionConfig {
		let base = Url::parse(FAKE_BASE_URL).expect("Fake base URL should parse.");

		SessionConfig::builder(base).build().expect("Fake config should build.")
	}

	/// Session service signed in against `backend`, plus the store backing it.
	pub async fn fake_session(
		backend: &Arc<FakeBackend>,
	) -> (Arc<SessionService<FakeBackend>>, MemoryStore) {
		let store = MemoryStore::default();
		let session = SessionService::<FakeBackend>::new(
			&test_config(),
			Arc::new(store.clone()),
			backend.clone(),
		)
		.expect("Fake session should build.");

		session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect("Fake login should succeed.");

		(Arc::new(session), store)
	}

	/// Client over `backend`, restored from `store`.
	pub async fn fake_client(backend: &Arc<FakeBackend>, store: &MemoryStore) -> Client<FakeBackend> {
		Client::<FakeBackend>::with_transport(test_config(), Arc::new(store.clone()), backend.clone())
			.await
			.expect("Fake client should build.")
	}

	fn body_json(request: &OutboundRequest) -> Value {
		request
			.body
			.as_deref()
			.and_then(|body| serde_json::from_slice(body).ok())
			.unwrap_or(Value::Null)
	}

	fn respond(status: u16, body: Value) -> ApiResponse {
		ApiResponse::new(status, body.to_string())
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
