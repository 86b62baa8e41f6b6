//! Session service: the single owner of credentials, identity, and their persistence.
//!
//! [`SessionService`] keeps the current [`SessionSnapshot`] behind an `Arc` swap so route
//! guards and display code read a consistent view without coordinating with writers.
//! Every mutation (login, logout, token refresh, profile edit) is serialized by an async
//! mutation guard, written through to the [`SessionStore`], and published on the event bus
//! when it changes something other screens display.

mod events;
mod exchange;
mod snapshot;

pub use events::*;
pub use snapshot::*;

pub(crate) use exchange::RefreshedTokens;

// crates.io
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	auth::{Identity, Role, TokenSecret},
	config::{ClaimsPolicy, Endpoints, SessionConfig},
	error::ConfigError,
	http::HttpTransport,
	store::{SessionStore, StoreError, StoreKey},
};

/// Owns the session and every write to it.
pub struct SessionService<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	store: Arc<dyn SessionStore>,
	endpoints: Endpoints,
	claims: ClaimsPolicy,
	state: RwLock<Arc<SessionSnapshot>>,
	mutation: AsyncMutex<()>,
	events: EventBus,
}
impl<T> SessionService<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an anonymous session without reading the store.
	pub fn new(
		config: &SessionConfig,
		store: Arc<dyn SessionStore>,
		transport: Arc<T>,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			transport,
			store,
			endpoints: config.endpoints()?,
			claims: config.claims,
			state: RwLock::new(Arc::new(SessionSnapshot::default())),
			mutation: AsyncMutex::new(()),
			events: EventBus::new(config.event_capacity),
		})
	}

	/// Creates a session service and rebuilds the snapshot from the store.
	///
	/// Each key is loaded independently. A key that cannot be read is treated as absent,
	/// so a damaged store yields an anonymous (or partially restored) session, never an error.
	pub async fn restore(
		config: &SessionConfig,
		store: Arc<dyn SessionStore>,
		transport: Arc<T>,
	) -> Result<Self, ConfigError> {
		let service = Self::new(config, store, transport)?;
		let mut entries = HashMap::new();

		for key in StoreKey::ALL {
			match service.store.load(key).await {
				Ok(Some(value)) => {
					entries.insert(key, value);
				},
				Ok(None) => {},
				Err(e) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(key = key.as_str(), error = %e, "ignoring unreadable session key");
					#[cfg(not(feature = "tracing"))]
					let _ = e;
				},
			}
		}

		*service.state.write() = Arc::new(SessionSnapshot::from_entries(&entries));

		Ok(service)
	}

	/// Current immutable snapshot.
	pub fn snapshot(&self) -> Arc<SessionSnapshot> {
		self.state.read().clone()
	}

	/// True iff a non-empty access token is present.
	pub fn is_authenticated(&self) -> bool {
		self.snapshot().is_authenticated()
	}

	/// Stored role, defaulting to [`Role::Trainee`] when unset or unrecognized.
	pub fn current_role(&self) -> Role {
		self.snapshot().current_role()
	}

	/// Cached identity, when known.
	pub fn identity(&self) -> Option<Identity> {
		self.snapshot().identity()
	}

	/// Current access token, when present.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.snapshot().access_token.clone()
	}

	/// Resolved backend endpoints.
	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	/// Shared transport.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Subscribes to [`SessionEvent`]s published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.events.subscribe()
	}

	/// Replaces only the access token, leaving the refresh token and identity untouched.
	///
	/// Empty tokens and anonymous sessions are ignored.
	pub async fn update_access_token(&self, token: TokenSecret) {
		if token.is_empty() {
			return;
		}

		let _mutation = self.mutation.lock().await;
		let current = self.snapshot();

		if current.refresh_token.is_none() && !current.is_authenticated() {
			return;
		}

		let next = SessionSnapshot { access_token: Some(token), ..(*current).clone() };

		self.swap_resilient(next).await;
	}

	/// Records a profile edit of the display name and notifies subscribers.
	pub async fn update_display_name(&self, display_name: impl Into<String>) {
		let display_name = display_name.into().trim().to_owned();

		if display_name.is_empty() {
			return;
		}

		let _mutation = self.mutation.lock().await;
		let current = self.snapshot();

		if !current.is_authenticated() {
			return;
		}

		let next = SessionSnapshot { display_name: Some(display_name), ..(*current).clone() };

		self.swap_resilient(next).await;
	}

	/// Applies a refresh result only if the session still holds the refresh token the
	/// exchange used. Returns `false` when the session changed in the meantime.
	pub(crate) async fn apply_refreshed(&self, tokens: &RefreshedTokens) -> bool {
		let _mutation = self.mutation.lock().await;
		let current = self.snapshot();

		if current.refresh_token.as_ref() != Some(&tokens.used_refresh) {
			return false;
		}

		let next = SessionSnapshot {
			access_token: Some(tokens.access.clone()),
			refresh_token: Some(tokens.rotated_refresh.clone().unwrap_or_else(|| tokens.used_refresh.clone())),
			..(*current).clone()
		};

		self.swap_resilient(next).await;

		true
	}

	/// Clears credentials and identity. Safe to call when already anonymous.
	pub(crate) async fn sign_out(&self, reason: SignOutReason) {
		let _mutation = self.mutation.lock().await;

		self.clear(reason).await;
	}

	/// Signs out only while the session still holds `refresh`. Returns `false`, leaving the
	/// session untouched, when a logout or re-login replaced it in the meantime.
	pub(crate) async fn sign_out_holding(&self, refresh: &TokenSecret, reason: SignOutReason) -> bool {
		let _mutation = self.mutation.lock().await;

		if self.snapshot().refresh_token.as_ref() != Some(refresh) {
			return false;
		}

		self.clear(reason).await;

		true
	}

	async fn clear(&self, reason: SignOutReason) {
		let previous = std::mem::take(&mut *self.state.write());

		for key in StoreKey::ALL {
			if let Err(e) = self.store.remove(key).await {
				#[cfg(feature = "tracing")]
				tracing::warn!(key = key.as_str(), error = %e, "failed to clear session key");
				#[cfg(not(feature = "tracing"))]
				let _ = e;
			}
		}

		if !previous.is_empty() {
			#[cfg(feature = "tracing")]
			tracing::debug!(?reason, "session signed out");

			self.events.publish(SessionEvent::SignedOut { reason });
		}
	}

	/// Persists `next` and swaps it in. Store failures are logged; the in-memory session
	/// stays authoritative for the rest of the process lifetime.
	async fn swap_resilient(&self, next: SessionSnapshot) {
		if let Err(e) = self.persist(&next).await {
			#[cfg(feature = "tracing")]
			tracing::warn!(error = %e, "failed to persist session update");
			#[cfg(not(feature = "tracing"))]
			let _ = e;
		}

		self.swap(next);
	}

	/// Swaps in `next` and publishes the changes other screens care about.
	fn swap(&self, next: SessionSnapshot) -> Arc<SessionSnapshot> {
		let next = Arc::new(next);
		let previous = std::mem::replace(&mut *self.state.write(), next.clone());

		if next.display_name != previous.display_name {
			if let Some(display_name) = next.display_name.clone() {
				self.events.publish(SessionEvent::DisplayNameChanged { display_name });
			}
		}

		previous
	}

	async fn persist(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
		for (key, value) in snapshot.entries() {
			match value {
				Some(value) => self.store.save(key, value).await?,
				None => self.store.remove(key).await?,
			}
		}

		Ok(())
	}
}
impl<T> Debug for SessionService<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionService")
			.field("endpoints", &self.endpoints)
			.field("claims", &self.claims)
			.field("snapshot", &self.snapshot())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{_preludet::*, auth::UserId};

	fn anonymous(backend: &Arc<FakeBackend>, store: Arc<dyn SessionStore>) -> SessionService<FakeBackend> {
		SessionService::new(&test_config(), store, backend.clone()).expect("Session should build.")
	}

	#[tokio::test]
	async fn login_publishes_and_persists_identity() {
		let backend = Arc::new(FakeBackend::new());
		let store = MemoryStore::default();
		let session = anonymous(&backend, Arc::new(store.clone()));
		let mut events = session.subscribe();
		let identity =
			session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect("Login should succeed.");

		assert_eq!(identity, Identity {
			user_id: UserId(7),
			role: Role::Trainer,
			display_name: FAKE_USERNAME.into()
		});
		assert_eq!(session.current_role(), Role::Trainer);
		assert_eq!(session.snapshot().state(), SessionState::Authenticated);
		assert_eq!(
			events.recv().await.expect("Sign-in should be published."),
			SessionEvent::SignedIn { user_id: UserId(7), role: Role::Trainer }
		);
		assert_eq!(
			events.recv().await.expect("Display name should be published."),
			SessionEvent::DisplayNameChanged { display_name: FAKE_USERNAME.into() }
		);

		let entries = store.entries();

		assert_eq!(entries.get(&StoreKey::AccessToken), backend.valid_access().as_ref());
		assert_eq!(entries.get(&StoreKey::RefreshToken), backend.valid_refresh().as_ref());
		assert_eq!(entries.get(&StoreKey::UserId).map(String::as_str), Some("7"));
		assert_eq!(entries.get(&StoreKey::DisplayName).map(String::as_str), Some(FAKE_USERNAME));
	}

	#[tokio::test]
	async fn rejected_login_surfaces_backend_detail() {
		let backend = Arc::new(FakeBackend::new());
		let store = MemoryStore::default();
		let session = anonymous(&backend, Arc::new(store.clone()));
		let err = session.login(FAKE_USERNAME, "wrong").await.expect_err("Login should fail.");

		match err {
			Error::InvalidCredentials { detail } =>
				assert_eq!(detail, "No active account found with the given credentials"),
			other => panic!("Unexpected error: {other:?}"),
		}

		assert!(!session.is_authenticated());
		assert!(store.is_empty());
		assert_eq!(backend.login_calls(), 1);
		assert_eq!(backend.me_calls(), 0);
	}

	#[tokio::test]
	async fn failed_identity_fetch_commits_nothing() {
		let backend = Arc::new(FakeBackend::new());
		let (session, store) = fake_session(&backend).await;
		let before = session.snapshot();
		let entries_before = store.entries();

		backend.fail_me(503);

		let err = session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect_err("Login should fail.");

		assert!(matches!(err, Error::Status { status: 503, .. }));
		assert_eq!(session.snapshot(), before);
		assert_eq!(store.entries(), entries_before);
	}

	#[tokio::test]
	async fn identity_record_wins_over_claims() {
		let backend = Arc::new(FakeBackend::new());
		let session = anonymous(&backend, Arc::new(MemoryStore::default()));

		backend.set_access_claims(json!({ "role": "admin", "user_id": 99, "username": "root" }));

		let identity =
			session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect("Login should succeed.");

		assert_eq!(identity.role, Role::Trainer);
		assert_eq!(identity.user_id, UserId(7));
		assert_eq!(identity.display_name, FAKE_USERNAME);
	}

	#[tokio::test]
	async fn claims_fill_gaps_only_when_allowed() {
		let backend = Arc::new(FakeBackend::new());

		backend.set_me(json!({ "id": 9 }));
		backend.set_access_claims(json!({ "role": "Admin", "user_id": "9", "username": "grace" }));

		let session = anonymous(&backend, Arc::new(MemoryStore::default()));
		let identity =
			session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect("Login should succeed.");

		assert_eq!(identity.role, Role::Admin);
		assert_eq!(identity.display_name, "grace");

		let config = SessionConfig::builder(test_config().base_url)
			.claims_policy(ClaimsPolicy::Ignore)
			.build()
			.expect("Config should build.");
		let session = SessionService::new(&config, Arc::new(MemoryStore::default()), backend.clone())
			.expect("Session should build.");
		let identity =
			session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect("Login should succeed.");

		assert_eq!(identity.role, Role::Trainee);
		assert_eq!(identity.display_name, "User");
	}

	#[tokio::test]
	async fn claims_user_id_covers_a_record_without_id() {
		let backend = Arc::new(FakeBackend::new());

		backend.set_me(json!({ "role": "Trainer", "username": "ada" }));
		backend.set_access_claims(json!({ "user_id": "12" }));

		let session = anonymous(&backend, Arc::new(MemoryStore::default()));
		let identity =
			session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect("Login should succeed.");

		assert_eq!(identity.user_id, UserId(12));

		let config = SessionConfig::builder(test_config().base_url)
			.claims_policy(ClaimsPolicy::Ignore)
			.build()
			.expect("Config should build.");
		let store = MemoryStore::default();
		let session = SessionService::new(&config, Arc::new(store.clone()), backend.clone())
			.expect("Session should build.");
		let err = session
			.login(FAKE_USERNAME, FAKE_PASSWORD)
			.await
			.expect_err("Login without any user id should fail.");

		assert!(matches!(err, Error::Transient(_)));
		assert!(!session.is_authenticated());
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn display_name_edits_are_published() {
		let backend = Arc::new(FakeBackend::new());
		let store = MemoryStore::default();
		let session = anonymous(&backend, Arc::new(store.clone()));

		session.update_display_name("Nobody").await;

		assert!(store.is_empty());

		session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect("Login should succeed.");

		let mut events = session.subscribe();

		session.update_display_name("  Ada Lovelace ").await;
		session.update_display_name("Ada Lovelace").await;

		assert_eq!(
			events.recv().await.expect("Display name should be published."),
			SessionEvent::DisplayNameChanged { display_name: "Ada Lovelace".into() }
		);
		assert!(events.try_recv().is_err());
		assert_eq!(
			store.entries().get(&StoreKey::DisplayName).map(String::as_str),
			Some("Ada Lovelace")
		);
		assert_eq!(session.identity().map(|identity| identity.display_name), Some("Ada Lovelace".into()));
	}

	#[tokio::test]
	async fn access_token_updates_leave_the_rest_untouched() {
		let backend = Arc::new(FakeBackend::new());
		let (session, store) = fake_session(&backend).await;
		let before = session.snapshot();

		session.update_access_token(TokenSecret::new("")).await;

		assert_eq!(session.snapshot(), before);

		session.update_access_token(TokenSecret::new("rotated")).await;

		let after = session.snapshot();

		assert_eq!(after.access_token, TokenSecret::non_empty("rotated"));
		assert_eq!(after.refresh_token, before.refresh_token);
		assert_eq!(after.identity(), before.identity());
		assert_eq!(store.entries().get(&StoreKey::AccessToken).map(String::as_str), Some("rotated"));
	}

	#[tokio::test]
	async fn conditional_sign_out_spares_a_replaced_session() {
		let backend = Arc::new(FakeBackend::new());
		let (session, store) = fake_session(&backend).await;
		let old_refresh =
			session.snapshot().refresh_token.clone().expect("Session should hold a refresh token.");

		session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect("Re-login should succeed.");

		let mut events = session.subscribe();

		assert!(!session.sign_out_holding(&old_refresh, SignOutReason::RefreshFailed).await);
		assert!(session.is_authenticated());
		assert!(!store.is_empty());
		assert!(events.try_recv().is_err());

		let current =
			session.snapshot().refresh_token.clone().expect("Session should hold a refresh token.");

		assert!(session.sign_out_holding(&current, SignOutReason::RefreshFailed).await);
		assert!(!session.is_authenticated());
		assert!(store.is_empty());
		assert_eq!(
			events.recv().await.expect("Sign-out should be published."),
			SessionEvent::SignedOut { reason: SignOutReason::RefreshFailed }
		);
	}

	#[tokio::test]
	async fn unavailable_store_degrades_to_memory_only() {
		let backend = Arc::new(FakeBackend::new());
		let session = SessionService::restore(&test_config(), Arc::new(FailingStore), backend.clone())
			.await
			.expect("Restore should not fail on store errors.");

		assert!(!session.is_authenticated());
		assert_eq!(session.current_role(), Role::Trainee);

		session.login(FAKE_USERNAME, FAKE_PASSWORD).await.expect("Login should succeed.");

		assert!(session.is_authenticated());

		session.logout().await;
		session.logout().await;

		assert!(!session.is_authenticated());
	}

	#[tokio::test]
	async fn restore_degrades_corrupted_values() {
		let backend = Arc::new(FakeBackend::new());
		let store = MemoryStore::default();

		store.save(StoreKey::AccessToken, "access".into()).await.expect("Save should succeed.");
		store.save(StoreKey::Role, "owner".into()).await.expect("Save should succeed.");

		let session = SessionService::restore(&test_config(), Arc::new(store), backend.clone())
			.await
			.expect("Restore should succeed.");

		assert!(session.is_authenticated());
		assert_eq!(session.current_role(), Role::Trainee);
		assert!(session.identity().is_none());
	}
}
