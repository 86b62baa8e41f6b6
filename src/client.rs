//! Consumer-facing facade constructed once at process start and passed down explicitly.

// crates.io
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	auth::{Identity, Role, RoleSet},
	authz::{self, GuardDecision},
	config::SessionConfig,
	dispatch::DispatchGate,
	error::ConfigError,
	http::{ApiResponse, HttpTransport, Operation},
	refresh::{RefreshCoordinator, RefreshMetrics},
	session::{SessionEvent, SessionService, SessionSnapshot},
	store::SessionStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestSessionClient = Client<ReqwestTransport>;

/// Session core handle shared by every screen that talks to the backend.
///
/// The client owns the [`SessionService`], a [`RefreshCoordinator`] bound to it, and the
/// [`DispatchGate`] that every authenticated operation flows through. Cloning is cheap and
/// every clone observes the same session.
pub struct Client<T>
where
	T: ?Sized + HttpTransport,
{
	config: Arc<SessionConfig>,
	session: Arc<SessionService<T>>,
	gate: DispatchGate<T>,
}
impl<T> Client<T>
where
	T: ?Sized + HttpTransport,
{
	/// Builds a client over the caller-provided transport and restores any persisted session.
	pub async fn with_transport(
		config: SessionConfig,
		store: Arc<dyn SessionStore>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let session = Arc::new(SessionService::restore(&config, store, transport.into()).await?);
		let coordinator =
			Arc::new(RefreshCoordinator::new(session.clone(), config.refresh_timeout()));
		let gate = DispatchGate::new(session.clone(), coordinator);

		Ok(Self { config: Arc::new(config), session, gate })
	}

	/// Configuration the client was built with.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Underlying session service.
	pub fn session(&self) -> &Arc<SessionService<T>> {
		&self.session
	}

	/// Underlying dispatch gate.
	pub fn gate(&self) -> &DispatchGate<T> {
		&self.gate
	}

	/// Refresh coordinator counters.
	pub fn refresh_metrics(&self) -> Arc<RefreshMetrics> {
		self.gate.coordinator().metrics()
	}

	/// True iff a non-empty access token is present.
	pub fn is_authenticated(&self) -> bool {
		self.session.is_authenticated()
	}

	/// Stored role, defaulting to [`Role::Trainee`].
	pub fn current_role(&self) -> Role {
		self.session.current_role()
	}

	/// Cached identity, when known.
	pub fn identity(&self) -> Option<Identity> {
		self.session.identity()
	}

	/// Current immutable snapshot.
	pub fn snapshot(&self) -> Arc<SessionSnapshot> {
		self.session.snapshot()
	}

	/// Subscribes to session events (sign-in, display name changes, sign-out).
	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.session.subscribe()
	}

	/// See [`SessionService::login`].
	pub async fn login(&self, username: &str, password: &str) -> Result<Identity> {
		self.session.login(username, password).await
	}

	/// See [`SessionService::logout`].
	pub async fn logout(&self) {
		self.session.logout().await;
	}

	/// See [`SessionService::update_display_name`].
	pub async fn update_display_name(&self, display_name: impl Into<String>) {
		self.session.update_display_name(display_name).await;
	}

	/// Evaluates the guard for an operation declaring `required`.
	pub fn guard(&self, required: &RoleSet) -> GuardDecision {
		authz::evaluate(&self.session.snapshot(), required)
	}

	/// Checks the guard, then sends `operation` through the dispatch gate.
	///
	/// Denials fail locally before any network call: [`Error::NotAuthenticated`] without a
	/// session, [`Error::Forbidden`] on a role mismatch. Every backend status is returned as
	/// an [`ApiResponse`].
	pub async fn dispatch(&self, operation: Operation, required: &RoleSet) -> Result<ApiResponse> {
		let snapshot = self.session.snapshot();

		authz::evaluate(&snapshot, required).into_result(&snapshot, required)?;

		let request = operation.resolve(&self.session.endpoints().base)?;

		self.gate.send(request).await
	}

	/// Like [`Client::dispatch`], but maps non-success statuses to errors and decodes the body.
	pub async fn dispatch_json<R>(&self, operation: Operation, required: &RoleSet) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.dispatch(operation, required).await?.error_for_status()?.json()
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
	/// Builds a client with a default reqwest transport and restores any persisted session.
	pub async fn new(config: SessionConfig, store: Arc<dyn SessionStore>) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().build()?;

		Self::with_transport(config, store, ReqwestTransport::with_client(client)).await
	}
}
impl<T> Clone for Client<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { config: self.config.clone(), session: self.session.clone(), gate: self.gate.clone() }
	}
}
impl<T> Debug for Client<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("base_url", &self.config.base_url.as_str())
			.field("session", &self.session)
			.field("gate", &self.gate)
			.finish()
	}
}
