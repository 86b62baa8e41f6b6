//! Backend exchanges owned by the session service: login, logout, and the refresh call.
//!
//! Login runs a fixed sequence: exchange the username/password for a token pair, decode
//! provisional claims from the access token (when the claims policy allows it), then fetch
//! `/users/me/` with the new bearer. The identity record wins over claims on every field;
//! claims only fill gaps. Nothing is committed until every step has succeeded.

// self
use crate::{
	_prelude::*,
	auth::{AccessClaims, Credential, Identity, MeRecord, TokenSecret},
	config::ClaimsPolicy,
	error::TransientError,
	http::{ApiResponse, HttpTransport, OutboundRequest},
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::{SessionEvent, SessionService, SessionSnapshot, SignOutReason},
};

#[derive(Serialize)]
struct LoginBody<'a> {
	username: &'a str,
	password: &'a str,
}

#[derive(Deserialize)]
struct TokenPair {
	access: String,
	refresh: String,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
	refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshPayload {
	access: String,
	#[serde(default)]
	refresh: Option<String>,
}

/// Outcome of a successful refresh exchange.
#[derive(Clone, Debug)]
pub(crate) struct RefreshedTokens {
	/// Refresh token that was sent; the result only applies while the session still holds it.
	pub(crate) used_refresh: TokenSecret,
	/// Newly issued access token.
	pub(crate) access: TokenSecret,
	/// Replacement refresh token, when the backend rotates them.
	pub(crate) rotated_refresh: Option<TokenSecret>,
}

impl<T> SessionService<T>
where
	T: ?Sized + HttpTransport,
{
	/// Exchanges a username/password for a session and returns the resolved identity.
	///
	/// Backend rejections surface as [`Error::InvalidCredentials`] carrying the backend's
	/// `detail` verbatim. Login never retries. On any failure the previous session state is
	/// left exactly as it was.
	pub async fn login(&self, username: &str, password: &str) -> Result<Identity> {
		obs::observe(OpKind::Login, "login", async move {
			let credential = self.exchange_password(username, password).await?;
			let claims = match self.claims {
				ClaimsPolicy::Fallback => AccessClaims::decode(credential.access_token().expose()),
				ClaimsPolicy::Ignore => None,
			};
			let me = self.fetch_me(credential.access_token()).await?;
			let identity = Identity::resolve(&me, claims.as_ref()).ok_or_else(|| {
				TransientError::UnexpectedResponse {
					message: "identity record did not include a user id".into(),
					status: None,
					retry_after: None,
				}
			})?;

			self.commit_login(&credential, &identity).await;
			obs::record_identity(&identity);

			Ok(identity)
		})
		.await
	}

	/// Clears credentials and identity. Idempotent; never fails.
	pub async fn logout(&self) {
		let span = OpSpan::new(OpKind::Logout, "logout");

		obs::record_op_outcome(OpKind::Logout, OpOutcome::Attempt);
		span.instrument(self.sign_out(SignOutReason::UserRequested)).await;
		obs::record_op_outcome(OpKind::Logout, OpOutcome::Success);
	}

	/// Sends `used_refresh` to the refresh endpoint.
	///
	/// Every failure (transport error, rejection, malformed body) maps to
	/// [`Error::RefreshFailed`]; the caller decides whether to end the session.
	pub(crate) async fn exchange_refresh_token(
		&self,
		used_refresh: TokenSecret,
	) -> Result<RefreshedTokens> {
		let request = OutboundRequest::post_json(
			self.endpoints.refresh.clone(),
			&RefreshBody { refresh: used_refresh.expose() },
		)?;
		let response = self
			.transport
			.execute(request)
			.await
			.map_err(|e| Error::RefreshFailed { reason: e.to_string() })?;

		if !response.is_success() {
			return Err(Error::RefreshFailed { reason: failure_detail(&response) });
		}

		let payload = response
			.json::<RefreshPayload>()
			.map_err(|e| Error::RefreshFailed { reason: e.to_string() })?;
		let access = TokenSecret::non_empty(payload.access).ok_or_else(|| Error::RefreshFailed {
			reason: "refresh response did not include an access token".into(),
		})?;

		Ok(RefreshedTokens {
			used_refresh,
			access,
			rotated_refresh: payload.refresh.and_then(TokenSecret::non_empty),
		})
	}

	async fn exchange_password(&self, username: &str, password: &str) -> Result<Credential> {
		let request = OutboundRequest::post_json(
			self.endpoints.login.clone(),
			&LoginBody { username, password },
		)?;
		let response = self.transport.execute(request).await?;

		if (400..500).contains(&response.status) {
			return Err(Error::InvalidCredentials { detail: failure_detail(&response) });
		}
		if !response.is_success() {
			return Err(unexpected(&response, failure_detail(&response)));
		}

		let pair = response.json::<TokenPair>()?;

		Credential::new(pair.access, pair.refresh).map_err(|e| unexpected(&response, e.to_string()))
	}

	async fn fetch_me(&self, access_token: &TokenSecret) -> Result<MeRecord> {
		let request =
			OutboundRequest::get(self.endpoints.me.clone()).with_bearer(Some(access_token.clone()));
		let response = self.transport.execute(request).await?.error_for_status()?;

		response.json()
	}

	async fn commit_login(&self, credential: &Credential, identity: &Identity) {
		let _mutation = self.mutation.lock().await;
		let next = SessionSnapshot::signed_in(credential, identity);

		if let Err(e) = self.persist(&next).await {
			#[cfg(feature = "tracing")]
			tracing::warn!(error = %e, "failed to persist login; session kept in memory");
			#[cfg(not(feature = "tracing"))]
			let _ = e;
		}

		let previous = std::mem::replace(&mut *self.state.write(), Arc::new(next));

		self.events.publish(SessionEvent::SignedIn { user_id: identity.user_id, role: identity.role });

		if previous.display_name.as_deref() != Some(identity.display_name.as_str()) {
			self.events.publish(SessionEvent::DisplayNameChanged {
				display_name: identity.display_name.clone(),
			});
		}
	}
}

fn failure_detail(response: &ApiResponse) -> String {
	response.detail().unwrap_or_else(|| format!("HTTP {}", response.status))
}

fn unexpected(response: &ApiResponse, message: String) -> Error {
	TransientError::UnexpectedResponse {
		message,
		status: Some(response.status),
		retry_after: response.retry_after,
	}
	.into()
}
