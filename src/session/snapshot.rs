//! Immutable session snapshots handed to readers.

// self
use crate::{
	_prelude::*,
	auth::{Credential, FALLBACK_DISPLAY_NAME, Identity, Role, TokenSecret, UserId},
	store::StoreKey,
};

/// Lifecycle flag derived from the stored access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
	/// A non-empty access token is present.
	Authenticated,
	/// No usable access token is present.
	Anonymous,
}

/// Point-in-time view of the session; readers never observe partial updates.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
	/// Bearer secret attached to authenticated requests.
	pub access_token: Option<TokenSecret>,
	/// Secret used for the refresh exchange.
	pub refresh_token: Option<TokenSecret>,
	/// Backend user identifier.
	pub user_id: Option<UserId>,
	/// Stored role, if recognized.
	pub role: Option<Role>,
	/// Name shown by surrounding screens.
	pub display_name: Option<String>,
}
impl SessionSnapshot {
	/// Snapshot for a freshly completed login.
	pub fn signed_in(credential: &Credential, identity: &Identity) -> Self {
		Self {
			access_token: Some(credential.access_token().clone()),
			refresh_token: Some(credential.refresh_token().clone()),
			user_id: Some(identity.user_id),
			role: Some(identity.role),
			display_name: Some(identity.display_name.clone()),
		}
	}

	/// Rebuilds a snapshot from raw persisted values, dropping anything unusable.
	pub fn from_entries(entries: &HashMap<StoreKey, String>) -> Self {
		let value = |key: StoreKey| entries.get(&key).map(String::as_str);

		Self {
			access_token: value(StoreKey::AccessToken).and_then(TokenSecret::non_empty),
			refresh_token: value(StoreKey::RefreshToken).and_then(TokenSecret::non_empty),
			user_id: value(StoreKey::UserId).and_then(|raw| raw.parse().ok()),
			role: value(StoreKey::Role).and_then(Role::parse_lenient),
			display_name: value(StoreKey::DisplayName)
				.map(str::trim)
				.filter(|name| !name.is_empty())
				.map(ToOwned::to_owned),
		}
	}

	/// Raw values to persist; `None` means the key must be removed.
	pub fn entries(&self) -> [(StoreKey, Option<String>); 5] {
		[
			(StoreKey::AccessToken, self.access_token.as_ref().map(|t| t.expose().to_owned())),
			(StoreKey::RefreshToken, self.refresh_token.as_ref().map(|t| t.expose().to_owned())),
			(StoreKey::UserId, self.user_id.map(|id| id.to_string())),
			(StoreKey::Role, self.role.map(String::from)),
			(StoreKey::DisplayName, self.display_name.clone()),
		]
	}

	/// Lifecycle flag.
	pub fn state(&self) -> SessionState {
		if self.is_authenticated() { SessionState::Authenticated } else { SessionState::Anonymous }
	}

	/// True iff a non-empty access token is present.
	pub fn is_authenticated(&self) -> bool {
		self.access_token.as_ref().is_some_and(|token| !token.is_empty())
	}

	/// Stored role, defaulting to the least-privileged role when unset or unrecognized.
	pub fn current_role(&self) -> Role {
		self.role.unwrap_or_default()
	}

	/// Both tokens, when present.
	pub fn credential(&self) -> Option<Credential> {
		let access = self.access_token.as_ref()?;
		let refresh = self.refresh_token.as_ref()?;

		Credential::new(access.expose(), refresh.expose()).ok()
	}

	/// Cached identity, when a user identifier is known.
	pub fn identity(&self) -> Option<Identity> {
		Some(Identity {
			user_id: self.user_id?,
			role: self.current_role(),
			display_name: self
				.display_name
				.clone()
				.unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_owned()),
		})
	}

	/// Returns true if nothing at all is held.
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}
}
impl Debug for SessionSnapshot {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionSnapshot")
			.field("state", &self.state())
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("user_id", &self.user_id)
			.field("role", &self.role)
			.field("display_name", &self.display_name)
			.finish()
	}
}
