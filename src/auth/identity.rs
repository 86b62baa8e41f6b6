//! Identity records and the resolution order used after login.

// self
use crate::{
	_prelude::*,
	auth::{AccessClaims, Role},
};

/// Display name used when neither the backend nor the token supplies one.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Numeric user identifier assigned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl FromStr for UserId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.trim().parse().map(Self)
	}
}

/// Caller's own record as returned by `GET /users/me/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeRecord {
	/// Backend identifier; the token's `user_id` claim stands in when it is missing.
	#[serde(default)]
	pub id: Option<UserId>,
	/// Role label; may be missing or unrecognized.
	#[serde(default)]
	pub role: Option<String>,
	/// Login name.
	#[serde(default)]
	pub username: Option<String>,
	/// Email address.
	#[serde(default)]
	pub email: Option<String>,
}

/// Identity cached for the lifetime of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	/// Backend identifier.
	pub user_id: UserId,
	/// Normalized role.
	pub role: Role,
	/// Name shown by surrounding screens.
	pub display_name: String,
}
impl Identity {
	/// Merges the authoritative `/users/me/` record with optional token claims.
	///
	/// Every field is taken from `me` first. Claims only fill fields `me` leaves empty,
	/// and the role falls back to [`Role::Trainee`] when neither source names a known role.
	/// Returns `None` when neither source carries a user id.
	pub fn resolve(me: &MeRecord, claims: Option<&AccessClaims>) -> Option<Self> {
		let user_id = me.id.or_else(|| claims.and_then(|c| c.user_id))?;
		let role = me
			.role
			.as_deref()
			.and_then(Role::parse_lenient)
			.or_else(|| claims.and_then(AccessClaims::role))
			.unwrap_or_default();
		let display_name = non_blank(me.username.as_deref())
			.or_else(|| non_blank(me.email.as_deref()))
			.or_else(|| claims.and_then(|c| non_blank(c.username.as_deref())))
			.unwrap_or(FALLBACK_DISPLAY_NAME)
			.to_owned();

		Some(Self { user_id, role, display_name })
	}
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|v| !v.is_empty())
}
