//! Best-effort decoding of claims embedded in a JWT access token.
//!
//! The payload segment is read without verifying the signature. Values decoded here are
//! hints only: [`Identity::resolve`](crate::auth::Identity::resolve) consults them strictly
//! after the `/users/me/` record and only for fields that record leaves empty.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserializer, de::Error as DeError};
// self
use crate::{
	_prelude::*,
	auth::{Role, UserId},
};

/// Claims opportunistically read from an access token payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AccessClaims {
	/// Role claim, as issued.
	#[serde(default)]
	pub role: Option<String>,
	/// Numeric user identifier (`user_id`), accepted as a number or numeric string.
	#[serde(default, deserialize_with = "de_user_id")]
	pub user_id: Option<UserId>,
	/// Login name claim.
	#[serde(default)]
	pub username: Option<String>,
	/// Email claim.
	#[serde(default)]
	pub email: Option<String>,
	/// Expiry as Unix seconds.
	#[serde(default)]
	pub exp: Option<i64>,
}
impl AccessClaims {
	/// Decodes the payload segment of `token`, returning `None` when it is not a JWT.
	pub fn decode(token: &str) -> Option<Self> {
		let mut segments = token.split('.');
		let (_header, payload) = (segments.next()?, segments.next()?);
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;

		serde_json::from_slice(&bytes).ok()
	}

	/// Role claim, when present and recognized.
	pub fn role(&self) -> Option<Role> {
		self.role.as_deref().and_then(Role::parse_lenient)
	}

	/// Expiry instant, when the token carries a valid `exp`.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.exp.and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
	}
}

fn de_user_id<'de, D>(deserializer: D) -> Result<Option<UserId>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<serde_json::Value>::deserialize(deserializer)? {
		None | Some(serde_json::Value::Null) => Ok(None),
		Some(serde_json::Value::Number(n)) =>
			n.as_u64().map(|id| Some(UserId(id))).ok_or_else(|| DeError::custom("invalid user_id")),
		Some(serde_json::Value::String(s)) =>
			s.trim().parse().map(|id| Some(UserId(id))).map_err(DeError::custom),
		Some(_) => Err(DeError::custom("invalid user_id")),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn jwt(payload: &str) -> String {
		format!("eyJhbGciOiJIUzI1NiJ9.{}.signature", URL_SAFE_NO_PAD.encode(payload))
	}

	#[test]
	fn decodes_role_and_numeric_string_user_id() {
		let claims = AccessClaims::decode(&jwt(
			r#"{"role":"Trainer","user_id":"42","username":"sam","exp":1735693200}"#,
		))
		.expect("Claims should decode.");

		assert_eq!(claims.role(), Some(Role::Trainer));
		assert_eq!(claims.user_id, Some(UserId(42)));
		assert_eq!(claims.username.as_deref(), Some("sam"));
		assert_eq!(claims.expires_at(), Some(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn numeric_user_id_and_missing_fields() {
		let claims =
			AccessClaims::decode(&jwt(r#"{"user_id":7}"#)).expect("Claims should decode.");

		assert_eq!(claims.user_id, Some(UserId(7)));
		assert_eq!(claims.role(), None);
	}

	#[test]
	fn opaque_tokens_yield_nothing() {
		assert!(AccessClaims::decode("opaque-token").is_none());
		assert!(AccessClaims::decode("a.!!!.c").is_none());
		assert!(AccessClaims::decode(&jwt("not json")).is_none());
	}
}
