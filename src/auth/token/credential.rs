//! Access/refresh token pair issued by the login exchange.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Errors produced when assembling a [`Credential`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialError {
	/// Issued when the access token is empty.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the refresh token is empty.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
}

/// Access + refresh token pair. Both secrets are guaranteed non-empty.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	access_token: TokenSecret,
	refresh_token: TokenSecret,
}
impl Credential {
	/// Validates and wraps a token pair.
	pub fn new(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Result<Self, CredentialError> {
		let access_token =
			TokenSecret::non_empty(access_token).ok_or(CredentialError::MissingAccessToken)?;
		let refresh_token =
			TokenSecret::non_empty(refresh_token).ok_or(CredentialError::MissingRefreshToken)?;

		Ok(Self { access_token, refresh_token })
	}

	/// Short-lived bearer secret.
	pub fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}

	/// Long-lived secret used only for the refresh exchange.
	pub fn refresh_token(&self) -> &TokenSecret {
		&self.refresh_token
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.finish()
	}
}
