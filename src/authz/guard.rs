//! Synchronous route/operation guard evaluated against the cached session snapshot.

// self
use crate::{
	_prelude::*,
	auth::RoleSet,
	authz,
	error::Redirect,
	session::SessionSnapshot,
};

/// Outcome of a guard check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardDecision {
	/// The operation may be attempted.
	Allow,
	/// No session is active.
	RedirectToLogin,
	/// The session's role is not among the declared roles.
	RedirectToLanding,
}
impl GuardDecision {
	/// Returns true for [`GuardDecision::Allow`].
	pub fn is_allowed(self) -> bool {
		matches!(self, Self::Allow)
	}

	/// Navigation signal for denials.
	pub fn redirect(self) -> Option<Redirect> {
		match self {
			Self::Allow => None,
			Self::RedirectToLogin => Some(Redirect::Login),
			Self::RedirectToLanding => Some(Redirect::Landing),
		}
	}

	/// Converts a denial into the matching [`Error`].
	pub fn into_result(self, snapshot: &SessionSnapshot, required: &RoleSet) -> Result<()> {
		match self {
			Self::Allow => Ok(()),
			Self::RedirectToLogin => Err(Error::NotAuthenticated),
			Self::RedirectToLanding =>
				Err(Error::Forbidden { required: required.clone(), current: snapshot.current_role() }),
		}
	}
}

/// Decides whether an operation declaring `required` may be attempted.
///
/// Trusts the locally cached role; no network call is made.
pub fn evaluate(snapshot: &SessionSnapshot, required: &RoleSet) -> GuardDecision {
	if !snapshot.is_authenticated() {
		GuardDecision::RedirectToLogin
	} else if authz::is_allowed(required, snapshot.current_role()) {
		GuardDecision::Allow
	} else {
		GuardDecision::RedirectToLanding
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{Role, TokenSecret};

	fn signed_in(role: Option<Role>) -> SessionSnapshot {
		SessionSnapshot {
			access_token: TokenSecret::non_empty("access"),
			refresh_token: TokenSecret::non_empty("refresh"),
			role,
			..Default::default()
		}
	}

	#[test]
	fn anonymous_sessions_go_to_login() {
		let decision = evaluate(&SessionSnapshot::default(), &RoleSet::authenticated());

		assert_eq!(decision, GuardDecision::RedirectToLogin);
		assert_eq!(decision.redirect(), Some(Redirect::Login));
		assert!(matches!(
			decision.into_result(&SessionSnapshot::default(), &RoleSet::authenticated()),
			Err(Error::NotAuthenticated)
		));
	}

	#[test]
	fn role_mismatch_goes_to_landing() {
		let snapshot = signed_in(Some(Role::Trainer));
		let admin = RoleSet::from([Role::Admin]);
		let decision = evaluate(&snapshot, &admin);

		assert_eq!(decision, GuardDecision::RedirectToLanding);
		assert!(matches!(
			decision.into_result(&snapshot, &admin),
			Err(Error::Forbidden { current: Role::Trainer, .. })
		));
		assert!(evaluate(&snapshot, &RoleSet::from([Role::Admin, Role::Trainer])).is_allowed());
	}

	#[test]
	fn missing_role_falls_back_to_trainee() {
		let snapshot = signed_in(None);

		assert!(evaluate(&snapshot, &RoleSet::from([Role::Trainee])).is_allowed());
		assert!(!evaluate(&snapshot, &RoleSet::from([Role::Trainer])).is_allowed());
		assert!(evaluate(&snapshot, &RoleSet::authenticated()).is_allowed());
	}
}
