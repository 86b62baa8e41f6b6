//! Optional observability helpers for session operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_gate.op` with the `op` and
//!   `stage` (call site) fields. Login fills in `user_id` + `role` once the identity is
//!   resolved, and failed operations carry a `failure` class.
//! - Enable `metrics` to increment `session_gate_op_total{op, outcome}` for every
//!   attempt/success/failure, `session_gate_op_failures_total{op, class}` for failures, and
//!   `session_gate_refresh_total{resolution}` once per finished refresh exchange.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, error::Redirect};

/// Session operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Username/password exchange plus identity fetch.
	Login,
	/// Credential teardown.
	Logout,
	/// Refresh token exchange.
	Refresh,
	/// Authenticated request dispatch.
	Dispatch,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Login => "login",
			OpKind::Logout => "logout",
			OpKind::Refresh => "refresh",
			OpKind::Dispatch => "dispatch",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failure classes used as span fields and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureClass {
	/// Login rejected by the backend.
	InvalidCredentials,
	/// No session; the caller belongs on the login screen.
	NotAuthenticated,
	/// Role mismatch decided locally.
	Forbidden,
	/// Access token rejected and not recovered.
	Unauthorized,
	/// Refresh exchange failed.
	RefreshFailed,
	/// Other non-success backend status.
	Status,
	/// Network-level failure.
	Transport,
	/// Timeout or malformed upstream response.
	Transient,
	/// Local configuration problem.
	Config,
	/// Session store failure.
	Storage,
}
impl FailureClass {
	/// Classifies `error`.
	pub fn of(error: &Error) -> Self {
		match error {
			Error::InvalidCredentials { .. } => Self::InvalidCredentials,
			Error::NotAuthenticated => Self::NotAuthenticated,
			Error::Forbidden { .. } => Self::Forbidden,
			Error::Unauthorized { .. } => Self::Unauthorized,
			Error::RefreshFailed { .. } => Self::RefreshFailed,
			Error::Status { .. } => Self::Status,
			Error::Transport(_) => Self::Transport,
			Error::Transient(_) => Self::Transient,
			Error::Config(_) => Self::Config,
			Error::Storage(_) => Self::Storage,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FailureClass::InvalidCredentials => "invalid_credentials",
			FailureClass::NotAuthenticated => "not_authenticated",
			FailureClass::Forbidden => "forbidden",
			FailureClass::Unauthorized => "unauthorized",
			FailureClass::RefreshFailed => "refresh_failed",
			FailureClass::Status => "status",
			FailureClass::Transport => "transport",
			FailureClass::Transient => "transient",
			FailureClass::Config => "config",
			FailureClass::Storage => "storage",
		}
	}

	/// Navigation signal implied by this class of failure.
	pub const fn redirect(self) -> Option<Redirect> {
		match self {
			FailureClass::NotAuthenticated | FailureClass::RefreshFailed => Some(Redirect::Login),
			FailureClass::Forbidden => Some(Redirect::Landing),
			_ => None,
		}
	}
}
impl Display for FailureClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How a finished refresh exchange was resolved for its waiters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshResolution {
	/// Fresh tokens were applied to the session.
	Refreshed,
	/// A logout or re-login replaced the session during the exchange; its result was dropped.
	Superseded,
	/// The exchange failed and the session was signed out.
	SignedOut,
	/// The exchange task was torn down before finishing.
	Abandoned,
}
impl RefreshResolution {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshResolution::Refreshed => "refreshed",
			RefreshResolution::Superseded => "superseded",
			RefreshResolution::SignedOut => "signed_out",
			RefreshResolution::Abandoned => "abandoned",
		}
	}
}
impl Display for RefreshResolution {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an [`OpSpan`] and records attempt/success/failure counters around it.
pub(crate) async fn observe<T, Fut>(kind: OpKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = OpSpan::new(kind, stage);

	record_op_outcome(kind, OpOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_op_outcome(kind, OpOutcome::Success),
		Err(e) => {
			let class = FailureClass::of(e);

			span.record_failure(class);
			record_op_failure(kind, class);
		},
	}

	result
}
