//! Authorization decision: pure role checks with no network or storage dependency.

pub mod guard;

pub use guard::*;

// self
use crate::auth::{Role, RoleError, RoleSet};

/// Returns true if `current` may attempt an operation declaring `required`.
///
/// An empty `required` set admits any authenticated role.
pub fn is_allowed(required: &RoleSet, current: Role) -> bool {
	required.is_empty() || required.contains(current)
}

/// String form of [`is_allowed`] for role labels that were never parsed.
///
/// `required` labels must name known roles. An unrecognized `current` label counts as
/// [`Role::Trainee`], the same fallback [`SessionSnapshot::current_role`] applies.
///
/// [`SessionSnapshot::current_role`]: crate::session::SessionSnapshot::current_role
pub fn is_allowed_str<I, S>(required: I, current: &str) -> Result<bool, RoleError>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let required = RoleSet::new(required)?;

	Ok(is_allowed(&required, Role::parse_lenient(current).unwrap_or_default()))
}
