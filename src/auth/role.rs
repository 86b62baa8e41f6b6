//! Role modeling helpers used by the authorization decision and the session snapshot.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Errors emitted when parsing roles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum RoleError {
	/// Empty role strings are not allowed.
	#[error("Role cannot be empty.")]
	Empty,
	/// The role is not one of the recognized permission classes.
	#[error("Role `{value}` is not recognized.")]
	Unknown {
		/// The offending role string.
		value: String,
	},
}

/// Coarse permission class attached to a session.
///
/// Variants are ordered from most to least privileged. Parsing is case-insensitive
/// and surrounding whitespace is ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
	/// Full administrative access.
	Admin,
	/// Trainer access.
	Trainer,
	/// Least-privileged role; the fail-safe default.
	#[default]
	Trainee,
}
impl Role {
	/// All recognized roles.
	pub const ALL: [Role; 3] = [Role::Admin, Role::Trainer, Role::Trainee];

	/// Returns the normalized (lower-case) label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::Admin => "admin",
			Role::Trainer => "trainer",
			Role::Trainee => "trainee",
		}
	}

	/// Parses a role, returning `None` for empty or unrecognized values.
	pub fn parse_lenient(value: &str) -> Option<Self> {
		value.parse().ok()
	}
}
impl Display for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Role {
	type Err = RoleError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let view = s.trim();

		if view.is_empty() {
			return Err(RoleError::Empty);
		}

		Self::ALL
			.into_iter()
			.find(|role| role.as_str().eq_ignore_ascii_case(view))
			.ok_or_else(|| RoleError::Unknown { value: view.to_owned() })
	}
}
impl TryFrom<String> for Role {
	type Error = RoleError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<Role> for String {
	fn from(value: Role) -> Self {
		value.as_str().to_owned()
	}
}

/// Normalized set of roles an operation declares as required.
///
/// An empty set means the operation is open to any authenticated role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<Role>);
impl RoleSet {
	/// Creates a normalized role set from any iterator of role strings.
	pub fn new<I, S>(roles: I) -> Result<Self, RoleError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		roles.into_iter().map(|role| role.as_ref().parse()).collect::<Result<_, _>>().map(Self)
	}

	/// Set that admits any authenticated role.
	pub fn authenticated() -> Self {
		Self::default()
	}

	/// Number of distinct roles.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no roles are declared.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the set contains the provided role.
	pub fn contains(&self, role: Role) -> bool {
		self.0.contains(&role)
	}

	/// Iterator over roles, most privileged first.
	pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
		self.0.iter().copied()
	}
}
impl FromIterator<Role> for RoleSet {
	fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}
impl<const N: usize> From<[Role; N]> for RoleSet {
	fn from(value: [Role; N]) -> Self {
		value.into_iter().collect()
	}
}
impl Display for RoleSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		if self.is_empty() {
			return f.write_str("[any]");
		}

		f.write_str("[")?;

		for (idx, role) in self.iter().enumerate() {
			if idx > 0 {
				f.write_str(", ")?;
			}

			f.write_str(role.as_str())?;
		}

		f.write_str("]")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parsing_is_case_insensitive() {
		assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
		assert_eq!(" TRAINER ".parse::<Role>(), Ok(Role::Trainer));
		assert_eq!("".parse::<Role>(), Err(RoleError::Empty));
		assert!(matches!("superuser".parse::<Role>(), Err(RoleError::Unknown { .. })));
		assert_eq!(Role::parse_lenient("coach"), None);
		assert_eq!(Role::default(), Role::Trainee);
	}

	#[test]
	fn role_set_normalizes_and_deduplicates() {
		let set = RoleSet::new(["Admin", "admin", "TRAINER"]).expect("Role set should parse.");

		assert_eq!(set.len(), 2);
		assert!(set.contains(Role::Admin));
		assert!(set.contains(Role::Trainer));
		assert!(!set.contains(Role::Trainee));
		assert_eq!(set.to_string(), "[admin, trainer]");
		assert_eq!(RoleSet::authenticated().to_string(), "[any]");
		assert!(RoleSet::new(["admin", "root"]).is_err());
	}

	#[test]
	fn serde_uses_lower_case_labels() {
		let payload = serde_json::to_string(&Role::Trainer).expect("Role should serialize.");

		assert_eq!(payload, "\"trainer\"");

		let role: Role = serde_json::from_str("\"ADMIN\"").expect("Role should deserialize.");

		assert_eq!(role, Role::Admin);
		assert!(serde_json::from_str::<Role>("\"owner\"").is_err());
	}
}
