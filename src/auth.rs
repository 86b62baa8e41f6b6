//! Auth-domain roles, identities, token secrets, and claim helpers.

pub mod claims;
pub mod identity;
pub mod role;
pub mod token;

pub use claims::*;
pub use identity::*;
pub use role::*;
pub use token::{credential::*, secret::*};
