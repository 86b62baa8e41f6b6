//! Token secrets and the login credential pair.

pub mod credential;
pub mod secret;
