//! Credential models: the stored bearer credential, the long-lived refresh credential, and the
//! redacting secret wrapper both rely on.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;
