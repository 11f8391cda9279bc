//! Authentication module
//!
//! Sessions are owned by the external identity provider; this server only
//! verifies the bearer JWT it issues and the admin API key.

mod service;

pub use service::{bearer_token, AuthService, Claims};
