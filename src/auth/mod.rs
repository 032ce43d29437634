//! Authentication module
//!
//! Credentials for the HTTP client: no auth, a static bearer token, or the
//! OAuth2 client-credentials flow used by the inventory API.
//!
//! The `Authenticator` caches issued tokens and can be told to drop its
//! cached token so the next request forces a refresh.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, CachedToken};
