//! Credential resolution: turning a user entry into the HTTP authentication
//! headers a client should send.
//!
//! Which path supplies the headers is decided by [`crate::User::headers`],
//! first match wins: the exec credential plugin, the configured auth
//! provider, the static bearer token, or no authentication at all. All
//! failures here are deliberately lazy. A document with an unusable
//! credential configuration still loads, merges and serializes; only the
//! actual header resolution fails.

use std::collections::HashMap;

use snafu::Snafu;

pub mod exec;
pub mod provider;

pub use exec::{ExecConfig, ExecEnv};
pub use provider::{AuthProviderConfig, ProviderHandler, register_provider};

pub(crate) const AUTHORIZATION: &str = "Authorization";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("exec credential plugin has no command configured"))]
    ExecCommandMissing,

    #[snafu(display("failed to run exec credential plugin {command:?}"))]
    ExecSpawn {
        source: std::io::Error,
        command: String,
    },

    #[snafu(display("exec credential plugin {command:?} failed: {stderr}"))]
    ExecPlugin { command: String, stderr: String },

    #[snafu(display("no handler registered for auth provider {name:?}"))]
    UnknownAuthProvider { name: String },

    /// The catch-all for failures inside externally registered provider
    /// handlers.
    #[snafu(display("auth provider handler failed: {message}"))]
    ProviderHandler { message: String },
}

/// The header mapping carrying a bearer token.
pub(crate) fn bearer_headers(token: &str) -> HashMap<String, String> {
    HashMap::from([(AUTHORIZATION.to_owned(), format!("Bearer {token}"))])
}
