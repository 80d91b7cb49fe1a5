mod tunnel_hub;

pub use tunnel_hub::*;


use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Tunnel session table contract, keyed by peer identity.
///
/// The transport underneath is opaque; this crate only drives session
/// lifecycle and hands out dial targets. All operations must be safe for
/// concurrent invocation from the feed handlers and the disconnect producer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionManager: Send + Sync + 'static {
    /// Establish an outbound reverse tunnel to `address`, keyed by
    /// `identity` and authenticated with `token`.
    /// `SessionError::AlreadyExists` signals the benign duplicate-add race.
    async fn add_session(&self, address: &str, identity: &str, token: &str) -> Result<()>;

    /// Tear down the session for `identity`. Removing an absent session is a
    /// no-op, never an error.
    async fn remove_session(&self, identity: &str) -> Result<()>;

    fn has_session(&self, identity: &str) -> bool;

    /// Connection factory for the proxy front end.
    async fn dial(&self, identity: &str, timeout: Duration) -> Result<TunnelConnection>;
}

/// Dial result: everything the front end needs to route one request through
/// an established session.
#[derive(Debug, Clone)]
pub struct TunnelConnection {
    pub identity: String,
    pub address: String,
    pub connect_timeout: Duration,
}

/// Tunnel endpoint URL peers are dialed on.
pub fn tunnel_url(identity: &str) -> String {
    format!("ws://{}/connect", identity)
}
