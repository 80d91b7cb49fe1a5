//! Error hierarchy for the peermesh control plane.
//!
//! Failures are grouped by collaborator: the registry store, the tunnel
//! session layer, and local system concerns. `NotFound`, `Conflict` and
//! `AlreadyExists` are ordinary control-flow signals on the reconciliation
//! paths and must never crash the process; only unrecoverable startup
//! configuration failures are fatal.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (io, channels, background tasks)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading / validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry store signals and failures
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Tunnel session layer signals
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// NotFound selects the "must create" / "nothing to delete" branch on
    /// every reconciliation path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Registry(RegistryError::NotFound { .. }))
    }

    /// Stale version token; the caller should re-fetch and retry the write.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Registry(RegistryError::Conflict { .. }))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Error::Registry(RegistryError::AlreadyExists { .. }) | Error::Session(SessionError::AlreadyExists(_))
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Record does not exist
    #[error("record {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// Create lost the race against another writer
    #[error("record {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    /// Optimistic write carried a stale version token
    #[error("version conflict on {namespace}/{name}: wrote with {expected}, store holds {stored}")]
    Conflict {
        namespace: String,
        name: String,
        expected: u64,
        stored: u64,
    },

    /// Write kept conflicting until the retry budget ran out
    #[error("write to {namespace}/{name} failed after {retries} retries")]
    RetryExhausted {
        namespace: String,
        name: String,
        retries: usize,
    },

    /// The store backend or its change feed is gone
    #[error("registry backend closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A live session for this identity already exists (benign race)
    #[error("session for peer {0} already exists")]
    AlreadyExists(String),

    /// Dial target has no established session
    #[error("no session established for peer {0}")]
    NotConnected(String),

    /// Session did not become dialable in time
    #[error("dial to peer {identity} timed out after {timeout:?}")]
    DialTimeout { identity: String, timeout: Duration },
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] JoinError),

    /// Receiver side of an internal channel dropped
    #[error("channel closed: {0}")]
    ChannelSend(String),

    /// No non-loopback IPv4 address on this host
    #[error("cannot determine a routable local address: {0}")]
    NoRoutableAddress(String),
}
