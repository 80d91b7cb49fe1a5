//! Concurrent tunnel session table.
//!
//! One live session per peer identity, whichever direction established it:
//! outbound sessions come from the peer reconciler dialing a remote
//! `/connect`, inbound ones from remotes hitting our own accept endpoint.
//! Involuntary disconnects are funneled to the registrar mailbox so the
//! lost peer's record can be flipped to UnAvailable.

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::RegistrarEvent;
use crate::Result;
use crate::SessionError;
use crate::SessionManager;
use crate::TunnelConnection;

/// Direction a session was established from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Outbound,
    Inbound,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    address: String,
    #[allow(unused)]
    token: String,
    #[allow(unused)]
    kind: SessionKind,
    established_at: Instant,
}

pub struct TunnelHub {
    sessions: DashMap<String, SessionEntry>,
    registrar_tx: mpsc::Sender<RegistrarEvent>,
}

impl TunnelHub {
    pub fn new(registrar_tx: mpsc::Sender<RegistrarEvent>) -> Self {
        Self {
            sessions: DashMap::new(),
            registrar_tx,
        }
    }

    fn insert(&self, address: &str, identity: &str, token: &str, kind: SessionKind) -> Result<()> {
        match self.sessions.entry(identity.to_string()) {
            Entry::Occupied(_) => Err(SessionError::AlreadyExists(identity.to_string()).into()),
            Entry::Vacant(slot) => {
                slot.insert(SessionEntry {
                    address: address.to_string(),
                    token: token.to_string(),
                    kind,
                    established_at: Instant::now(),
                });
                info!(identity, address, ?kind, "session established");
                Ok(())
            }
        }
    }

    /// Register an inbound session accepted on the tunnel endpoint.
    pub fn accept(&self, identity: &str, token: &str) -> Result<()> {
        self.insert(identity, identity, token, SessionKind::Inbound)
    }

    /// Involuntary disconnect path: drop the session and notify the
    /// registrar so the peer's record can be marked UnAvailable.
    pub async fn report_disconnect(&self, identity: &str) {
        if self.sessions.remove(identity).is_none() {
            debug!(identity, "disconnect reported for unknown session");
            return;
        }
        info!(identity, "session lost, notifying registrar");
        if let Err(e) = self
            .registrar_tx
            .send(RegistrarEvent::PeerDisconnected(identity.to_string()))
            .await
        {
            warn!(identity, error = %e, "registrar mailbox closed, disconnect dropped");
        }
    }

    pub fn session_age(&self, identity: &str) -> Option<Duration> {
        self.sessions.get(identity).map(|entry| entry.established_at.elapsed())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionManager for TunnelHub {
    async fn add_session(&self, address: &str, identity: &str, token: &str) -> Result<()> {
        self.insert(address, identity, token, SessionKind::Outbound)
    }

    async fn remove_session(&self, identity: &str) -> Result<()> {
        if self.sessions.remove(identity).is_some() {
            info!(identity, "session removed");
        } else {
            debug!(identity, "remove for absent session, nothing to do");
        }
        Ok(())
    }

    fn has_session(&self, identity: &str) -> bool {
        self.sessions.contains_key(identity)
    }

    async fn dial(&self, identity: &str, timeout: Duration) -> Result<TunnelConnection> {
        let entry = self
            .sessions
            .get(identity)
            .ok_or_else(|| SessionError::NotConnected(identity.to_string()))?;
        Ok(TunnelConnection {
            identity: identity.to_string(),
            address: entry.address.clone(),
            connect_timeout: timeout,
        })
    }
}
