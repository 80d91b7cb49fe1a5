//! Record schemas persisted in the registry.
//!
//! Metadata (namespace, name, version token) is flattened into each record
//! type. The version token is store-owned: it is advanced on every successful
//! write and carried back on reads so optimistic updates can detect stale
//! writers.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Reachability status advertised through the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceStatus {
    Available,
    UnAvailable,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Available => write!(f, "Available"),
            ResourceStatus::UnAvailable => write!(f, "UnAvailable"),
        }
    }
}

/// namespace + name pair identifying one record, printed as "namespace/name".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a "namespace/name" key. Both halves must be non-empty.
    pub fn parse(key: &str) -> Option<Self> {
        let (namespace, name) = key.split_once('/')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Behaviors every registry-managed record shares.
pub trait Resource: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn namespace(&self) -> &str;
    fn name(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);

    fn key(&self) -> ResourceKey {
        ResourceKey::new(self.namespace(), self.name())
    }
}

/// A node's registry entry.
///
/// The record is owned by the node it describes: that node is the only
/// writer, every other node consumes it read-only through the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    #[serde(default)]
    pub namespace: String,

    /// Store key, derived from the identity (see [`PeerRecord::name_for_identity`])
    pub name: String,

    /// Reachable "ip:port" address; doubles as the tunnel session key
    pub identity: String,

    pub status: ResourceStatus,

    /// Opaque credential peers present when establishing a tunnel
    pub token: String,

    /// Free-form host description (OS, arch, cpu count)
    #[serde(default)]
    pub info: String,

    #[serde(skip)]
    pub version: u64,
}

impl PeerRecord {
    pub fn new(
        namespace: impl Into<String>,
        identity: impl Into<String>,
        status: ResourceStatus,
        token: impl Into<String>,
        info: impl Into<String>,
    ) -> Self {
        let identity = identity.into();
        Self {
            namespace: namespace.into(),
            name: Self::name_for_identity(&identity),
            identity,
            status,
            token: token.into(),
            info: info.into(),
            version: 0,
        }
    }

    /// Registry name for an identity: the first ':' becomes '-' so the name
    /// stays legal for stores that reject colons in keys.
    pub fn name_for_identity(identity: &str) -> String {
        identity.replacen(':', "-", 1)
    }
}

impl Resource for PeerRecord {
    const KIND: &'static str = "peer";

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Desired state of one catalog entry. Every field is independently optional
/// in partial updates: empty means "keep the stored value".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub namespace: String,
    pub name: String,
    pub spec: CatalogSpec,
    pub status: ResourceStatus,

    #[serde(skip)]
    pub version: u64,
}

impl CatalogRecord {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: CatalogSpec, status: ResourceStatus) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            spec,
            status,
            version: 0,
        }
    }
}

impl Resource for CatalogRecord {
    const KIND: &'static str = "catalog";

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
