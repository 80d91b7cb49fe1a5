//! Crate-wide constants.

/// Registry namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Random bytes in a freshly generated tunnel token (hex encoding doubles the
/// printed length).
pub const TOKEN_BYTES: usize = 16;

/// Upper bound on buffered registrar mailbox messages (disconnect
/// notifications plus the shutdown request).
pub const MAX_PEER_EVENTS: usize = 10;
