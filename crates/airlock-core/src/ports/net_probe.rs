//! Read-only view of the host's TCP socket tables.

use std::net::SocketAddr;

/// A socket in the LISTEN state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketEntry {
    pub local_port: u16,
    /// Owning process, when the table exposes one. Sockets whose owner
    /// cannot be resolved still appear so callers can report them.
    pub pid: Option<u32>,
}

/// An ESTABLISHED TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub local_port: u16,
    pub remote: SocketAddr,
    pub pid: Option<u32>,
}

/// The socket tables could not be enumerated at all.
///
/// Individual unreadable rows are not errors; implementations skip them
/// and log. Only a missing or unreadable table surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum NetProbeError {
    #[error("connection table unavailable: {0}")]
    Unavailable(String),
}

/// Live queries against the host socket tables.
///
/// Every call re-reads the current table; implementations must not cache
/// between calls, because the reaper and the guard both act on what they
/// just saw.
pub trait NetProbe: Send + Sync {
    /// All sockets currently in the LISTEN state.
    fn listeners(&self) -> Result<Vec<SocketEntry>, NetProbeError>;

    /// All connections currently in the ESTABLISHED state.
    fn established(&self) -> Result<Vec<ConnectionRecord>, NetProbeError>;
}
