//! `/proc/net` socket table probe.
//!
//! Linux publishes its TCP tables as text under `/proc/net/tcp` and
//! `/proc/net/tcp6`. Each row carries hex-encoded endpoints, a state byte
//! and the socket inode; the inode maps back to an owning process through
//! the `/proc/<pid>/fd` symlinks. Without elevated privileges only the
//! caller's own processes resolve, which is why [`SocketEntry::pid`] is
//! optional.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};

use airlock_core::ports::{ConnectionRecord, NetProbe, NetProbeError, SocketEntry};
use tracing::{debug, trace};

const TCP_ESTABLISHED: u8 = 0x01;
const TCP_LISTEN: u8 = 0x0A;

/// One parsed `/proc/net/tcp[6]` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SocketRow {
    local: SocketAddr,
    remote: SocketAddr,
    state: u8,
    inode: u64,
}

/// [`NetProbe`] backed by the procfs TCP tables.
///
/// Every query re-reads the tables; nothing is cached between calls. The
/// proc root is injectable so tests can point the probe at a synthetic
/// tree.
#[derive(Debug, Clone)]
pub struct ProcfsNetProbe {
    proc_root: PathBuf,
}

impl Default for ProcfsNetProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsNetProbe {
    #[must_use]
    pub fn new() -> Self {
        Self { proc_root: PathBuf::from("/proc") }
    }

    /// Probe an alternate proc tree. Used by tests with synthetic tables.
    #[must_use]
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self { proc_root: proc_root.into() }
    }

    /// Read and parse both TCP tables. The v6 table is optional (kernels
    /// without IPv6), but at least one table must be readable.
    fn read_rows(&self) -> Result<Vec<SocketRow>, NetProbeError> {
        let v4 = std::fs::read_to_string(self.proc_root.join("net/tcp"));
        let v6 = std::fs::read_to_string(self.proc_root.join("net/tcp6"));

        if v4.is_err() && v6.is_err() {
            return Err(NetProbeError::Unavailable(format!(
                "cannot read {}/net/tcp or net/tcp6",
                self.proc_root.display()
            )));
        }

        let mut rows = Vec::new();
        if let Ok(content) = v4 {
            rows.extend(parse_table(&content, false));
        }
        if let Ok(content) = v6 {
            rows.extend(parse_table(&content, true));
        }
        Ok(rows)
    }

    /// Map socket inodes to owning PIDs by walking `/proc/<pid>/fd`.
    ///
    /// Unreadable processes (permissions, races with exiting processes)
    /// are skipped; their sockets simply stay unattributed.
    fn inode_owners(&self) -> HashMap<u64, u32> {
        let mut owners = HashMap::new();
        let Ok(entries) = std::fs::read_dir(&self.proc_root) else {
            return owners;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            let fd_dir = entry.path().join("fd");
            let Ok(fds) = std::fs::read_dir(&fd_dir) else {
                continue;
            };
            for fd in fds.flatten() {
                if let Ok(target) = std::fs::read_link(fd.path()) {
                    if let Some(inode) = socket_inode(&target) {
                        owners.insert(inode, pid);
                    }
                }
            }
        }
        owners
    }

    fn sockets_in_state(&self, state: u8) -> Result<Vec<(SocketRow, Option<u32>)>, NetProbeError> {
        let rows = self.read_rows()?;
        let owners = self.inode_owners();
        Ok(rows
            .into_iter()
            .filter(|row| row.state == state)
            .map(|row| {
                let pid = owners.get(&row.inode).copied();
                (row, pid)
            })
            .collect())
    }
}

impl NetProbe for ProcfsNetProbe {
    fn listeners(&self) -> Result<Vec<SocketEntry>, NetProbeError> {
        let sockets = self.sockets_in_state(TCP_LISTEN)?;
        debug!(count = sockets.len(), "enumerated listening sockets");
        Ok(sockets
            .into_iter()
            .map(|(row, pid)| SocketEntry { local_port: row.local.port(), pid })
            .collect())
    }

    fn established(&self) -> Result<Vec<ConnectionRecord>, NetProbeError> {
        let sockets = self.sockets_in_state(TCP_ESTABLISHED)?;
        debug!(count = sockets.len(), "enumerated established connections");
        Ok(sockets
            .into_iter()
            .map(|(row, pid)| ConnectionRecord {
                local_port: row.local.port(),
                remote: row.remote,
                pid,
            })
            .collect())
    }
}

/// Extract the inode from an fd symlink target of the form
/// `socket:[12345]`.
fn socket_inode(target: &Path) -> Option<u64> {
    let target = target.to_str()?;
    target.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

/// Parse one whole table, skipping the header and any malformed rows.
fn parse_table(content: &str, v6: bool) -> Vec<SocketRow> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let row = parse_row(line, v6);
            if row.is_none() && !line.trim().is_empty() {
                trace!(line, "skipping malformed socket table row");
            }
            row
        })
        .collect()
}

/// Parse one row. Layout (whitespace separated):
/// `sl local rem st tx:rx tr:when retrnsmt uid timeout inode ...`
fn parse_row(line: &str, v6: bool) -> Option<SocketRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return None;
    }

    let local = parse_endpoint(fields[1], v6)?;
    let remote = parse_endpoint(fields[2], v6)?;
    let state = u8::from_str_radix(fields[3], 16).ok()?;
    let inode = fields[9].parse().ok()?;

    Some(SocketRow { local, remote, state, inode })
}

/// Parse a `HEXADDR:HEXPORT` endpoint. The port is network order; the
/// address words are little-endian as the kernel stores them.
fn parse_endpoint(field: &str, v6: bool) -> Option<SocketAddr> {
    let (addr_hex, port_hex) = field.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let ip = if v6 { parse_addr_v6(addr_hex)? } else { parse_addr_v4(addr_hex)? };
    Some(SocketAddr::new(ip, port))
}

fn parse_addr_v4(hex: &str) -> Option<IpAddr> {
    if hex.len() != 8 {
        return None;
    }
    let word = u32::from_str_radix(hex, 16).ok()?;
    Some(IpAddr::V4(Ipv4Addr::from(word.swap_bytes())))
}

/// IPv6 addresses are four little-endian 32-bit words. v4-mapped
/// addresses are folded back to v4 so they match the same block patterns
/// as their v4 form.
fn parse_addr_v6(hex: &str) -> Option<IpAddr> {
    if hex.len() != 32 {
        return None;
    }
    let mut bytes = [0u8; 16];
    for (i, chunk) in bytes.chunks_exact_mut(4).enumerate() {
        let word = u32::from_str_radix(&hex[i * 8..(i + 1) * 8], 16).ok()?;
        chunk.copy_from_slice(&word.swap_bytes().to_be_bytes());
    }
    let addr = Ipv6Addr::from(bytes);
    match addr.to_ipv4_mapped() {
        Some(v4) => Some(IpAddr::V4(v4)),
        None => Some(IpAddr::V6(addr)),
    }
}
