//! Synthetic socket/process tables for sweep and orchestration tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use airlock_core::ports::{
    ConnectionRecord, NetProbe, NetProbeError, ProcessControl, SocketEntry, TerminateError,
};
use async_trait::async_trait;

/// How a scripted PID refuses termination.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FailureMode {
    NotFound,
    Denied,
    Timeout,
}

/// An in-memory host: a socket table plus a process table, implementing
/// both OS ports. Terminating a PID removes its rows, so repeated sweeps
/// observe the tables they just changed, exactly like the real host.
#[derive(Debug, Default)]
pub(crate) struct SyntheticHost {
    listeners: Mutex<Vec<SocketEntry>>,
    established: Mutex<Vec<ConnectionRecord>>,
    terminated: Mutex<Vec<u32>>,
    failures: BTreeMap<u32, FailureMode>,
    names: BTreeMap<u32, String>,
    fail_enumeration: bool,
}

impl SyntheticHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose socket tables cannot be enumerated at all.
    pub fn unreadable() -> Self {
        Self { fail_enumeration: true, ..Self::default() }
    }

    pub fn listener(self, port: u16, pid: Option<u32>) -> Self {
        self.listeners.lock().unwrap().push(SocketEntry { local_port: port, pid });
        self
    }

    pub fn connection(self, local_port: u16, remote: &str, pid: Option<u32>) -> Self {
        self.established.lock().unwrap().push(ConnectionRecord {
            local_port,
            remote: remote.parse().expect("test remote must parse"),
            pid,
        });
        self
    }

    pub fn named(mut self, pid: u32, name: &str) -> Self {
        self.names.insert(pid, name.to_string());
        self
    }

    pub fn refusing(mut self, pid: u32, mode: FailureMode) -> Self {
        self.failures.insert(pid, mode);
        self
    }

    /// PIDs terminated so far, in order.
    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.lock().unwrap().clone()
    }
}

impl NetProbe for SyntheticHost {
    fn listeners(&self) -> Result<Vec<SocketEntry>, NetProbeError> {
        if self.fail_enumeration {
            return Err(NetProbeError::Unavailable("synthetic table failure".into()));
        }
        Ok(self.listeners.lock().unwrap().clone())
    }

    fn established(&self) -> Result<Vec<ConnectionRecord>, NetProbeError> {
        if self.fail_enumeration {
            return Err(NetProbeError::Unavailable("synthetic table failure".into()));
        }
        Ok(self.established.lock().unwrap().clone())
    }
}

#[async_trait]
impl ProcessControl for SyntheticHost {
    async fn terminate(&self, pid: u32) -> Result<(), TerminateError> {
        match self.failures.get(&pid) {
            Some(FailureMode::NotFound) => Err(TerminateError::NotFound { pid }),
            Some(FailureMode::Denied) => Err(TerminateError::PermissionDenied { pid }),
            Some(FailureMode::Timeout) => Err(TerminateError::Timeout { pid }),
            None => {
                self.terminated.lock().unwrap().push(pid);
                self.listeners.lock().unwrap().retain(|entry| entry.pid != Some(pid));
                self.established.lock().unwrap().retain(|record| record.pid != Some(pid));
                Ok(())
            }
        }
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        self.names.get(&pid).cloned()
    }
}
