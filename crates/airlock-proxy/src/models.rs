//! Wire types for the proxy API.
//!
//! Domain types (chat chunks, model entries) live in `airlock-core`; this
//! module is the HTTP-facing layer: capability descriptor, gauge payloads,
//! and the JSON error bodies every failure path returns.

use std::collections::BTreeMap;

use airlock_core::{ChatChunk, ModelEntry};
use airlock_core::util::human_timestamp;
use serde::Serialize;

// =============================================================================
// Capability Descriptor (GET /)
// =============================================================================

/// What this proxy is and what it exposes.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDescriptor {
    pub service: String,
    pub version: String,
    pub description: String,
    /// `"GET /status"` → human description, one entry per route.
    pub endpoints: BTreeMap<&'static str, &'static str>,
    pub security: SecurityPosture,
    pub timestamp: String,
}

/// The promises the descriptor makes about data flow.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SecurityPosture {
    pub local_only: bool,
    pub external_calls: bool,
}

impl ServiceDescriptor {
    #[must_use]
    pub fn current() -> Self {
        Self {
            service: "airlock proxy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Loopback-only proxy between local editors and the inference backend"
                .to_string(),
            endpoints: BTreeMap::from([
                ("GET /status", "Check service and backend status"),
                ("GET /models", "List available models"),
                ("GET /system", "Get system information"),
                ("POST /chat", "Send chat messages to the local model"),
            ]),
            security: SecurityPosture { local_only: true, external_calls: false },
            timestamp: human_timestamp(),
        }
    }
}

// =============================================================================
// Status / Models (GET /status, GET /models)
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatusBody {
    pub service_status: &'static str,
    /// `"running"` when the backend answered a live probe, otherwise
    /// `"not accessible"`.
    pub backend_status: &'static str,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

impl StatusBody {
    #[must_use]
    pub fn new(backend_reachable: bool, uptime_seconds: u64) -> Self {
        Self {
            service_status: "operational",
            backend_status: if backend_reachable { "running" } else { "not accessible" },
            uptime_seconds,
            timestamp: human_timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelsBody {
    pub models: Vec<ModelEntry>,
    pub count: usize,
    pub timestamp: String,
}

impl ModelsBody {
    #[must_use]
    pub fn new(models: Vec<ModelEntry>) -> Self {
        let count = models.len();
        Self { models, count, timestamp: human_timestamp() }
    }
}

// =============================================================================
// System Gauges (GET /system)
// =============================================================================

/// Point-in-time host gauges, sampled on demand.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub cpu: CpuGauges,
    pub memory: MemoryGauges,
    pub disk: DiskGauges,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CpuGauges {
    /// `None` when the platform cannot report the physical topology.
    pub physical_cores: Option<usize>,
    pub logical_cores: usize,
    pub usage_percent: f64,
}

/// Sizes in GiB, rounded to two decimals.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemoryGauges {
    pub total_gb: f64,
    pub available_gb: f64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DiskGauges {
    pub total_gb: f64,
    pub free_gb: f64,
    pub usage_percent: f64,
}

// =============================================================================
// Chat Payloads (POST /chat)
// =============================================================================

/// One chat reply or stream event: the backend chunk plus the proxy-side
/// timestamp, flattened into a single JSON object.
#[derive(Debug, Clone, Serialize)]
pub struct ChatEventPayload {
    #[serde(flatten)]
    pub chunk: ChatChunk,
    pub timestamp: String,
}

impl ChatEventPayload {
    #[must_use]
    pub fn new(chunk: ChatChunk) -> Self {
        Self { chunk, timestamp: human_timestamp() }
    }
}

// =============================================================================
// Error Bodies
// =============================================================================

/// Flat error body; every failing endpoint answers with this shape.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub timestamp: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: message.into(), timestamp: human_timestamp() }
    }
}

/// 404 body echoing the path that missed.
#[derive(Debug, Clone, Serialize)]
pub struct UnknownRouteBody {
    pub error: &'static str,
    pub path: String,
}

impl UnknownRouteBody {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { error: "Endpoint not found", path: path.into() }
    }
}
