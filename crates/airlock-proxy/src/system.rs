//! Host gauges for the `/system` endpoint.
//!
//! `sysinfo` sampling blocks (the CPU reading needs two refreshes a
//! minimum interval apart), so the whole sample runs on the blocking
//! pool.

use std::path::Path;

use airlock_core::util::human_timestamp;
use anyhow::Context;
use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, System};

use crate::models::{CpuGauges, DiskGauges, MemoryGauges, SystemSnapshot};

const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// Sample CPU, memory and root-disk gauges.
pub async fn sample() -> anyhow::Result<SystemSnapshot> {
    tokio::task::spawn_blocking(sample_blocking).await.context("system sampling task failed")
}

fn sample_blocking() -> SystemSnapshot {
    let mut sys = System::new();
    sys.refresh_memory();
    // The first CPU refresh only baselines; the reading comes from the
    // second, taken after the minimum measurement interval.
    sys.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();

    let cpu = CpuGauges {
        physical_cores: System::physical_core_count(),
        logical_cores: sys.cpus().len(),
        usage_percent: round2(f64::from(sys.global_cpu_usage())),
    };

    let total = sys.total_memory() as f64;
    let available = sys.available_memory() as f64;
    let memory = MemoryGauges {
        total_gb: round2(total / BYTES_PER_GIB),
        available_gb: round2(available / BYTES_PER_GIB),
        usage_percent: round2(percent_used(total, available)),
    };

    SystemSnapshot { cpu, memory, disk: root_disk_gauges(), timestamp: human_timestamp() }
}

fn root_disk_gauges() -> DiskGauges {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());

    root.map_or(DiskGauges { total_gb: 0.0, free_gb: 0.0, usage_percent: 0.0 }, |disk| {
        let total = disk.total_space() as f64;
        let free = disk.available_space() as f64;
        DiskGauges {
            total_gb: round2(total / BYTES_PER_GIB),
            free_gb: round2(free / BYTES_PER_GIB),
            usage_percent: round2(percent_used(total, free)),
        }
    })
}

fn percent_used(total: f64, free: f64) -> f64 {
    if total > 0.0 { (total - free) / total * 100.0 } else { 0.0 }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_used_handles_zero_capacity() {
        assert_eq!(percent_used(0.0, 0.0), 0.0);
        assert_eq!(percent_used(100.0, 25.0), 75.0);
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(33.333_33), 33.33);
        assert_eq!(round2(66.666_66), 66.67);
    }

    #[tokio::test]
    async fn sample_reports_plausible_gauges() {
        let snapshot = sample().await.unwrap();
        assert!(snapshot.cpu.logical_cores >= 1);
        assert!(snapshot.memory.total_gb > 0.0);
        assert!((0.0..=100.0).contains(&snapshot.memory.usage_percent));
        assert!(!snapshot.timestamp.is_empty());
    }
}
