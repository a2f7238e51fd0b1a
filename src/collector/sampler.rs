//! Host and application samplers
//!
//! `SystemSampler` reads host health through sysinfo. Application metrics
//! come from whatever the platform wires in through the `ApplicationProbe`
//! trait (the trading engine's request stats, pool gauges, cache counters).

use crate::core::{ApplicationSnapshot, MonitorError, MonitorResult, SystemSnapshot};
use chrono::Utc;
use sysinfo::{Disks, Networks, System};

/// Source of application-level metrics, wired in by the embedding platform
pub trait ApplicationProbe: Send + Sync {
    fn sample(&self) -> MonitorResult<ApplicationSnapshot>;
}

/// Samples host CPU/memory/disk/network state through sysinfo
pub struct SystemSampler {
    system: System,
    disks: Disks,
    networks: Networks,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
        }
    }

    /// Take one SystemSnapshot. CPU usage is measured against the previous
    /// refresh, so the first sample after startup reads near zero.
    pub fn sample(&mut self) -> MonitorResult<SystemSnapshot> {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_processes();
        self.disks.refresh();
        self.networks.refresh();

        let cpu_percent = self.system.global_cpu_info().cpu_usage() as f64;

        let total_memory = self.system.total_memory();
        if total_memory == 0 {
            return Err(MonitorError::collection("total memory reported as zero"));
        }
        let memory_percent = self.system.used_memory() as f64 / total_memory as f64 * 100.0;

        let (disk_total, disk_available) = self
            .disks
            .iter()
            .fold((0u64, 0u64), |(total, avail), disk| {
                (total + disk.total_space(), avail + disk.available_space())
            });
        let disk_percent = if disk_total == 0 {
            0.0
        } else {
            (disk_total - disk_available) as f64 / disk_total as f64 * 100.0
        };

        let (network_bytes_sent, network_bytes_recv) = self
            .networks
            .iter()
            .fold((0u64, 0u64), |(sent, recv), (_, data)| {
                (sent + data.total_transmitted(), recv + data.total_received())
            });

        let load = System::load_average();

        Ok(SystemSnapshot {
            timestamp: Utc::now(),
            cpu_percent,
            memory_percent,
            disk_percent,
            network_bytes_sent,
            network_bytes_recv,
            process_count: self.system.processes().len(),
            load_average: [load.one, load.five, load.fifteen],
        })
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_produces_plausible_snapshot() {
        let mut sampler = SystemSampler::new();
        let snapshot = sampler.sample().unwrap();

        assert!(snapshot.memory_percent > 0.0);
        assert!(snapshot.memory_percent <= 100.0);
        assert!(snapshot.disk_percent >= 0.0);
        assert!(snapshot.disk_percent <= 100.0);
        assert!(snapshot.process_count > 0);
    }

    struct FixedProbe;

    impl ApplicationProbe for FixedProbe {
        fn sample(&self) -> MonitorResult<ApplicationSnapshot> {
            Ok(ApplicationSnapshot {
                timestamp: Utc::now(),
                response_time_avg: 0.15,
                response_time_p95: 0.5,
                request_count: 100,
                error_count: 2,
                error_rate: 0.02,
                active_connections: 25,
                database_connections: 10,
                cache_hit_rate: 0.85,
            })
        }
    }

    #[test]
    fn test_probe_trait_object() {
        let probe: Box<dyn ApplicationProbe> = Box::new(FixedProbe);
        let snapshot = probe.sample().unwrap();
        assert_eq!(snapshot.request_count, 100);
    }
}
