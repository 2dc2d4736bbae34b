//! Resource pressure probes consulted before honoring a retry.

use std::fs;

use serde::{Deserialize, Serialize};

/// One sample of resource usage. `None` means the value is unavailable on
/// this platform and is treated as healthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    pub process_memory_ratio: Option<f64>,
    pub system_memory_ratio: Option<f64>,
    pub load_per_cpu: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceLimits {
    pub max_process_memory_ratio: f64,
    pub max_system_memory_ratio: f64,
    pub max_load_per_cpu: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_process_memory_ratio: 0.8,
            max_system_memory_ratio: 0.9,
            max_load_per_cpu: 2.0,
        }
    }
}

impl ResourceSnapshot {
    pub fn is_healthy(&self, limits: &ResourceLimits) -> bool {
        let within = |value: Option<f64>, max: f64| value.map_or(true, |v| v <= max);
        within(self.process_memory_ratio, limits.max_process_memory_ratio)
            && within(self.system_memory_ratio, limits.max_system_memory_ratio)
            && within(self.load_per_cpu, limits.max_load_per_cpu)
    }
}

pub trait ResourceProbe: Send + Sync {
    fn sample(&self) -> ResourceSnapshot;
}

/// Reads `/proc` on Linux; reports nothing elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ResourceProbe for SystemProbe {
    fn sample(&self) -> ResourceSnapshot {
        let meminfo = fs::read_to_string("/proc/meminfo").unwrap_or_default();
        let total_kb = meminfo_field(&meminfo, "MemTotal:");
        let available_kb = meminfo_field(&meminfo, "MemAvailable:");

        let status = fs::read_to_string("/proc/self/status").unwrap_or_default();
        let rss_kb = meminfo_field(&status, "VmRSS:");

        let system_memory_ratio = match (total_kb, available_kb) {
            (Some(total), Some(available)) if total > 0.0 => Some(1.0 - available / total),
            _ => None,
        };
        let process_memory_ratio = match (total_kb, rss_kb) {
            (Some(total), Some(rss)) if total > 0.0 => Some(rss / total),
            _ => None,
        };

        let cpus = std::thread::available_parallelism()
            .map(|n| n.get() as f64)
            .unwrap_or(1.0);
        let load_per_cpu = fs::read_to_string("/proc/loadavg")
            .ok()
            .and_then(|s| s.split_whitespace().next().and_then(|v| v.parse::<f64>().ok()))
            .map(|load| load / cpus);

        ResourceSnapshot {
            process_memory_ratio,
            system_memory_ratio,
            load_per_cpu,
        }
    }
}

fn meminfo_field(text: &str, key: &str) -> Option<f64> {
    text.lines()
        .find(|line| line.starts_with(key))
        .and_then(|line| line[key.len()..].split_whitespace().next())
        .and_then(|value| value.parse::<f64>().ok())
}

/// Always reports the same snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedProbe(pub ResourceSnapshot);

impl FixedProbe {
    pub fn healthy() -> Self {
        FixedProbe(ResourceSnapshot::default())
    }

    pub fn under_pressure() -> Self {
        FixedProbe(ResourceSnapshot {
            process_memory_ratio: Some(0.99),
            system_memory_ratio: Some(0.99),
            load_per_cpu: Some(16.0),
        })
    }
}

impl ResourceProbe for FixedProbe {
    fn sample(&self) -> ResourceSnapshot {
        self.0
    }
}
