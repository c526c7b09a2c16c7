//! Host resource sampling for health reports

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Point-in-time CPU and memory figures
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub cpu_count: usize,
    /// Resident memory of this process, `None` if it could not be read
    pub process_memory_bytes: Option<u64>,
    pub used_memory_bytes: u64,
    pub total_memory_bytes: u64,
}

/// Reuses one `sysinfo::System` so CPU usage is measured between samples
pub struct SystemSampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn sample(&self) -> SystemMetrics {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();
        system.refresh_cpu_usage();

        let process_memory_bytes = self.pid.and_then(|pid| {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            system.process(pid).map(|process| process.memory())
        });

        SystemMetrics {
            cpu_usage_percent: system.global_cpu_usage(),
            cpu_count: system.cpus().len(),
            process_memory_bytes,
            used_memory_bytes: system.used_memory(),
            total_memory_bytes: system.total_memory(),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}
