#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! sysinfo-backed implementation of the [`MemoryProbe`] capability.

use log::warn;
use physics_stress_core::MemoryProbe;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Reports the resident memory of the current process.
#[derive(Debug)]
pub struct SysinfoMemoryProbe {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoMemoryProbe {
    /// Creates a probe bound to the running process.
    #[must_use]
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(reason) => {
                warn!("cannot resolve current pid, memory will read as zero: {reason}");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for SysinfoMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoMemoryProbe {
    fn resident_bytes(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let _ = self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system
            .process(pid)
            .map_or(0, |process| process.memory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_nonzero_resident_memory() {
        let mut probe = SysinfoMemoryProbe::new();
        let _buffer = vec![1_u8; 4 * 1_048_576];
        assert!(probe.resident_bytes() > 0);
    }
}
