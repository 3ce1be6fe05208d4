// Host counters via sysinfo, topped up from procfs where sysinfo has no equivalent.
//
// Every sampler owns its own repo: sysinfo measures CPU usage since the
// previous refresh of the same `System`, so sharing one would split the window.

mod linux;

pub(crate) use linux::{set_niceness, terminate};

use crate::error::{Result, SamplerError};
use crate::models::*;
use crate::process_tree::ProcessView;
use std::collections::HashMap;
use sysinfo::{Networks, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::instrument;

pub struct SysinfoRepo {
    sys: System,
    networks: Networks,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            networks: Networks::new(),
        }
    }

    /// CPU usage since the previous call. The first call only sets the baseline and reads 0.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "cpu_usage"))]
    pub fn cpu_usage(&mut self) -> CpuUsage {
        self.sys.refresh_cpu_usage();
        CpuUsage {
            mean: self.sys.global_cpu_usage(),
            per_core: self.sys.cpus().iter().map(|c| c.cpu_usage()).collect(),
        }
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "memory"))]
    pub fn memory(&mut self) -> MemoryUsage {
        self.sys.refresh_memory();
        MemoryUsage {
            total: self.sys.total_memory(),
            used: self.sys.used_memory(),
            available: self.sys.available_memory(),
            free: self.sys.free_memory(),
            swap_total: self.sys.total_swap(),
            swap_used: self.sys.used_swap(),
            swap_free: self.sys.free_swap(),
        }
    }

    #[instrument(skip(self), fields(repo = "procfs", operation = "disk_counters"))]
    pub fn disk_counters(&self) -> Result<DiskCounters> {
        linux::read_disk_counters()
            .map_err(|e| SamplerError::Host(format!("/proc/diskstats: {}", e)))
    }

    /// Names of the interfaces currently present on the host.
    pub fn interface_names(&mut self) -> Vec<String> {
        self.networks.refresh(true);
        let mut names: Vec<String> = self.networks.list().keys().cloned().collect();
        names.sort();
        names
    }

    /// Cumulative counters of every interface currently present.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "interface_counters"))]
    pub fn interface_counters(&mut self) -> HashMap<String, InterfaceCounters> {
        self.networks.refresh(true);
        self.networks
            .list()
            .iter()
            .map(|(name, data)| {
                let (drops_in, drops_out) = linux::read_interface_drops(name);
                (
                    name.clone(),
                    InterfaceCounters {
                        bytes_sent: data.total_transmitted(),
                        bytes_recv: data.total_received(),
                        packets_sent: data.total_packets_transmitted(),
                        packets_recv: data.total_packets_received(),
                        errors_in: data.total_errors_on_received(),
                        errors_out: data.total_errors_on_transmitted(),
                        drops_in,
                        drops_out,
                    },
                )
            })
            .collect()
    }

    /// Fresh process table. CPU percentages cover the window since the previous call.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "process_table"))]
    pub fn process_table(&mut self) -> ProcessTable {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        let mut table = ProcessTable::default();
        for (pid, p) in self.sys.processes() {
            // Threads surface as tasks of their process, never as children.
            if p.thread_kind().is_some() {
                continue;
            }
            let pid = pid.as_u32();
            let alive = !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead);
            table.entries.insert(
                pid,
                ProcessEntry {
                    start_time: p.start_time(),
                    alive,
                    cpu_percent: p.cpu_usage(),
                    rss_bytes: p.memory(),
                },
            );
            if let Some(parent) = p.parent() {
                table.children.entry(parent.as_u32()).or_default().push(pid);
            }
        }
        for kids in table.children.values_mut() {
            kids.sort_unstable();
        }
        table
    }
}

#[derive(Debug, Clone, Copy)]
struct ProcessEntry {
    start_time: u64,
    alive: bool,
    cpu_percent: f32,
    rss_bytes: u64,
}

/// Point-in-time view of every process on the host with parent -> children links.
#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: HashMap<u32, ProcessEntry>,
    children: HashMap<u32, Vec<u32>>,
}

impl ProcessTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProcessView for ProcessTable {
    fn start_time(&self, pid: u32) -> Option<u64> {
        self.entries
            .get(&pid)
            .filter(|e| e.alive)
            .map(|e| e.start_time)
    }

    fn children(&self, pid: u32) -> &[u32] {
        self.children.get(&pid).map(Vec::as_slice).unwrap_or(&[])
    }

    fn counters(&self, pid: u32) -> Option<ProcessCounters> {
        let entry = self.entries.get(&pid).filter(|e| e.alive)?;
        match linux::read_process_counters(pid) {
            Ok(c) => Some(ProcessCounters {
                cpu_percent: entry.cpu_percent as f64,
                read_count: c.read_count,
                write_count: c.write_count,
                read_bytes: c.read_bytes,
                write_bytes: c.write_bytes,
                rss_bytes: entry.rss_bytes,
                ctx_switches: c.ctx_switches,
                threads: c.threads,
            }),
            Err(e) => {
                tracing::debug!(pid, error = %e, "process counters unavailable; skipped this tick");
                None
            }
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn process_table_contains_self_with_counters() {
        let mut repo = SysinfoRepo::new();
        let table = repo.process_table();
        let me = std::process::id();
        assert!(table.start_time(me).is_some());
        let c = table.counters(me).expect("own counters");
        assert!(c.threads >= 1);
        assert!(c.rss_bytes > 0);
    }

    #[test]
    fn first_cpu_reading_has_one_entry_per_core() {
        let mut repo = SysinfoRepo::new();
        let usage = repo.cpu_usage();
        assert!(!usage.per_core.is_empty());
    }

    #[test]
    fn memory_total_is_positive() {
        let mut repo = SysinfoRepo::new();
        let mem = repo.memory();
        assert!(mem.total > 0);
        assert!(mem.available <= mem.total);
    }
}
