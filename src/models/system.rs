// Whole-machine snapshots: CPU, memory/swap, disk I/O

use super::with_time_columns;
use crate::delta::Cumulative;

/// CPU utilisation measured over the window since the previous refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuUsage {
    /// Mean utilisation across cores, 0..100.
    pub mean: f32,
    pub per_core: Vec<f32>,
}

/// Memory and swap occupancy, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub free: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
}

impl MemoryUsage {
    pub fn mem_percent(&self) -> f64 {
        super::percent_of(self.total.saturating_sub(self.available), self.total)
    }

    pub fn swap_percent(&self) -> f64 {
        super::percent_of(self.swap_used, self.swap_total)
    }
}

/// Cumulative block-device counters summed over whole disks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_time_ms: u64,
    pub write_time_ms: u64,
}

impl Cumulative for DiskCounters {
    fn delta_since(&self, prev: &Self) -> Self {
        Self {
            read_count: self.read_count.saturating_sub(prev.read_count),
            write_count: self.write_count.saturating_sub(prev.write_count),
            read_bytes: self.read_bytes.saturating_sub(prev.read_bytes),
            write_bytes: self.write_bytes.saturating_sub(prev.write_bytes),
            read_time_ms: self.read_time_ms.saturating_sub(prev.read_time_ms),
            write_time_ms: self.write_time_ms.saturating_sub(prev.write_time_ms),
        }
    }
}

impl std::ops::AddAssign for DiskCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.read_count += rhs.read_count;
        self.write_count += rhs.write_count;
        self.read_bytes += rhs.read_bytes;
        self.write_bytes += rhs.write_bytes;
        self.read_time_ms += rhs.read_time_ms;
        self.write_time_ms += rhs.write_time_ms;
    }
}

/// Header for the system sampler; the per-core block depends on the core count.
pub fn system_header(ncores: usize) -> Vec<String> {
    let mut header = with_time_columns(["NCPU", "%CPU"]);
    header.extend((0..ncores).map(|i| format!("%CPU{}", i)));
    header.extend(
        [
            "%MEM",
            "mem.total.KB",
            "mem.used.KB",
            "mem.avail.KB",
            "mem.free.KB",
            "%SWAP",
            "swap.total.KB",
            "swap.used.KB",
            "swap.free.KB",
            "io.read",
            "io.write",
            "io.read.KB",
            "io.write.KB",
            "io.read.ms",
            "io.write.ms",
        ]
        .map(str::to_string),
    );
    header
}
