// Whole-machine sampler: CPU, memory, swap, disk I/O deltas.

use super::{Priority, Sampler};
use crate::delta::DeltaState;
use crate::error::Result;
use crate::models::{CpuUsage, DiskCounters, Row, system_header};
use crate::sink::{Destination, RowWriter};
use crate::sysinfo_repo::SysinfoRepo;
use chrono::{DateTime, Utc};
use tracing::info;

pub struct SystemSampler {
    repo: SysinfoRepo,
    out: RowWriter,
    disk: DeltaState<(), DiskCounters>,
    ncores: usize,
    /// The CPU window before the first row is shorter than sysinfo's update interval.
    cpu_settled: bool,
    start: DateTime<Utc>,
    closed: bool,
}

impl SystemSampler {
    /// Writes the header and records the CPU and disk baselines. The core count is fixed here.
    pub fn new(dest: &Destination, flush: bool) -> Result<Self> {
        info!("System monitor started.");
        let mut repo = SysinfoRepo::new();
        let ncores = repo.cpu_usage().per_core.len();
        let mut disk = DeltaState::new();
        disk.prime((), repo.disk_counters()?);
        let out = RowWriter::create(dest, &system_header(ncores), flush)?;
        Ok(Self {
            repo,
            out,
            disk,
            ncores,
            cpu_settled: false,
            start: Utc::now(),
            closed: false,
        })
    }
}

impl Sampler for SystemSampler {
    fn name(&self) -> &str {
        "system"
    }

    fn priority(&self) -> Priority {
        Priority::System
    }

    fn sample(&mut self, at: DateTime<Utc>) -> Result<()> {
        let mut cpu = self.repo.cpu_usage();
        if !self.cpu_settled {
            // First row reads 0 for every CPU column.
            cpu = CpuUsage::default();
            self.cpu_settled = true;
        }
        let mem = self.repo.memory();
        let disk = self.disk.advance((), self.repo.disk_counters()?);

        let mut per_core = cpu.per_core;
        per_core.resize(self.ncores, 0.0);

        let mut row = Row::stamped(at, self.start);
        row.push(self.ncores)
            .push_percent(cpu.mean as f64 * self.ncores as f64);
        for core in per_core {
            row.push_percent(core as f64);
        }
        row.push_percent(mem.mem_percent())
            .push(mem.total >> 10)
            .push(mem.used >> 10)
            .push(mem.available >> 10)
            .push(mem.free >> 10)
            .push_percent(mem.swap_percent())
            .push(mem.swap_total >> 10)
            .push(mem.swap_used >> 10)
            .push(mem.swap_free >> 10)
            .push(disk.read_count)
            .push(disk.write_count)
            .push(disk.read_bytes >> 10)
            .push(disk.write_bytes >> 10)
            .push(disk.read_time_ms)
            .push(disk.write_time_ms);
        self.out.write_row(&row)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.out.close()?;
        info!("System monitor closed.");
        Ok(())
    }
}
