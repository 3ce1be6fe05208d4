// Per-process counters and the process-set aggregate

use super::with_time_columns;

/// Aggregate columns, in output order.
pub const PROCESS_COLUMNS: [&str; 8] = [
    "%CPU",
    "io.read",
    "io.read.KB",
    "io.write",
    "io.write.KB",
    "mem.rss.KB",
    "nctxsw",
    "nthreads",
];

/// Counters of one process, or the sum over a process tree. Byte fields are in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessCounters {
    /// Over the previous tick; 100 = one busy core.
    pub cpu_percent: f64,
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub rss_bytes: u64,
    /// Voluntary + involuntary.
    pub ctx_switches: u64,
    pub threads: u64,
}

impl std::ops::AddAssign for ProcessCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.cpu_percent += rhs.cpu_percent;
        self.read_count += rhs.read_count;
        self.write_count += rhs.write_count;
        self.read_bytes += rhs.read_bytes;
        self.write_bytes += rhs.write_bytes;
        self.rss_bytes += rhs.rss_bytes;
        self.ctx_switches += rhs.ctx_switches;
        self.threads += rhs.threads;
    }
}

impl ProcessCounters {
    /// Rendered values in [`PROCESS_COLUMNS`] order.
    pub fn columns(&self) -> [String; 8] {
        [
            format!("{:.3}", self.cpu_percent),
            self.read_count.to_string(),
            (self.read_bytes >> 10).to_string(),
            self.write_count.to_string(),
            (self.write_bytes >> 10).to_string(),
            (self.rss_bytes >> 10).to_string(),
            self.ctx_switches.to_string(),
            self.threads.to_string(),
        ]
    }
}

pub fn process_header() -> Vec<String> {
    with_time_columns(PROCESS_COLUMNS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_convert_bytes_to_kib() {
        let c = ProcessCounters {
            cpu_percent: 12.34567,
            read_bytes: 4096,
            write_bytes: 1023,
            rss_bytes: 10 << 20,
            threads: 3,
            ..Default::default()
        };
        let cols = c.columns();
        assert_eq!(cols[0], "12.346");
        assert_eq!(cols[2], "4");
        assert_eq!(cols[4], "0");
        assert_eq!(cols[5], "10240");
        assert_eq!(cols[7], "3");
    }

    #[test]
    fn default_aggregate_renders_all_zero() {
        let cols = ProcessCounters::default().columns();
        assert_eq!(cols[0], "0.000");
        assert!(cols[1..].iter().all(|c| c == "0"));
        assert_eq!(process_header().len(), 2 + cols.len());
    }
}
