// Counter snapshots and sample-row column layouts

mod network;
mod process;
mod system;

pub use network::{InterfaceCounters, interface_header};
pub use process::{PROCESS_COLUMNS, ProcessCounters, process_header};
pub use system::{CpuUsage, DiskCounters, MemoryUsage, system_header};

use chrono::{DateTime, Utc};

/// Leading columns shared by every sampler.
pub const TIME_COLUMNS: [&str; 2] = ["Timestamp", "Uptime"];

/// One output line, in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<String>,
}

impl Row {
    /// Starts a row with the tick timestamp and whole seconds elapsed since `start`.
    pub fn stamped(at: DateTime<Utc>, start: DateTime<Utc>) -> Self {
        let uptime = (at.timestamp() - start.timestamp()).max(0);
        Self {
            fields: vec![at.timestamp().to_string(), uptime.to_string()],
        }
    }

    pub fn push(&mut self, value: impl ToString) -> &mut Self {
        self.fields.push(value.to_string());
        self
    }

    pub fn push_percent(&mut self, value: f64) -> &mut Self {
        self.fields.push(format!("{:.1}", value));
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub(crate) fn with_time_columns<'a>(rest: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    TIME_COLUMNS
        .iter()
        .copied()
        .chain(rest)
        .map(str::to_string)
        .collect()
}

/// `part / whole` as a percentage, 0 when `whole` is 0.
pub(crate) fn percent_of(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}
