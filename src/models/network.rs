// Network interface counters

use super::with_time_columns;
use crate::delta::Cumulative;

/// Cumulative per-NIC counters as reported by the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub errors_out: u64,
    pub drops_in: u64,
    pub drops_out: u64,
}

impl Cumulative for InterfaceCounters {
    fn delta_since(&self, prev: &Self) -> Self {
        Self {
            bytes_sent: self.bytes_sent.saturating_sub(prev.bytes_sent),
            bytes_recv: self.bytes_recv.saturating_sub(prev.bytes_recv),
            packets_sent: self.packets_sent.saturating_sub(prev.packets_sent),
            packets_recv: self.packets_recv.saturating_sub(prev.packets_recv),
            errors_in: self.errors_in.saturating_sub(prev.errors_in),
            errors_out: self.errors_out.saturating_sub(prev.errors_out),
            drops_in: self.drops_in.saturating_sub(prev.drops_in),
            drops_out: self.drops_out.saturating_sub(prev.drops_out),
        }
    }
}

impl InterfaceCounters {
    /// Values in column order, after the NIC name.
    pub fn columns(&self) -> [u64; 8] {
        [
            self.bytes_sent,
            self.bytes_recv,
            self.packets_sent,
            self.packets_recv,
            self.errors_in,
            self.errors_out,
            self.drops_in,
            self.drops_out,
        ]
    }
}

pub fn interface_header() -> Vec<String> {
    with_time_columns([
        "NIC",
        "sent.B",
        "recv.B",
        "sent.pkts",
        "recv.pkts",
        "err.in",
        "err.out",
        "drop.in",
        "drop.out",
    ])
}
