// Samplers: one resource domain each, one row (per output) per tick.

mod network;
mod process;
mod system;

pub use network::{NetworkSampler, resolve_interfaces};
pub use process::{MonitorTarget, ProcessSetSampler};
pub use system::SystemSampler;

use crate::error::Result;
use chrono::{DateTime, Utc};

/// Order within a tick; lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    System,
    Network,
    ProcessSet,
}

pub trait Sampler {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn priority(&self) -> Priority;

    /// Takes one sample stamped `at` and appends it to the sampler's output.
    fn sample(&mut self, at: DateTime<Utc>) -> Result<()>;

    /// Flushes outputs and releases owned resources. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}
