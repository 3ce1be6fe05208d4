// Per-interface sampler: byte/packet/error/drop deltas, one output per NIC.

use super::{Priority, Sampler};
use crate::delta::DeltaState;
use crate::error::{Result, SamplerError};
use crate::models::{InterfaceCounters, Row, interface_header};
use crate::sink::{Destination, RowWriter};
use crate::sysinfo_repo::SysinfoRepo;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Placeholder replaced by the interface name in output patterns.
pub const NIC_PLACEHOLDER: &str = "{nic}";

/// Splits requested names into those present on the host and those missing.
/// Names are trimmed; blanks and repeats are ignored.
pub fn resolve_interfaces<S: AsRef<str>>(
    requested: &[S],
    present: &[String],
) -> (Vec<String>, Vec<String>) {
    let mut found: Vec<String> = Vec::new();
    let mut missing: Vec<String> = Vec::new();
    for name in requested {
        let name = name.as_ref().trim();
        if name.is_empty() || found.iter().chain(&missing).any(|n| n == name) {
            continue;
        }
        if present.iter().any(|p| p == name) {
            found.push(name.to_string());
        } else {
            missing.push(name.to_string());
        }
    }
    (found, missing)
}

pub fn output_path(pattern: &str, nic: &str) -> PathBuf {
    PathBuf::from(pattern.replace(NIC_PLACEHOLDER, nic))
}

struct TrackedInterface {
    name: String,
    out: RowWriter,
}

pub struct NetworkSampler {
    repo: SysinfoRepo,
    interfaces: Vec<TrackedInterface>,
    deltas: DeltaState<String, InterfaceCounters>,
    start: DateTime<Utc>,
    closed: bool,
}

impl NetworkSampler {
    /// Fails with [`SamplerError::NoInterfaces`] before creating any file when none of
    /// the requested names exist.
    pub fn new<S: AsRef<str>>(pattern: &str, requested: &[S], flush: bool) -> Result<Self> {
        info!("NIC monitor started.");
        let mut repo = SysinfoRepo::new();
        let (found, missing) = resolve_interfaces(requested, &repo.interface_names());
        for nic in &missing {
            warn!(nic = %nic, "NIC does not exist; skipped");
        }
        if found.is_empty() {
            return Err(SamplerError::NoInterfaces);
        }

        let header = interface_header();
        let mut interfaces = Vec::with_capacity(found.len());
        for name in found {
            let dest = Destination::File(output_path(pattern, &name));
            let out = RowWriter::create(&dest, &header, flush)?;
            interfaces.push(TrackedInterface { name, out });
        }

        let mut deltas = DeltaState::new();
        let counters = repo.interface_counters();
        for nic in &interfaces {
            if let Some(c) = counters.get(&nic.name) {
                deltas.prime(nic.name.clone(), *c);
            }
        }

        Ok(Self {
            repo,
            interfaces,
            deltas,
            start: Utc::now(),
            closed: false,
        })
    }

    pub fn interface_names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().map(|i| i.name.as_str())
    }
}

impl Sampler for NetworkSampler {
    fn name(&self) -> &str {
        "network"
    }

    fn priority(&self) -> Priority {
        Priority::Network
    }

    fn sample(&mut self, at: DateTime<Utc>) -> Result<()> {
        let counters = self.repo.interface_counters();
        for nic in &mut self.interfaces {
            let delta = match counters.get(&nic.name) {
                Some(c) => self.deltas.advance(nic.name.clone(), *c),
                None => {
                    debug!(nic = %nic.name, "interface missing this tick; reporting zeros");
                    InterfaceCounters::default()
                }
            };
            let mut row = Row::stamped(at, self.start);
            row.push(&nic.name);
            for value in delta.columns() {
                row.push(value);
            }
            nic.out.write_row(&row)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut first_err = None;
        for nic in &mut self.interfaces {
            if let Err(e) = nic.out.close() {
                first_err.get_or_insert(e);
            }
        }
        info!("NIC monitor closed.");
        first_err.map_or(Ok(()), Err)
    }
}
