// Process-set sampler: one aggregate row per tick over the trees rooted at the tracked pids.

use super::{Priority, Sampler};
use crate::error::{Result, SamplerError};
use crate::models::{Row, process_header};
use crate::process_tree::{RootSet, aggregate};
use crate::sink::{Destination, RowWriter};
use crate::sysinfo_repo::{SysinfoRepo, terminate};
use chrono::{DateTime, Utc};
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long an owned child gets to exit after SIGTERM before it is killed.
const CHILD_GRACE: Duration = Duration::from_secs(5);
const CHILD_POLL: Duration = Duration::from_millis(20);

/// What a process-set sampler watches. Both parts may be given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorTarget {
    /// Command to launch and own.
    pub command: Option<Vec<String>>,
    /// Pre-existing processes.
    pub pids: Vec<u32>,
}

impl MonitorTarget {
    pub fn command(argv: Vec<String>) -> Self {
        Self {
            command: Some(argv),
            pids: Vec::new(),
        }
    }

    pub fn pids(pids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            command: None,
            pids: pids.into_iter().collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.command.as_ref().is_none_or(|c| c.is_empty()) && self.pids.is_empty()
    }
}

/// A single argument containing a space is a shell command line.
fn build_command(argv: &[String]) -> Command {
    match argv {
        [line] if line.contains(' ') => {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(line);
            cmd
        }
        [program, args @ ..] => {
            let mut cmd = Command::new(program);
            cmd.args(args);
            cmd
        }
        [] => Command::new("true"),
    }
}

struct OwnedChild {
    child: Child,
    exited: Option<ExitStatus>,
}

impl OwnedChild {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Reaps the child if it has exited; returns the status the first time it is seen.
    fn reap(&mut self) -> Option<ExitStatus> {
        if self.exited.is_some() {
            return None;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exited = Some(status);
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(pid = self.pid(), error = %e, "try_wait failed");
                None
            }
        }
    }

    /// SIGTERM, wait up to the grace period, then SIGKILL.
    fn shutdown(&mut self) {
        let pid = self.pid();
        if self.exited.is_some() || self.reap().is_some() {
            return;
        }
        if let Err(e) = terminate(pid) {
            warn!(pid, error = %e, "failed to send SIGTERM to child");
        }
        let deadline = Instant::now() + CHILD_GRACE;
        while Instant::now() < deadline {
            if let Some(status) = self.reap() {
                info!(pid, %status, "child process terminated");
                return;
            }
            std::thread::sleep(CHILD_POLL);
        }
        warn!(pid, "child ignored SIGTERM; killing");
        if let Err(e) = self.child.kill() {
            warn!(pid, error = %e, "failed to kill child");
        }
        match self.child.wait() {
            Ok(status) => self.exited = Some(status),
            Err(e) => warn!(pid, error = %e, "failed to wait for child"),
        }
    }
}

pub struct ProcessSetSampler {
    label: String,
    repo: SysinfoRepo,
    out: RowWriter,
    roots: RootSet,
    child: Option<OwnedChild>,
    start: DateTime<Utc>,
    closed: bool,
}

impl ProcessSetSampler {
    /// Opens the output, launches the command (if any) and pins the roots' start times.
    pub fn new(
        label: impl Into<String>,
        dest: &Destination,
        target: MonitorTarget,
        flush: bool,
    ) -> Result<Self> {
        if target.is_empty() {
            return Err(SamplerError::NoProcessTarget);
        }
        let label = label.into();
        info!(sampler = %label, "ProcessSet monitor started.");
        let out = RowWriter::create(dest, &process_header(), flush)?;

        let mut pids = target.pids;
        let child = match target.command.filter(|c| !c.is_empty()) {
            Some(argv) => {
                let child = build_command(&argv)
                    .spawn()
                    .map_err(|source| SamplerError::Spawn {
                        command: argv.join(" "),
                        source,
                    })?;
                info!(pid = child.id(), "spawned process {}", child.id());
                pids.push(child.id());
                Some(OwnedChild {
                    child,
                    exited: None,
                })
            }
            None => None,
        };

        let mut repo = SysinfoRepo::new();
        let mut roots = RootSet::new(pids);
        let table = repo.process_table();
        roots.pin_start_times(&table);

        Ok(Self {
            label,
            repo,
            out,
            roots,
            child,
            start: Utc::now(),
            closed: false,
        })
    }

    /// Number of roots still tracked.
    pub fn tracked_roots(&self) -> usize {
        self.roots.len()
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.child.as_ref().map(OwnedChild::pid)
    }
}

impl Sampler for ProcessSetSampler {
    fn name(&self) -> &str {
        &self.label
    }

    fn priority(&self) -> Priority {
        Priority::ProcessSet
    }

    fn sample(&mut self, at: DateTime<Utc>) -> Result<()> {
        if let Some(child) = self.child.as_mut()
            && let Some(status) = child.reap()
        {
            info!(pid = child.pid(), %status, "child process exited");
            self.roots.remove(child.pid());
        }

        let table = self.repo.process_table();
        for pid in self.roots.prune(&table) {
            info!(sampler = %self.label, pid, "process no longer running; stopped tracking");
        }
        let total = aggregate(&table, self.roots.pids());

        let mut row = Row::stamped(at, self.start);
        for value in total.columns() {
            row.push(value);
        }
        self.out.write_row(&row)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(child) = self.child.as_mut() {
            child.shutdown();
        }
        self.out.close()?;
        info!(sampler = %self.label, "ProcessSet monitor closed.");
        Ok(())
    }
}

impl Drop for ProcessSetSampler {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(sampler = %self.label, error = %e, "close on drop failed");
        }
    }
}
