// Sampler error taxonomy.
//
// Per-entity failures (a process vanishing mid-walk) never show up here: they
// are absorbed inside the process sampler. Everything below reaches the
// lifecycle controller.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// None of the requested interfaces exist on this host.
    #[error("no NIC to monitor")]
    NoInterfaces,

    /// A process-set sampler was requested without a command or pids.
    #[error("process set sampler needs either a command or a set of PIDs")]
    NoProcessTarget,

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open output {}: {source}", path.display())]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write to {target}: {source}")]
    Write {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Host-wide counters could not be queried.
    #[error("host counters unavailable: {0}")]
    Host(String),

    #[error("{target}: row has {got} fields, header has {expected}")]
    RowArity {
        target: String,
        expected: usize,
        got: usize,
    },
}

impl SamplerError {
    /// Configuration errors are detected at construction, before any row is written.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::NoInterfaces | Self::NoProcessTarget)
    }
}

pub type Result<T> = std::result::Result<T, SamplerError>;
