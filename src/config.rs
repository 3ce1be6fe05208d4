// Configuration: command line (clap), optionally layered over a TOML file.

use clap::{ArgAction, Parser};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Monitor system-wide resource availability or resource usage of target processes.
#[derive(Debug, Parser)]
#[command(name = "resmon", version, about)]
pub struct Cli {
    /// Interval, in seconds, between polls.
    #[arg(short = 'd', long = "interval", visible_alias = "delay", value_name = "SECS")]
    pub interval: Option<f64>,

    /// Flush every output after each line is written.
    #[arg(short, long)]
    pub flush: bool,

    /// System monitor output file. Standard output when unset.
    #[arg(
        short = 'o',
        long = "system-output",
        visible_alias = "outfile",
        value_name = "PATH"
    )]
    pub system_output: Option<PathBuf>,

    /// Comma-separated NICs to monitor.
    #[arg(
        short = 'n',
        long = "interfaces",
        visible_alias = "nic",
        value_delimiter = ',',
        value_name = "NICS"
    )]
    pub interfaces: Option<Vec<String>>,

    /// NIC output file name; "{nic}" is replaced by the interface name.
    #[arg(long, visible_alias = "nic-outfile", value_name = "PATTERN")]
    pub interface_output_pattern: Option<String>,

    /// Launch the command given after `--` and monitor its process tree.
    #[arg(long, visible_alias = "ps-cmd")]
    pub watch_command: bool,

    /// Monitor the given PIDs and their children.
    #[arg(long, visible_alias = "ps-pids", num_args = 0.., value_name = "PID")]
    pub watch_pids: Option<Vec<u32>>,

    /// Output file for the launched command's process tree.
    #[arg(long, visible_alias = "ps-cmd-outfile", value_name = "PATH")]
    pub command_output: Option<PathBuf>,

    /// Output file for the PID process trees.
    #[arg(long, visible_alias = "ps-pid-outfile", value_name = "PATH")]
    pub pid_output: Option<PathBuf>,

    /// Niceness to request for the monitor itself (e.g. -20).
    #[arg(long, allow_negative_numbers = true, value_name = "N")]
    pub nice: Option<i32>,

    /// TOML configuration file; command-line options take precedence.
    #[arg(short = 'c', long, env = "RESMON_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Command to launch and monitor.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub sampling: SamplingConfig,
    pub system: SystemConfig,
    pub network: NetworkConfig,
    pub process: ProcessConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    pub interval_secs: f64,
    pub flush: bool,
    pub nice: Option<i32>,
}

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const MIN_INTERVAL: Duration = Duration::from_millis(1);
const MAX_INTERVAL: Duration = Duration::from_secs(86_400);

fn checked_interval(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| (MIN_INTERVAL..=MAX_INTERVAL).contains(d))
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL.as_secs_f64(),
            flush: false,
            nice: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    /// Standard output when unset.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Empty disables the NIC sampler.
    pub interfaces: Vec<String>,
    pub output_pattern: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            output_pattern: "netstat.{nic}.csv".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessConfig {
    /// Empty disables the command sampler.
    pub command: Vec<String>,
    /// `None` disables the PID sampler.
    pub pids: Option<Vec<u32>>,
    pub command_output: PathBuf,
    pub pid_output: PathBuf,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            pids: None,
            command_output: "psstat_cmd.csv".into(),
            pid_output: "psstat_pid.csv".into(),
        }
    }
}

impl AppConfig {
    /// Loads the file named on the command line (if any), then applies the
    /// command-line overrides and validates the result.
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let mut config = match cli.config.as_deref() {
            Some(path) => Self::load_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("config {}: {}", path.display(), e))?;
        Self::parse_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config = Self::parse_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Command-line values win over file values.
    pub fn apply_cli(&mut self, cli: Cli) {
        if let Some(interval) = cli.interval {
            self.sampling.interval_secs = interval;
        }
        self.sampling.flush |= cli.flush;
        if cli.nice.is_some() {
            self.sampling.nice = cli.nice;
        }
        if cli.system_output.is_some() {
            self.system.output = cli.system_output;
        }
        if let Some(interfaces) = cli.interfaces {
            self.network.interfaces = interfaces;
        }
        if let Some(pattern) = cli.interface_output_pattern {
            self.network.output_pattern = pattern;
        }
        if cli.watch_pids.is_some() {
            self.process.pids = cli.watch_pids;
        }
        if let Some(path) = cli.command_output {
            self.process.command_output = path;
        }
        if let Some(path) = cli.pid_output {
            self.process.pid_output = path;
        }

        if !cli.command.is_empty() {
            if !cli.watch_command {
                tracing::warn!(
                    "process monitor is not enabled but a target command is provided; enabling it"
                );
            }
            self.process.command = cli.command;
        } else if cli.watch_command && self.process.command.is_empty() {
            tracing::warn!("--watch-command is given but the command is missing; disabling it");
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            checked_interval(self.sampling.interval_secs).is_some(),
            "sampling.interval_secs must be between {} and {}, got {}",
            MIN_INTERVAL.as_secs_f64(),
            MAX_INTERVAL.as_secs_f64(),
            self.sampling.interval_secs
        );
        if let Some(nice) = self.sampling.nice {
            anyhow::ensure!(
                (-20..=19).contains(&nice),
                "sampling.nice must be between -20 and 19, got {}",
                nice
            );
        }
        if let Some(output) = &self.system.output {
            anyhow::ensure!(
                !output.as_os_str().is_empty(),
                "system.output must be non-empty when set"
            );
        }
        if self.network_enabled() {
            anyhow::ensure!(
                self.network.output_pattern.contains("{nic}"),
                "network.output_pattern must contain \"{{nic}}\", got {:?}",
                self.network.output_pattern
            );
        }
        anyhow::ensure!(
            !self.process.command_output.as_os_str().is_empty(),
            "process.command_output must be non-empty"
        );
        anyhow::ensure!(
            !self.process.pid_output.as_os_str().is_empty(),
            "process.pid_output must be non-empty"
        );
        Ok(())
    }

    /// The validated sampling interval. Falls back to the default for a config
    /// that skipped validation.
    pub fn interval(&self) -> Duration {
        checked_interval(self.sampling.interval_secs).unwrap_or(DEFAULT_INTERVAL)
    }

    pub fn network_enabled(&self) -> bool {
        !self.network.interfaces.is_empty()
    }

    pub fn pid_sampler_enabled(&self) -> bool {
        self.process.pids.is_some()
    }

    pub fn command_sampler_enabled(&self) -> bool {
        !self.process.command.is_empty()
    }
}
