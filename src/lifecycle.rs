// Lifecycle controller: builds the samplers, runs the scheduler, closes everything once.
//
// Constructing -> Running -> ShuttingDown -> Closed. Samplers are closed in
// reverse construction order, exactly once, whether the loop ended on a
// termination signal or on a fatal sampler error.

use crate::config::AppConfig;
use crate::error::SamplerError;
use crate::sampler::{MonitorTarget, NetworkSampler, ProcessSetSampler, Sampler, SystemSampler};
use crate::scheduler;
use crate::sink::Destination;
use crate::sysinfo_repo::set_niceness;
use crate::version;
use anyhow::Context;
use chrono::Utc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Constructing,
    Running,
    ShuttingDown,
    Closed,
}

pub struct Controller {
    state: State,
    interval: Duration,
    samplers: Vec<Box<dyn Sampler>>,
}

impl Controller {
    /// Wraps already-constructed samplers, in construction order.
    pub fn from_samplers(samplers: Vec<Box<dyn Sampler>>, interval: Duration) -> Self {
        Self {
            state: State::Constructing,
            interval,
            samplers,
        }
    }

    /// Constructs every sampler the config asks for. On failure the samplers built
    /// so far are closed before the error is returned.
    pub fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let mut controller = Self::from_samplers(Vec::new(), config.interval());
        if let Err(e) = controller.construct(config) {
            if let Err(close_err) = controller.close_all() {
                warn!(error = %close_err, "close after failed construction");
            }
            return Err(e);
        }
        Ok(controller)
    }

    fn construct(&mut self, config: &AppConfig) -> anyhow::Result<()> {
        let flush = config.sampling.flush;

        let system = SystemSampler::new(&Destination::from_path(config.system.output.clone()), flush)
            .context("system monitor")?;
        self.samplers.push(Box::new(system));

        if config.network_enabled() {
            let network = NetworkSampler::new(
                &config.network.output_pattern,
                &config.network.interfaces,
                flush,
            )
            .context("NIC monitor")?;
            self.samplers.push(Box::new(network));
        }

        if let Some(pids) = &config.process.pids {
            let sampler = ProcessSetSampler::new(
                "psstat_pid",
                &Destination::File(config.process.pid_output.clone()),
                MonitorTarget::pids(pids.iter().copied()),
                flush,
            )
            .context("PID process monitor")?;
            self.samplers.push(Box::new(sampler));
        }

        if config.command_sampler_enabled() {
            let sampler = ProcessSetSampler::new(
                "psstat_cmd",
                &Destination::File(config.process.command_output.clone()),
                MonitorTarget::command(config.process.command.clone()),
                flush,
            )
            .context("command process monitor")?;
            self.samplers.push(Box::new(sampler));
        }
        Ok(())
    }

    /// Takes the first sample on every sampler; the controller is Running afterwards.
    pub fn prime(&mut self) -> Result<(), SamplerError> {
        let at = Utc::now();
        for sampler in &mut self.samplers {
            sampler.sample(at)?;
        }
        self.state = State::Running;
        info!(samplers = self.samplers.len(), "Monitoring started");
        Ok(())
    }

    /// Runs the tick loop until shutdown, then closes every sampler.
    /// A fatal sampler error is returned after the close, never replaced by a close error.
    pub async fn run(&mut self, shutdown_rx: oneshot::Receiver<()>) -> anyhow::Result<u64> {
        if self.state == State::Constructing
            && let Err(e) = self.prime()
        {
            self.log_close_failure();
            return Err(e.into());
        }
        let outcome = scheduler::run(&mut self.samplers, self.interval, shutdown_rx).await;
        match outcome {
            Ok(ticks) => {
                debug!(ticks, "Scheduler stopped");
                self.close_all()?;
                Ok(ticks)
            }
            Err(e) => {
                error!(error = %e, "sampling failed; shutting down");
                self.log_close_failure();
                Err(e.into())
            }
        }
    }

    fn log_close_failure(&mut self) {
        if let Err(close_err) = self.close_all() {
            error!(error = %close_err, "close during shutdown failed");
        }
    }

    /// Closes every sampler once, newest first. Keeps going past failures and returns
    /// the first one.
    pub fn close_all(&mut self) -> Result<(), SamplerError> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::ShuttingDown;
        let mut first_err = None;
        for sampler in self.samplers.iter_mut().rev() {
            if let Err(e) = sampler.close() {
                error!(sampler = sampler.name(), error = %e, "close failed");
                first_err.get_or_insert(e);
            }
        }
        self.state = State::Closed;
        first_err.map_or(Ok(()), Err)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            warn!(error = %e, "close on drop failed");
        }
    }
}

/// Turns the first SIGTERM or SIGINT into a one-shot cancellation.
///
/// Handlers are registered before returning, so a signal that arrives while the
/// samplers are still being built is held for the scheduler instead of killing
/// the process.
pub fn spawn_signal_listener() -> std::io::Result<oneshot::Receiver<()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        let _ = shutdown_tx.send(());
    });
    Ok(shutdown_rx)
}

/// Whole run: priority, signal handling, construction, sampling, shutdown.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("{} starting", version::banner());
    info!(
        "Config: interval={}s, flush={}, system_output={}, nics={:?}, pids={:?}, command={:?}",
        config.sampling.interval_secs,
        config.sampling.flush,
        Destination::from_path(config.system.output.clone()),
        config.network.interfaces,
        config.process.pids,
        config.process.command
    );

    if let Some(nice) = config.sampling.nice
        && let Err(e) = set_niceness(nice)
    {
        warn!(nice, error = %e, "failed to change priority");
    }

    let shutdown_rx = spawn_signal_listener().context("install signal handlers")?;
    let mut controller = Controller::build(&config)?;
    let ticks = controller.run(shutdown_rx).await?;
    info!(ticks, "Shutdown complete");
    Ok(())
}
