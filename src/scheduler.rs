// Fixed-cadence tick loop.
//
// Deadlines are absolute (`anchor + k * interval`), never "interval after the
// previous tick finished". A late tick runs as soon as possible and the next one
// still targets its original slot. Ticks never overlap and are never cut short:
// shutdown is only observed between ticks.

use crate::error::Result;
use crate::sampler::Sampler;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

/// Deadline of tick `k` (1-based) for a loop anchored at `anchor`.
pub fn deadline(anchor: Instant, interval: Duration, k: u64) -> Instant {
    let nanos = interval.as_nanos().saturating_mul(k as u128);
    anchor + Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Indices of `samplers` in tick order: by priority, then registration order.
fn tick_order(samplers: &[Box<dyn Sampler>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..samplers.len()).collect();
    order.sort_by_key(|&i| samplers[i].priority());
    order
}

/// Runs ticks until `shutdown_rx` fires (or its sender is dropped) and returns the
/// number of completed ticks. The first sampler error stops the loop and is returned.
#[instrument(skip_all, fields(interval_ms = interval.as_millis() as u64, samplers = samplers.len()))]
pub async fn run(
    samplers: &mut [Box<dyn Sampler>],
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> Result<u64> {
    let order = tick_order(samplers);
    let anchor = Instant::now();
    let mut ticks: u64 = 0;

    loop {
        let due = deadline(anchor, interval, ticks + 1);
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                debug!(ticks, "Scheduler shutting down");
                break;
            }
            _ = tokio::time::sleep_until(due) => {}
        }

        let at = Utc::now();
        for &i in &order {
            let sampler = &mut samplers[i];
            trace!(sampler = sampler.name(), "sample");
            sampler.sample(at)?;
        }
        ticks += 1;

        let late_by = Instant::now().saturating_duration_since(due);
        if late_by > interval {
            debug!(
                ticks,
                late_ms = late_by.as_millis() as u64,
                "tick overran its interval; catching up"
            );
        }
    }
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_are_multiples_of_the_interval() {
        let anchor = Instant::now();
        let interval = Duration::from_millis(250);
        assert_eq!(deadline(anchor, interval, 0), anchor);
        assert_eq!(deadline(anchor, interval, 4) - anchor, Duration::from_secs(1));
        assert_eq!(
            deadline(anchor, interval, 1_000_000) - anchor,
            Duration::from_secs(250_000)
        );
    }
}
