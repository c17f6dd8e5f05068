//! Supervised periodic sweep task.
//!
//! Runs [`AnnouncementGate::sweep`] on a dedicated thread with fixed-delay
//! pacing: the full period elapses after each sweep completes, so a slow
//! sweep delays the next one instead of overlapping it. `stop()` flips the
//! shutdown flag and joins the thread.

use anyhow::{anyhow, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::gate::AnnouncementGate;

/// Default sweep period.
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_millis(1000);

pub struct AnnouncementSweeper;

/// Handle to a running sweeper. Dropping it without calling `stop()` leaves
/// the thread running for the process lifetime.
pub struct SweeperHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl AnnouncementSweeper {
    pub fn spawn(gate: Arc<AnnouncementGate>, period: Duration) -> SweeperHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let join = thread::spawn(move || {
            info!("announcement sweeper running (period {:?})", period);
            while !flag.load(Ordering::SeqCst) {
                let stats = gate.sweep();
                if stats.opened > 0 || stats.closed > 0 || stats.suppressed > 0 {
                    debug!(
                        "sweep: {} tracked, {} opened, {} closed, {} suppressed",
                        stats.tracked, stats.opened, stats.closed, stats.suppressed
                    );
                }
                sleep_with_shutdown(&flag, period);
            }
            info!("announcement sweeper stopped");
        });

        SweeperHandle {
            shutdown,
            join: Some(join),
        }
    }
}

impl SweeperHandle {
    /// Signal shutdown and join the sweep thread.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("announcement sweeper thread panicked"))?;
        }
        Ok(())
    }
}

/// Sleep up to `period`, waking early when the shutdown flag flips. Chunked
/// so `stop()` is honored promptly even with long periods.
fn sleep_with_shutdown(flag: &AtomicBool, period: Duration) {
    let chunk = Duration::from_millis(50);
    let mut remaining = period;
    while !flag.load(Ordering::SeqCst) && !remaining.is_zero() {
        let step = remaining.min(chunk);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::gate::GateConfig;
    use std::time::Instant;

    #[test]
    fn sweeper_arms_quiet_identity() -> Result<()> {
        let gate = Arc::new(AnnouncementGate::new(GateConfig {
            window: Duration::from_millis(20),
            threshold: 5,
            ..GateConfig::default()
        }));
        let handle = AnnouncementSweeper::spawn(Arc::clone(&gate), Duration::from_millis(5));

        gate.record_detection(Some("alice"), Some(25.0), Instant::now());

        // One record, then silence well past the window: some sweep must
        // open the gate.
        let deadline = Instant::now() + Duration::from_secs(2);
        while !gate.armed("alice") && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(gate.armed("alice"));

        handle.stop()
    }

    #[test]
    fn stop_returns_promptly_despite_long_period() -> Result<()> {
        let gate = Arc::new(AnnouncementGate::default());
        let handle = AnnouncementSweeper::spawn(gate, Duration::from_secs(60));

        let started = Instant::now();
        handle.stop()?;
        assert!(started.elapsed() < Duration::from_secs(2));
        Ok(())
    }
}
