//! Background maintenance thread.
//!
//! Runs [`StorageEngine::maintain`] at a fixed interval until told to stop.
//! The stop signal is a bounded crossbeam channel; dropping the sender also
//! ends the loop, so a leaked [`Maintainer`] still exits once every sender
//! is gone.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::engine::StorageEngine;
use crate::metrics::MaintenanceTotals;

pub(crate) fn maintainer_loop(
    engine: StorageEngine,
    stop: Receiver<()>,
    interval: Duration,
) -> MaintenanceTotals {
    let mut totals = MaintenanceTotals::default();
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let report = engine.maintain();
                totals.record(&report);
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    // One last pass so nothing reclaimable is left behind at shutdown.
    totals.record(&engine.maintain());
    log::debug!(
        "maintainer stopped after {} passes, {} chunks recycled",
        totals.passes,
        totals.chunks_recycled
    );
    totals
}

/// Handle to a running maintenance thread.
///
/// Stops and joins the thread on [`stop`](Self::stop) or drop.
pub struct Maintainer {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<MaintenanceTotals>>,
}

impl Maintainer {
    pub(crate) fn new(stop_tx: Sender<()>, thread: JoinHandle<MaintenanceTotals>) -> Self {
        Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }

    /// Stop the thread and return what it reclaimed.
    ///
    /// If the thread panicked, returns empty totals.
    pub fn stop(mut self) -> MaintenanceTotals {
        self.shutdown()
    }

    fn shutdown(&mut self) -> MaintenanceTotals {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(totals)) => totals,
            Some(Err(_)) => {
                log::warn!("maintainer thread panicked");
                MaintenanceTotals::default()
            }
            None => MaintenanceTotals::default(),
        }
    }
}

impl Drop for Maintainer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
