//! Background reclamation of expired entries.
//!
//! Readers never depend on this: expired entries are already invisible. The
//! expirer only bounds how long unread, expired entries occupy space.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sett_common::{SettError, SettResult, keyspace_bounds};
use tracing::{debug, warn};

use crate::engine::Store;
use crate::expiry;

/// Handle to a running expirer thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct ExpirerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ExpirerHandle {
    /// Stops the expirer and waits for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the thread with `Disconnected`.
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("expirer thread panicked");
            }
        }
    }
}

impl Drop for ExpirerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Removes every expired entry in the store, across all tables.
pub fn purge_all<S: Store>(store: &S) -> SettResult<usize> {
    let bounds = keyspace_bounds();
    store.update(|tx| expiry::purge_range(tx, &bounds, expiry::now_millis()))
}

/// Starts a thread that calls [`purge_all`] every `interval`.
///
/// # Errors
///
/// Returns `SettError::InvalidInput` for a zero interval and
/// `SettError::Internal` if the thread cannot be spawned.
pub fn start<S>(store: Arc<S>, interval: Duration) -> SettResult<ExpirerHandle>
where
    S: Store + 'static,
{
    if interval.is_zero() {
        return Err(SettError::InvalidInput(
            "expirer interval must be greater than zero".to_string(),
        ));
    }

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let thread = thread::Builder::new()
        .name("sett-expirer".to_string())
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => match purge_all(&*store) {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "expirer purged entries"),
                    Err(err) => warn!(error = %err, "expirer pass failed"),
                },
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })
        .map_err(|err| SettError::Internal(format!("failed to spawn expirer: {err}")))?;

    Ok(ExpirerHandle {
        stop_tx: Some(stop_tx),
        thread: Some(thread),
    })
}
