/*!
 * Active Expiration
 *
 * Lazy expiration only reclaims keys that are touched again. The expirer is
 * a background thread that periodically removes due keys in bounded rounds,
 * so the shard lock is never held for more than `sweep_batch` removals.
 */

use crate::config::Config;
use crate::shard::Shard;
use anyhow::Result;
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use log::{info, warn};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Handle to a running expirer thread
///
/// Dropping the handle stops the thread and waits for it to exit.
pub struct ExpirerHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// Spawn the background expirer for `shard`
///
/// # Arguments
/// * `shard` - Shard whose expired keys are reclaimed
/// * `config` - Supplies the sweep interval and per-round batch size
///
/// # Returns
/// * `ExpirerHandle` used to stop the thread
///
/// # Behavior
/// * Every `sweep_interval` one round removes up to `sweep_batch` keys
/// * A round that fills its batch is followed by another right away
pub fn spawn_expirer(shard: Arc<Shard>, config: &Config) -> Result<ExpirerHandle> {
    let (tx, rx) = bounded::<()>(1);
    let interval = config.sweep_interval;
    let batch = config.sweep_batch.max(1);

    let thread = std::thread::Builder::new()
        .name(format!("expirer-{}", shard.id))
        .spawn(move || {
            info!(
                "expirer for shard {} started (interval {:?}, batch {})",
                shard.id, interval, batch
            );
            loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        // a full round means more keys are likely due
                        while shard.sweep_expired(batch) == batch {}
                    }
                    // stop requested or every handle dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("expirer for shard {} stopped", shard.id);
        })?;

    Ok(ExpirerHandle {
        stop: Some(tx),
        thread: Some(thread),
    })
}

impl ExpirerHandle {
    /// Signal the thread and wait for it to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
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
