use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::clip::decoder::{DecodeStatus, Decoder};

/// One thread per detached decoder, each filling its clip's fifo until stopped.
///
/// A worker sleeps for `idle_sleep` whenever its fifo is full or its source has nothing more
/// to give. Decoders whose thread could not be spawned are kept and handed back by
/// [`DecodeWorkers::stop`] with the rest.
pub(crate) struct DecodeWorkers {
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<Option<Decoder>>>,
    unspawned: Vec<Decoder>,
}

impl DecodeWorkers {
    pub(crate) fn spawn(decoders: Vec<Decoder>, idle_sleep: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let mut threads = Vec::with_capacity(decoders.len());
        let mut unspawned = Vec::new();

        for decoder in decoders {
            let (tx, rx) = crossbeam_channel::bounded::<Decoder>(1);
            let flag = Arc::clone(&stop);
            let name = format!("montage-decode-{}", decoder.clip_id().0);
            let spawned = thread::Builder::new()
                .name(name)
                .spawn(move || {
                    let decoder = rx.recv().ok()?;
                    Some(worker_loop(decoder, &flag, idle_sleep))
                });
            match spawned {
                Ok(handle) => {
                    if let Err(e) = tx.send(decoder) {
                        unspawned.push(e.into_inner());
                    }
                    threads.push(handle);
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to spawn decode worker; clip will starve");
                    unspawned.push(decoder);
                }
            }
        }
        tracing::debug!(workers = threads.len(), "decode workers started");
        Self {
            stop,
            threads,
            unspawned,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.threads.len()
    }

    /// Signal every worker, join them and return all decoders.
    pub(crate) fn stop(mut self) -> Vec<Decoder> {
        self.stop.store(true, Ordering::Release);
        let mut decoders = std::mem::take(&mut self.unspawned);
        for handle in self.threads.drain(..) {
            match handle.join() {
                Ok(Some(d)) => decoders.push(d),
                Ok(None) => {}
                Err(_) => tracing::error!("decode worker panicked; its decoder is lost"),
            }
        }
        tracing::debug!(decoders = decoders.len(), "decode workers stopped");
        decoders
    }
}

impl Drop for DecodeWorkers {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(mut decoder: Decoder, stop: &AtomicBool, idle_sleep: Duration) -> Decoder {
    while !stop.load(Ordering::Acquire) {
        match decoder.step() {
            DecodeStatus::Progressed(_) => {}
            DecodeStatus::Full | DecodeStatus::Idle => thread::sleep(idle_sleep),
        }
    }
    decoder
}

#[cfg(test)]
#[path = "../../tests/unit/engine/playback.rs"]
mod tests;
