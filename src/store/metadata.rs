//! The process-wide sequence counter and its flush lifecycle.
//!
//! `next_sequence` must stay strictly increasing across restarts. Density
//! is not required: the store persists a reservation strictly ahead of any
//! value it hands out, so a crash loses at most one window of sequence
//! numbers and never replays a consumed one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::store::Store;

/// Shared sequence state. `reserved` tracks the value most recently
/// persisted; handing out anything at or past it requires a new
/// reservation first.
pub struct Metadata {
    seq: AtomicU64,
    reserved: AtomicU64,
    dirty: AtomicBool,
}

impl Metadata {
    pub fn new(persisted_seq: u64) -> Self {
        Self {
            seq: AtomicU64::new(persisted_seq),
            reserved: AtomicU64::new(persisted_seq),
            dirty: AtomicBool::new(false),
        }
    }

    /// Hand out the next sequence value and mark the metadata dirty. The
    /// caller (the store) is responsible for reserving ahead of use.
    pub fn next(&self) -> u64 {
        self.dirty.store(true, Ordering::Relaxed);
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    pub fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::SeqCst)
    }

    pub fn set_reserved(&self, value: u64) {
        self.reserved.store(value, Ordering::SeqCst);
    }

    pub fn dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Relaxed);
    }
}

/// Periodic metadata flusher.
///
/// The thread holds a weak store reference: the engine owns both and stops
/// the flusher before the store tears down; if the store is already gone
/// the thread exits on its own.
pub struct MetadataFlusher {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MetadataFlusher {
    pub fn spawn(store: Weak<Store>, interval: Duration) -> Self {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("maildex-meta-flush".to_string())
            .spawn(move || {
                let (lock, cv) = &*thread_stop;
                loop {
                    {
                        let mut stopped = lock.lock();
                        if *stopped {
                            break;
                        }
                        cv.wait_for(&mut stopped, interval);
                        if *stopped {
                            break;
                        }
                    }
                    match store.upgrade() {
                        Some(store) => {
                            if let Err(e) = store.sync_metadata() {
                                warn!("periodic metadata flush failed: {}", e);
                            } else {
                                debug!("periodic metadata flush");
                            }
                        }
                        None => break,
                    }
                }
            })
            .expect("failed to spawn metadata flusher thread");

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(&mut self) {
        {
            let (lock, cv) = &*self.stop;
            let mut stopped = lock.lock();
            *stopped = true;
            cv.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MetadataFlusher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_is_monotonic_and_dirties() {
        let meta = Metadata::new(10);
        assert!(!meta.dirty());
        assert_eq!(meta.next(), 10);
        assert_eq!(meta.next(), 11);
        assert_eq!(meta.current(), 12);
        assert!(meta.dirty());

        meta.clear_dirty();
        assert!(!meta.dirty());
    }

    #[test]
    fn test_reservation_tracking() {
        let meta = Metadata::new(0);
        assert_eq!(meta.reserved(), 0);
        meta.set_reserved(8192);
        assert_eq!(meta.reserved(), 8192);
    }
}
