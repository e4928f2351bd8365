//! Deferred deallocation for sounds and flags released on the audio thread
//!
//! Entries in the playback queue hold `basedrop::Shared` clones of their sound
//! buffer and completion flag. When the callback prunes a finished entry and
//! that clone turns out to be the last one, the drop only enqueues a pointer;
//! the memory is freed by a background collector thread where latency doesn't
//! matter.
//!
//! The collector runs on a timer. [`flush`] forces a cycle, for callers that
//! need released sounds gone at a known point (shutdown, tests).

use basedrop::{Collector, Handle};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// How often the collector thread reclaims deferred drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(50);

/// Process-wide collector: its allocation handle and a flush request line
///
/// A flush request carries the sender the collector acknowledges on.
struct DeferredDrops {
    handle: Handle,
    flush: Sender<Sender<()>>,
}

static DEFERRED_DROPS: OnceLock<DeferredDrops> = OnceLock::new();

fn run_collector(mut collector: Collector, requests: mpsc::Receiver<Sender<()>>) {
    log::debug!("Deferred-drop collector started");
    loop {
        match requests.recv_timeout(COLLECT_INTERVAL) {
            Ok(ack) => {
                collector.collect();
                let _ = ack.send(());
            }
            Err(RecvTimeoutError::Timeout) => collector.collect(),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn start_collector() -> DeferredDrops {
    let (handle_tx, handle_rx) = mpsc::channel();
    let (flush, requests) = mpsc::channel();

    thread::Builder::new()
        .name("mixdown-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives and dies on this thread
            let collector = Collector::new();
            handle_tx
                .send(collector.handle())
                .expect("GC handle receiver dropped before startup");
            run_collector(collector, requests);
        })
        .expect("Failed to spawn mixdown GC thread");

    DeferredDrops {
        handle: handle_rx
            .recv()
            .expect("GC thread exited before sending its handle"),
        flush,
    }
}

/// Get a handle for creating `Shared<T>` allocations
///
/// The collector thread is started on first use. Handles are cheap to clone.
pub fn gc_handle() -> Handle {
    DEFERRED_DROPS.get_or_init(start_collector).handle.clone()
}

/// Block until the collector has run a full cycle
///
/// Everything whose last `Shared` reference was dropped before this call is
/// freed when it returns. Does nothing if the collector was never started.
pub fn flush() {
    let Some(drops) = DEFERRED_DROPS.get() else {
        return;
    };
    let (ack_tx, ack_rx) = mpsc::channel();
    if drops.flush.send(ack_tx).is_ok() {
        let _ = ack_rx.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Sets its flag when actually freed
    struct Tracked(Arc<AtomicBool>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_last_drop_on_another_thread_is_freed_by_collector() {
        let freed = Arc::new(AtomicBool::new(false));
        let value = Shared::new(&gc_handle(), Tracked(freed.clone()));
        let for_callback = value.clone();
        drop(value);

        // The last reference goes on a stand-in for the audio thread
        thread::spawn(move || drop(for_callback)).join().unwrap();

        flush();
        assert!(freed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_live_references_survive_flush() {
        let freed = Arc::new(AtomicBool::new(false));
        let value = Shared::new(&gc_handle(), Tracked(freed.clone()));
        let other = value.clone();
        drop(value);

        flush();
        assert!(!freed.load(Ordering::SeqCst));
        drop(other);
        flush();
        assert!(freed.load(Ordering::SeqCst));
    }
}
