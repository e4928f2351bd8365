//! Playback queue shared between control threads and the audio callback
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  insert()   ┌─────────────────────┐
//! │  Control threads │────────────►│   Insertion ring    │
//! │ (play, any thread)│  (mutex on │  (rtrb, wait-free)  │
//! └──────────────────┘  producer)  └──────────┬──────────┘
//!                                             │ pop() at the start of each pass
//!                                             ▼
//!                                  ┌─────────────────────┐
//!                                  │    Active arena     │
//!                                  │ (Vec, pre-reserved, │
//!                                  │ callback-owned)     │
//!                                  └─────────────────────┘
//! ```
//!
//! Control threads only ever touch the producer half of the ring. The audio
//! callback owns the consumer half and the active arena exclusively, so
//! iteration and pruning never race with insertion and nothing is freed while
//! another thread can still read it.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use crate::gc::gc_handle;
use crate::sound::{Samples, SharedSound};

/// Application-visible "still playing" flag for one `play()` call
///
/// `play()` raises the flag; the callback lowers it exactly once when that
/// entry finishes. Cloning shares the same flag. Passing one flag to several
/// `play()` calls is allowed, but it then tracks whichever entry finishes
/// first, not the group.
#[derive(Clone)]
pub struct CompletionFlag {
    playing: Shared<AtomicBool>,
}

impl CompletionFlag {
    pub fn new() -> Self {
        Self {
            playing: Shared::new(&gc_handle(), AtomicBool::new(false)),
        }
    }

    /// True from `play()` until the sound's last period has been mixed
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }
}

impl Default for CompletionFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompletionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionFlag")
            .field("playing", &self.is_playing())
            .finish()
    }
}

/// Lock-free queue counters, readable from any thread
#[derive(Debug, Default)]
pub struct QueueStats {
    inserted: AtomicU64,
    pruned: AtomicU64,
    active: AtomicUsize,
}

impl QueueStats {
    /// Entries accepted by `insert()` so far
    #[inline]
    pub fn inserted(&self) -> u64 {
        self.inserted.load(Ordering::Acquire)
    }

    /// Entries removed by `prune_finished()` so far
    #[inline]
    pub fn pruned(&self) -> u64 {
        self.pruned.load(Ordering::Acquire)
    }

    /// Entries mixed during the most recent pass
    #[inline]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Entries in flight (pending in the ring or active in the arena)
    #[inline]
    pub fn live(&self) -> u64 {
        self.inserted().saturating_sub(self.pruned())
    }
}

/// One in-progress playback of a shared sound
pub struct QueueEntry {
    source: SharedSound,
    cursor: usize,
    completion: Option<CompletionFlag>,
}

impl QueueEntry {
    pub fn new(source: SharedSound, cursor: usize, completion: Option<CompletionFlag>) -> Self {
        Self {
            source,
            cursor,
            completion,
        }
    }

    /// Next sample index to mix
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total samples in the source sound
    #[inline]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// The cursor has reached (or overshot) the end of the source
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.source.len()
    }

    pub fn completion(&self) -> Option<&CompletionFlag> {
        self.completion.as_ref()
    }

    /// Lower the completion flag; `take()` makes a second call a no-op
    #[inline]
    fn signal_finished(&mut self) {
        if let Some(flag) = self.completion.take() {
            flag.set(false);
        }
    }
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("cursor", &self.cursor)
            .field("len", &self.len())
            .finish()
    }
}

/// Create a playback queue with room for `capacity` entries in flight
///
/// Returns the control-side producer and the callback-side queue.
pub fn playback_queue(capacity: usize) -> (QueueProducer, PlaybackQueue) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    let stats = Arc::new(QueueStats::default());

    let producer = QueueProducer {
        producer,
        stats: stats.clone(),
    };
    let queue = PlaybackQueue {
        pending: consumer,
        active: Vec::with_capacity(capacity),
        capacity,
        stats,
    };
    (producer, queue)
}

/// Why an entry could not be inserted
#[derive(Debug)]
pub enum InsertError {
    /// The ring has no free slot; the entry is handed back
    Full(QueueEntry),
    /// The callback side of the queue has been dropped
    ///
    /// The entry may already sit in the ring. It is freed with the producer
    /// and will never be mixed.
    Closed,
}

/// Control-side half of the queue
pub struct QueueProducer {
    producer: rtrb::Producer<QueueEntry>,
    stats: Arc<QueueStats>,
}

impl QueueProducer {
    /// Insert an entry (wait-free, never blocks the callback)
    ///
    /// `Ok` means the callback side was still alive after the push, so the
    /// entry will be mixed.
    pub fn insert(&mut self, entry: QueueEntry) -> Result<(), InsertError> {
        if self.producer.is_abandoned() {
            return Err(InsertError::Closed);
        }

        // Count before publishing so `live()` can't observe a prune first
        self.stats.inserted.fetch_add(1, Ordering::AcqRel);
        if let Err(rtrb::PushError::Full(entry)) = self.producer.push(entry) {
            self.stats.inserted.fetch_sub(1, Ordering::AcqRel);
            return Err(InsertError::Full(entry));
        }

        // The consumer may have gone between the check and the push
        if self.producer.is_abandoned() {
            self.stats.inserted.fetch_sub(1, Ordering::AcqRel);
            return Err(InsertError::Closed);
        }
        Ok(())
    }

    /// Free insertion slots right now
    pub fn free_slots(&self) -> usize {
        self.producer.slots()
    }

    pub fn stats(&self) -> &Arc<QueueStats> {
        &self.stats
    }
}

/// Callback-side half of the queue
///
/// Only the audio callback may hold this; every method here runs on the
/// audio thread and is allocation-free.
pub struct PlaybackQueue {
    pending: rtrb::Consumer<QueueEntry>,
    active: Vec<QueueEntry>,
    /// Arena bound; `Vec::capacity` may round up
    capacity: usize,
    stats: Arc<QueueStats>,
}

impl PlaybackQueue {
    /// Move newly inserted entries into the arena, as far as capacity allows
    ///
    /// Anything that doesn't fit stays in the ring for a later pass.
    fn admit_pending(&mut self) {
        while self.active.len() < self.capacity {
            match self.pending.pop() {
                Ok(entry) => self.active.push(entry),
                Err(_) => break,
            }
        }
    }

    /// Apply `mix` to every active entry, oldest first
    ///
    /// `mix` receives the entry's samples and cursor and returns how far to
    /// advance the cursor.
    pub fn for_each_active<F>(&mut self, mut mix: F)
    where
        F: FnMut(&Samples, usize) -> usize,
    {
        self.admit_pending();
        self.stats.active.store(self.active.len(), Ordering::Relaxed);

        for entry in &mut self.active {
            let advance = mix(entry.source.samples(), entry.cursor);
            entry.cursor = entry.cursor.saturating_add(advance);
        }
    }

    /// Remove every entry whose cursor reached its source length
    ///
    /// Each removed entry lowers its completion flag exactly once. Returns the
    /// number of entries pruned.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.active.len();

        // retain_mut keeps order and never reallocates
        self.active.retain_mut(|entry| {
            if entry.is_finished() {
                entry.signal_finished();
                false
            } else {
                true
            }
        });

        let pruned = before - self.active.len();
        if pruned > 0 {
            self.stats.pruned.fetch_add(pruned as u64, Ordering::AcqRel);
        }
        pruned
    }

    /// Entries currently in the active arena
    #[inline]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn stats(&self) -> &Arc<QueueStats> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::SoundBuffer;
    use std::sync::Mutex;
    use std::thread;

    fn sound(len: usize) -> SharedSound {
        SoundBuffer::from_f32(vec![1.0; len]).into_shared()
    }

    #[test]
    fn test_insert_iterate_prune() {
        let (mut tx, mut queue) = playback_queue(8);
        let flag = CompletionFlag::new();
        flag.set(true);

        tx.insert(QueueEntry::new(sound(6), 0, Some(flag.clone())))
            .unwrap();
        assert_eq!(tx.stats().live(), 1);

        let mut seen = Vec::new();
        queue.for_each_active(|samples, cursor| {
            seen.push((samples.len(), cursor));
            4
        });
        assert_eq!(seen, vec![(6, 0)]);
        assert_eq!(queue.prune_finished(), 0);
        assert!(flag.is_playing());

        queue.for_each_active(|_, cursor| {
            assert_eq!(cursor, 4);
            4
        });
        assert_eq!(queue.prune_finished(), 1);
        assert!(!flag.is_playing());
        assert!(queue.is_empty());
        assert_eq!(queue.stats().live(), 0);
        assert_eq!(queue.stats().pruned(), 1);
    }

    #[test]
    fn test_flag_lowered_only_once() {
        let (mut tx, mut queue) = playback_queue(4);
        let flag = CompletionFlag::new();
        flag.set(true);
        tx.insert(QueueEntry::new(sound(1), 0, Some(flag.clone())))
            .unwrap();

        queue.for_each_active(|_, _| 4);
        queue.prune_finished();
        assert!(!flag.is_playing());

        // Application reuses the flag; nothing left in the queue may touch it
        flag.set(true);
        queue.for_each_active(|_, _| 4);
        assert_eq!(queue.prune_finished(), 0);
        assert!(flag.is_playing());
    }

    #[test]
    fn test_full_ring_hands_entry_back() {
        let (mut tx, _queue) = playback_queue(2);
        assert!(tx.insert(QueueEntry::new(sound(1), 0, None)).is_ok());
        assert!(tx.insert(QueueEntry::new(sound(1), 0, None)).is_ok());
        assert_eq!(tx.free_slots(), 0);

        match tx.insert(QueueEntry::new(sound(3), 0, None)) {
            Err(InsertError::Full(entry)) => assert_eq!(entry.len(), 3),
            other => panic!("expected a full ring, got {:?}", other),
        }
        assert_eq!(tx.stats().inserted(), 2);
    }

    #[test]
    fn test_closed_queue_rejects_inserts() {
        let (mut tx, queue) = playback_queue(2);
        drop(queue);
        assert!(matches!(
            tx.insert(QueueEntry::new(sound(1), 0, None)),
            Err(InsertError::Closed)
        ));
        assert_eq!(tx.stats().inserted(), 0);
    }

    #[test]
    fn test_insert_racing_teardown_never_reports_success() {
        // The callback side may vanish at any point during insert(); an Ok
        // must always mean the consumer outlived the push.
        for round in 0..200 {
            let (mut tx, queue) = playback_queue(4);
            let teardown = thread::spawn(move || {
                if round % 2 == 0 {
                    thread::yield_now();
                }
                drop(queue);
            });

            let mut accepted = 0;
            for _ in 0..4 {
                match tx.insert(QueueEntry::new(sound(1), 0, None)) {
                    Ok(()) => accepted += 1,
                    Err(InsertError::Closed) => break,
                    Err(InsertError::Full(_)) => unreachable!("ring has room for every insert"),
                }
            }
            teardown.join().unwrap();

            assert!(tx.insert(QueueEntry::new(sound(1), 0, None)).is_err());
            assert_eq!(tx.stats().inserted(), accepted);
        }
    }

    #[test]
    fn test_shared_flag_tracks_first_finisher() {
        let (mut tx, mut queue) = playback_queue(4);
        let flag = CompletionFlag::new();
        flag.set(true);
        tx.insert(QueueEntry::new(sound(2), 0, Some(flag.clone()))).unwrap();
        tx.insert(QueueEntry::new(sound(6), 0, Some(flag.clone()))).unwrap();

        queue.for_each_active(|_, _| 2);
        assert_eq!(queue.prune_finished(), 1);
        assert!(!flag.is_playing());
        assert_eq!(queue.len(), 1);

        queue.for_each_active(|_, _| 4);
        assert_eq!(queue.prune_finished(), 1);
        assert!(!flag.is_playing());
    }

    #[test]
    fn test_entries_wait_when_arena_is_full() {
        let (mut tx, mut queue) = playback_queue(2);
        tx.insert(QueueEntry::new(sound(8), 0, None)).unwrap();
        tx.insert(QueueEntry::new(sound(8), 0, None)).unwrap();
        queue.for_each_active(|_, _| 1);
        assert_eq!(queue.len(), 2);

        // Ring has room again but the arena doesn't
        tx.insert(QueueEntry::new(sound(8), 0, None)).unwrap();
        queue.for_each_active(|_, _| 1);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().live(), 3);

        // Finishing both makes room; the waiting entry is admitted next pass
        queue.for_each_active(|_, _| 8);
        assert_eq!(queue.prune_finished(), 2);
        queue.for_each_active(|_, cursor| {
            assert_eq!(cursor, 0);
            1
        });
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_overshoot_is_pruned() {
        let (mut tx, mut queue) = playback_queue(4);
        let entry = QueueEntry::new(sound(5), 0, None);
        assert!(!entry.is_finished());
        tx.insert(entry).unwrap();

        queue.for_each_active(|_, _| 4);
        assert_eq!(queue.prune_finished(), 0);
        // Cursor 8 overshoots length 5 by three samples
        queue.for_each_active(|_, _| 4);
        assert_eq!(queue.prune_finished(), 1);
    }

    #[test]
    fn test_concurrent_inserts_are_never_lost() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 200;

        let (tx, mut queue) = playback_queue(64);
        let tx = Arc::new(Mutex::new(tx));
        let flags: Arc<Vec<CompletionFlag>> =
            Arc::new((0..THREADS * PER_THREAD).map(|_| CompletionFlag::new()).collect());

        let producers: Vec<_> = (0..THREADS)
            .map(|t| {
                let tx = tx.clone();
                let flags = flags.clone();
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let flag = flags[t * PER_THREAD + i].clone();
                        flag.set(true);
                        let mut entry = QueueEntry::new(sound(1 + i % 5), 0, Some(flag));
                        loop {
                            match tx.lock().unwrap().insert(entry) {
                                Ok(()) => break,
                                Err(InsertError::Full(back)) => entry = back,
                                Err(InsertError::Closed) => unreachable!(),
                            }
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let stats = queue.stats().clone();
        let mut total_pruned = 0;
        while total_pruned < THREADS * PER_THREAD {
            queue.for_each_active(|_, _| 2);
            total_pruned += queue.prune_finished();
            let pruned = stats.pruned();
            assert!(pruned <= stats.inserted());
        }

        for handle in producers {
            handle.join().unwrap();
        }

        assert_eq!(stats.inserted(), (THREADS * PER_THREAD) as u64);
        assert_eq!(stats.pruned(), (THREADS * PER_THREAD) as u64);
        assert!(queue.is_empty());
        assert!(flags.iter().all(|f| !f.is_playing()));
    }
}
