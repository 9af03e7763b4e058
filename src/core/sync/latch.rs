/*!
 * Reader-Writer Latch
 * Reentrant multi-reader/single-writer latch with per-thread hold tracking
 */

use crate::core::types::{current_thread_token, LockMode, ThreadToken};
use log::warn;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::Instant;

/// Per-latch hold bookkeeping, guarded by the latch mutex
#[derive(Debug, Default)]
struct LatchState {
    /// Thread currently holding the write side, if any
    writer: Option<ThreadToken>,
    /// Reentrant write hold count of `writer`
    writer_holds: u32,
    /// Read hold count per holding thread
    read_holds: HashMap<ThreadToken, u32, ahash::RandomState>,
    /// Writers parked on the write condvar; foreign readers wait while > 0
    waiting_writers: u32,
}

impl LatchState {
    #[inline]
    fn free_for_writer(&self) -> bool {
        self.writer.is_none() && self.read_holds.is_empty()
    }
}

/// Reentrant multi-reader/single-writer latch
///
/// Semantics match a `ReentrantReadWriteLock`:
/// - a thread may re-acquire the read or write side it already holds,
/// - the write holder may additionally take the read side,
/// - read→write upgrade is NOT supported and will block indefinitely
///   against other readers (callers must release and re-acquire).
///
/// Writer preference: while a writer is parked, foreign readers wait.
/// Threads already holding the latch bypass the barrier.
///
/// Identity matters to callers: the stripe pool hands out `Arc`s, and two
/// acquisitions of "the same latch" mean the same allocation.
#[derive(Debug, Default)]
pub struct CollectionLatch {
    state: Mutex<LatchState>,
    readers: Condvar,
    writers: Condvar,
}

impl CollectionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the read side, blocking until no foreign writer holds or
    /// waits on the latch
    ///
    /// Returns `false` if `deadline` elapsed before acquisition; there are
    /// no spurious failures.
    pub fn acquire_read(&self, deadline: Option<Instant>) -> bool {
        let me = current_thread_token();
        let mut state = self.state.lock();
        loop {
            let reentrant =
                state.read_holds.contains_key(&me) || state.writer == Some(me);
            if reentrant || (state.writer.is_none() && state.waiting_writers == 0) {
                *state.read_holds.entry(me).or_insert(0) += 1;
                return true;
            }
            if !self.park(&self.readers, &mut state, deadline) {
                return false;
            }
        }
    }

    /// Acquire the write side, blocking until no reader and no foreign
    /// writer holds the latch
    ///
    /// Returns `false` if `deadline` elapsed before acquisition.
    pub fn acquire_write(&self, deadline: Option<Instant>) -> bool {
        let me = current_thread_token();
        let mut state = self.state.lock();
        if state.writer == Some(me) {
            state.writer_holds += 1;
            return true;
        }
        state.waiting_writers += 1;
        loop {
            if state.free_for_writer() {
                state.waiting_writers -= 1;
                state.writer = Some(me);
                state.writer_holds = 1;
                return true;
            }
            if !self.park(&self.writers, &mut state, deadline) {
                state.waiting_writers -= 1;
                if state.waiting_writers == 0 {
                    // Lift the reader barrier we were part of
                    self.readers.notify_all();
                } else if state.free_for_writer() {
                    // Hand the wakeup we consumed to the next parked writer
                    self.writers.notify_one();
                }
                return false;
            }
        }
    }

    /// Release one read hold of the calling thread
    ///
    /// An unbalanced release is logged and ignored; release paths never
    /// panic.
    pub fn release_read(&self) {
        let me = current_thread_token();
        let mut state = self.state.lock();
        let remaining = match state.read_holds.get_mut(&me) {
            Some(holds) => {
                *holds -= 1;
                *holds
            }
            None => {
                warn!("unbalanced read release by thread {me}");
                return;
            }
        };
        if remaining == 0 {
            state.read_holds.remove(&me);
        }
        if state.read_holds.is_empty() && state.waiting_writers > 0 {
            self.writers.notify_one();
        }
    }

    /// Release one write hold of the calling thread
    pub fn release_write(&self) {
        let me = current_thread_token();
        let mut state = self.state.lock();
        if state.writer != Some(me) {
            warn!("unbalanced write release by thread {me}");
            return;
        }
        state.writer_holds -= 1;
        if state.writer_holds == 0 {
            state.writer = None;
            if state.waiting_writers > 0 {
                self.writers.notify_one();
            } else {
                self.readers.notify_all();
            }
        }
    }

    /// Mode-dispatched acquire
    #[inline]
    pub fn acquire(&self, mode: LockMode, deadline: Option<Instant>) -> bool {
        match mode {
            LockMode::Read => self.acquire_read(deadline),
            LockMode::Write => self.acquire_write(deadline),
        }
    }

    /// Mode-dispatched release
    #[inline]
    pub fn release(&self, mode: LockMode) {
        match mode {
            LockMode::Read => self.release_read(),
            LockMode::Write => self.release_write(),
        }
    }

    /// Whether `thread` currently holds the read side
    pub fn is_held_for_read_by(&self, thread: ThreadToken) -> bool {
        self.state.lock().read_holds.contains_key(&thread)
    }

    /// Whether `thread` currently holds the write side
    pub fn is_held_for_write_by(&self, thread: ThreadToken) -> bool {
        self.state.lock().writer == Some(thread)
    }

    /// Whether any thread holds the read side
    pub fn is_read_locked(&self) -> bool {
        !self.state.lock().read_holds.is_empty()
    }

    /// Whether any thread holds the write side
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer.is_some()
    }

    /// Number of distinct threads holding the read side
    pub fn reader_count(&self) -> usize {
        self.state.lock().read_holds.len()
    }

    /// Park on `condvar`, honoring the deadline; `false` means timed out
    #[inline]
    fn park(
        &self,
        condvar: &Condvar,
        state: &mut parking_lot::MutexGuard<'_, LatchState>,
        deadline: Option<Instant>,
    ) -> bool {
        match deadline {
            Some(deadline) => !condvar.wait_until(state, deadline).timed_out(),
            None => {
                condvar.wait(state);
                true
            }
        }
    }
}
