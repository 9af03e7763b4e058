/*!
 * Lock Table
 * Process-wide ledger of lock activity, fanned out to listeners
 *
 * Every attempt/acquire/release in the manager is reported here. Events are
 * queued and delivered by one dedicated dispatcher thread, so emitters never
 * block on listener work and the listener registry is only ever mutated on
 * that thread. Events are diagnostic: when the bounded queue overflows the
 * oldest event is dropped and counted, while lifecycle commands are always
 * retained.
 */

mod events;

pub use events::{Action, LockAction, LockEventListener};

use crate::core::limits::EVENT_QUEUE_CAPACITY;
use crate::core::types::LockMode;
use crate::path::CollectionPath;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

/// Work items for the dispatcher thread
enum Command {
    Event(LockAction),
    Register(Arc<dyn LockEventListener>),
    Deregister(Arc<dyn LockEventListener>),
    Shutdown,
}

/// Bounded command queue; the capacity applies to events only
#[derive(Default)]
struct CommandQueue {
    commands: VecDeque<Command>,
    queued_events: usize,
}

struct Shared {
    queue: Mutex<CommandQueue>,
    available: Condvar,
    event_capacity: usize,
    dispatched: AtomicU64,
    dropped: AtomicU64,
    listeners: AtomicUsize,
}

/// Diagnostic counters for the event path
#[derive(Debug, Clone, Default)]
pub struct TableStats {
    /// Events delivered to at least the registry (including zero listeners)
    pub events_dispatched: u64,
    /// Events discarded due to queue overflow
    pub events_dropped: u64,
    /// Currently registered listeners
    pub listeners: usize,
}

/// Process-wide ledger of outstanding lock attempts, acquisitions and
/// releases
///
/// One instance serves the whole process (see [`LockTable::instance`]);
/// owned instances are used by tests and embedders that need an isolated
/// event stream. Registration and deregistration are asynchronous with
/// respect to the caller: completion is observed through the listener's
/// `registered`/`unregistered` callbacks, which run on the dispatcher
/// thread (callers typically spin on a flag the callbacks toggle).
pub struct LockTable {
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    next_group: AtomicU64,
}

impl LockTable {
    /// Create a table with its own dispatcher thread
    ///
    /// # Panics
    ///
    /// Panics if `event_queue_capacity` is zero; [`LockManager`] validates
    /// configured capacities before construction.
    ///
    /// [`LockManager`]: crate::manager::LockManager
    pub fn new(event_queue_capacity: usize) -> Self {
        assert!(event_queue_capacity >= 1, "event queue capacity must be >= 1");

        let shared = Arc::new(Shared {
            queue: Mutex::new(CommandQueue::default()),
            available: Condvar::new(),
            event_capacity: event_queue_capacity,
            dispatched: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            listeners: AtomicUsize::new(0),
        });

        let dispatcher = std::thread::Builder::new()
            .name("lock-table-dispatcher".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || dispatch_loop(&shared)
            })
            .expect("failed to spawn lock table dispatcher");

        Self {
            shared,
            dispatcher: Mutex::new(Some(dispatcher)),
            next_group: AtomicU64::new(1),
        }
    }

    /// The process-wide lock table
    pub fn instance() -> &'static LockTable {
        Self::instance_with_capacity(EVENT_QUEUE_CAPACITY)
    }

    /// The process-wide lock table, sized on first initialization
    ///
    /// The first caller fixes the queue capacity; later capacities are
    /// ignored because the dispatcher is already running.
    pub fn instance_with_capacity(event_queue_capacity: usize) -> &'static LockTable {
        static INSTANCE: OnceLock<LockTable> = OnceLock::new();
        INSTANCE.get_or_init(|| LockTable::new(event_queue_capacity))
    }

    /// Allocate a correlation id for one logical acquisition
    #[inline]
    pub fn next_group_id(&self) -> u64 {
        self.next_group.fetch_add(1, Ordering::Relaxed)
    }

    /// Report an acquisition attempt
    pub fn attempt(&self, path: &CollectionPath, mode: LockMode, group_id: u64) {
        self.enqueue_event(LockAction::new(Action::Attempt, path.clone(), mode, group_id));
    }

    /// Report a successful acquisition
    pub fn acquired(&self, path: &CollectionPath, mode: LockMode, group_id: u64) {
        self.enqueue_event(LockAction::new(
            Action::Acquired,
            path.clone(),
            mode,
            group_id,
        ));
    }

    /// Report a failed acquisition
    pub fn acquire_failed(
        &self,
        path: &CollectionPath,
        mode: LockMode,
        group_id: u64,
        reason: &str,
    ) {
        warn!("failed to acquire {mode} lock on {path}: {reason}");
        self.enqueue_event(LockAction::new(Action::Failed, path.clone(), mode, group_id));
    }

    /// Report a release
    pub fn released(&self, path: &CollectionPath, mode: LockMode, group_id: u64) {
        self.enqueue_event(LockAction::new(
            Action::Released,
            path.clone(),
            mode,
            group_id,
        ));
    }

    /// Register a listener; `listener.registered()` is invoked on the
    /// dispatcher thread once the registration is processed
    pub fn register_listener(&self, listener: Arc<dyn LockEventListener>) {
        self.enqueue_command(Command::Register(listener));
    }

    /// Deregister a listener (matched by object identity);
    /// `listener.unregistered()` is invoked on the dispatcher thread once
    /// the removal is processed
    pub fn deregister_listener(&self, listener: &Arc<dyn LockEventListener>) {
        self.enqueue_command(Command::Deregister(Arc::clone(listener)));
    }

    /// Snapshot of the diagnostic counters
    pub fn stats(&self) -> TableStats {
        TableStats {
            events_dispatched: self.shared.dispatched.load(Ordering::Relaxed),
            events_dropped: self.shared.dropped.load(Ordering::Relaxed),
            listeners: self.shared.listeners.load(Ordering::Relaxed),
        }
    }

    /// Stop the dispatcher after draining all queued commands
    ///
    /// Terminal: events emitted afterwards are never delivered. Owned
    /// tables call this from `Drop`; the process-wide instance lives for
    /// the process lifetime.
    pub fn shutdown(&self) {
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            self.enqueue_command(Command::Shutdown);
            if handle.join().is_err() {
                warn!("lock table dispatcher terminated abnormally");
            }
        }
    }

    /// Queue an event, dropping the oldest queued event on overflow
    fn enqueue_event(&self, event: LockAction) {
        let mut queue = self.shared.queue.lock();
        if queue.queued_events >= self.shared.event_capacity {
            let oldest = queue
                .commands
                .iter()
                .position(|command| matches!(command, Command::Event(_)));
            if let Some(idx) = oldest {
                let _ = queue.commands.remove(idx);
                queue.queued_events -= 1;
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        queue.commands.push_back(Command::Event(event));
        queue.queued_events += 1;
        drop(queue);
        self.shared.available.notify_one();
    }

    /// Queue a lifecycle command; never dropped
    fn enqueue_command(&self, command: Command) {
        let mut queue = self.shared.queue.lock();
        queue.commands.push_back(command);
        drop(queue);
        self.shared.available.notify_one();
    }
}

impl Drop for LockTable {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Dispatcher thread body: drain commands in order, owning the listener
/// registry so its mutations need no further synchronization
fn dispatch_loop(shared: &Shared) {
    let mut listeners: Vec<Arc<dyn LockEventListener>> = Vec::new();

    loop {
        let command = {
            let mut queue = shared.queue.lock();
            while queue.commands.is_empty() {
                shared.available.wait(&mut queue);
            }
            let command = queue.commands.pop_front().expect("queue non-empty");
            if matches!(command, Command::Event(_)) {
                queue.queued_events -= 1;
            }
            command
        };

        match command {
            Command::Event(event) => {
                for listener in &listeners {
                    let delivery =
                        catch_unwind(AssertUnwindSafe(|| listener.accept(&event)));
                    if delivery.is_err() {
                        warn!("lock event listener panicked on {event}; listener kept");
                    }
                }
                shared.dispatched.fetch_add(1, Ordering::Relaxed);
            }
            Command::Register(listener) => {
                listeners.push(Arc::clone(&listener));
                shared.listeners.store(listeners.len(), Ordering::Relaxed);
                if catch_unwind(AssertUnwindSafe(|| listener.registered())).is_err() {
                    warn!("lock event listener panicked during registration");
                }
            }
            Command::Deregister(listener) => {
                listeners.retain(|known| !Arc::ptr_eq(known, &listener));
                shared.listeners.store(listeners.len(), Ordering::Relaxed);
                if catch_unwind(AssertUnwindSafe(|| listener.unregistered())).is_err() {
                    warn!("lock event listener panicked during deregistration");
                }
            }
            Command::Shutdown => break,
        }
    }

    debug!("lock table dispatcher stopped");
}
