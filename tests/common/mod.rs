/*!
 * Shared Test Support
 * Recording listener and event-stream helpers
 */

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use xylem_locking::{Action, LockAction, LockEventListener, LockMode, LockTable};

/// Listener that records every event it sees and tracks its registration
/// state, mirroring the recording listeners used against the live server
pub struct RecordingListener {
    events: Mutex<Vec<LockAction>>,
    registered: AtomicBool,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            registered: AtomicBool::new(false),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub fn events(&self) -> Vec<LockAction> {
        self.events.lock().unwrap().clone()
    }
}

impl Default for RecordingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl LockEventListener for RecordingListener {
    fn registered(&self) {
        self.registered.store(true, Ordering::Release);
    }

    fn unregistered(&self) {
        self.registered.store(false, Ordering::Release);
    }

    fn accept(&self, action: &LockAction) {
        self.events.lock().unwrap().push(action.clone());
    }
}

/// Install the env_logger backend once so `warn!` diagnostics from the
/// dispatcher and release paths surface in test output
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Spin until `condition` holds, with a hard cap so a broken dispatcher
/// fails the test instead of hanging it
pub fn spin_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "condition never met");
        std::thread::yield_now();
    }
}

/// Run `session` with a recording listener registered on the process-wide
/// lock table and return every event emitted while it ran
///
/// Deregistration is awaited by spin-waiting on the listener's flag, which
/// is exactly the asynchronous-lifecycle contract of the lock table: once
/// `unregistered` has run on the dispatcher thread, all events enqueued
/// before the deregistration have been delivered.
pub fn record_session(session: impl FnOnce()) -> Vec<LockAction> {
    init_test_logging();

    let table = LockTable::instance();
    let listener = Arc::new(RecordingListener::new());
    let handle: Arc<dyn LockEventListener> = listener.clone();

    table.register_listener(Arc::clone(&handle));
    spin_until(|| listener.is_registered());

    session();

    table.deregister_listener(&handle);
    spin_until(|| !listener.is_registered());

    listener.events()
}

/// Assert one event's action, path and mode
pub fn assert_event(event: &LockAction, action: Action, path: &str, mode: LockMode) {
    assert_eq!(event.action, action, "unexpected action in {event}");
    assert_eq!(event.id.as_str(), path, "unexpected path in {event}");
    assert_eq!(event.mode, mode, "unexpected mode in {event}");
}
