/*!
 * Lock Events
 * Immutable records of lock activity with monotonic timestamps
 */

use crate::core::types::{current_thread_token, LockMode, ThreadToken};
use crate::path::CollectionPath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

/// What happened to a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Action {
    Attempt,
    Acquired,
    Failed,
    Released,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Attempt => "Attempt",
            Action::Acquired => "Acquired",
            Action::Failed => "Failed",
            Action::Released => "Released",
        };
        f.write_str(name)
    }
}

/// One lock event as observed by listeners
///
/// `group_id` correlates the events emitted for one logical acquisition:
/// a coupling traversal and the disposal of its handle share a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockAction {
    pub action: Action,
    /// Collection path the event refers to
    pub id: CollectionPath,
    pub mode: LockMode,
    /// Opaque id of the emitting thread
    pub thread_id: ThreadToken,
    /// Monotonic nanoseconds since process start
    pub timestamp_ns: u64,
    pub group_id: u64,
}

impl LockAction {
    /// Create an event stamped with the calling thread and current time
    #[inline]
    pub fn new(action: Action, id: CollectionPath, mode: LockMode, group_id: u64) -> Self {
        Self {
            action,
            id,
            mode,
            thread_id: current_thread_token(),
            timestamp_ns: now_ns(),
            group_id,
        }
    }
}

impl fmt::Display for LockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) thread={} group={}",
            self.action, self.id, self.mode, self.thread_id, self.group_id
        )
    }
}

/// Get current time in nanoseconds (monotonic)
#[inline]
fn now_ns() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

/// Observer of lock table activity
///
/// All three callbacks run on the dispatcher thread: `registered` /
/// `unregistered` acknowledge the asynchronous lifecycle calls on
/// [`LockTable`](crate::table::LockTable), `accept` delivers events in
/// enqueue order. Implementations must not block the dispatcher
/// indefinitely; panics are caught, logged and ignored.
pub trait LockEventListener: Send + Sync {
    /// Registration acknowledged on the dispatcher thread
    fn registered(&self) {}

    /// Deregistration acknowledged on the dispatcher thread
    fn unregistered(&self) {}

    /// Deliver one event
    fn accept(&self, action: &LockAction);
}
