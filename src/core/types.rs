/*!
 * Core Types
 * Shared type definitions for the lock subsystem
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock mode for a latch acquisition
///
/// Multiple `Read` holders may coexist on one latch; `Write` is exclusive.
/// Ordered so that `Write > Read` ("strongest mode" selection).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum LockMode {
    Read = 0,
    Write = 1,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Read => write!(f, "READ"),
            LockMode::Write => write!(f, "WRITE"),
        }
    }
}

/// Opaque thread identifier, stable for the thread's lifetime
///
/// `std::thread::ThreadId` has no stable numeric form, so latch hold tables
/// and event records use a process-local counter assigned on first use.
pub type ThreadToken = u64;

/// Identifier of the calling thread
#[inline]
pub fn current_thread_token() -> ThreadToken {
    static NEXT: AtomicU64 = AtomicU64::new(1);

    thread_local! {
        static TOKEN: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }

    TOKEN.with(|token| *token)
}
