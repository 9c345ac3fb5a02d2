//! Lifecycle flags and counters of a timeslot session
//!
//! Every field is a single atomic. The lifecycle API, the signal handler and the worker each write
//! only the fields they own, so no two contexts write the same field at the same time:
//!
//! * lifecycle API: `session_open`, `session_id`, `ts_len_us`, `conn_interval_us`, setting
//!   `started` and `stopping`
//! * worker: `anchored`, `blocked_cancelled_count`, clearing `started` and `stopping`
//! * signal handler: reads only

use crate::multiplexer::SessionId;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Snapshot of the session state
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    /// A session was opened in the multiplexer
    pub session_open: bool,
    /// A timeslot sequence is requested or running
    pub started: bool,
    /// The running sequence is requested to stop
    pub stopping: bool,
    /// At least one timeslot of the running sequence has started
    pub anchored: bool,
    /// Consecutive denied or cancelled timeslots since the last started one
    pub blocked_cancelled_count: u8,
}

pub(crate) struct SessionState {
    session_open: AtomicBool,
    session_id: AtomicU8,
    started: AtomicBool,
    stopping: AtomicBool,
    anchored: AtomicBool,
    blocked_cancelled_count: AtomicU8,
    ts_len_us: AtomicU32,
    conn_interval_us: AtomicU32,
}

impl SessionState {
    pub const fn new() -> Self {
        Self {
            session_open: AtomicBool::new(false),
            session_id: AtomicU8::new(0),
            started: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            anchored: AtomicBool::new(false),
            blocked_cancelled_count: AtomicU8::new(0),
            ts_len_us: AtomicU32::new(0),
            conn_interval_us: AtomicU32::new(0),
        }
    }

    pub fn session_open(&self) -> bool {
        self.session_open.load(Ordering::SeqCst)
    }

    pub fn mark_open(&self, session_id: SessionId) {
        self.session_id.store(session_id, Ordering::SeqCst);
        self.session_open.store(true, Ordering::SeqCst);
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub fn anchored(&self) -> bool {
        self.anchored.load(Ordering::SeqCst)
    }

    pub fn ts_len_us(&self) -> u32 {
        self.ts_len_us.load(Ordering::SeqCst)
    }

    pub fn conn_interval_us(&self) -> u32 {
        self.conn_interval_us.load(Ordering::SeqCst)
    }

    /// Begin a new timeslot sequence
    ///
    /// Returns `false` if a sequence is already started.
    pub fn begin(&self, len_us: u32, interval_us: u32) -> bool {
        if self.stopping()
            || self
                .started
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return false;
        }
        // Signals of the new sequence arrive only after its first request is issued
        self.ts_len_us.store(len_us, Ordering::SeqCst);
        self.conn_interval_us.store(interval_us, Ordering::SeqCst);
        self.blocked_cancelled_count.store(0, Ordering::SeqCst);
        true
    }

    /// Request the running sequence to stop
    ///
    /// Returns `false` if no sequence is running or it is already stopping.
    pub fn request_stop(&self) -> bool {
        self.started()
            && self
                .stopping
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    /// A timeslot of the running sequence started
    pub fn anchor(&self) {
        self.blocked_cancelled_count.store(0, Ordering::SeqCst);
        self.anchored.store(true, Ordering::SeqCst);
    }

    /// Count a denied or cancelled timeslot, returning the updated count
    pub fn record_denial(&self) -> u8 {
        let prev = self
            .blocked_cancelled_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_add(1))
            })
            .unwrap_or(u8::MAX);
        prev.saturating_add(1)
    }

    /// Return to the open-but-not-started state
    pub fn finalize(&self) {
        self.stopping.store(false, Ordering::SeqCst);
        self.anchored.store(false, Ordering::SeqCst);
        self.started.store(false, Ordering::SeqCst);
    }

    pub fn status(&self) -> Status {
        Status {
            session_open: self.session_open(),
            started: self.started(),
            stopping: self.stopping(),
            anchored: self.anchored(),
            blocked_cancelled_count: self.blocked_cancelled_count.load(Ordering::SeqCst),
        }
    }
}
