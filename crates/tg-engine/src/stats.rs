//! Statistics sink interface.
//!
//! The persistent counters live with an external collaborator; the engine
//! only ever reports "one more ad blocked", fire-and-forget. The sink is
//! injected into the session at construction, so nothing in the engine
//! touches ambient storage.

use std::cell::Cell;
use std::rc::Rc;

/// Receiver for blocked-ad events. Implementations must not block; the
/// classification path never waits on persistence.
pub trait StatsSink {
    /// One ad was blocked (counts toward both blocked and total).
    fn ad_blocked(&self);
}

/// Sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatsSink for NullSink {
    fn ad_blocked(&self) {}
}

/// In-memory tally, mainly for tests and diagnostics.
#[derive(Debug, Default)]
pub struct TallySink {
    blocked: Cell<u64>,
}

impl TallySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocked(&self) -> u64 {
        self.blocked.get()
    }
}

impl StatsSink for TallySink {
    fn ad_blocked(&self) {
        self.blocked.set(self.blocked.get() + 1);
    }
}

impl<S: StatsSink + ?Sized> StatsSink for Rc<S> {
    fn ad_blocked(&self) {
        (**self).ad_blocked();
    }
}
