//! CriticalPair (C3): an event witnessed under a given acquisition stack.

use serde::{Deserialize, Serialize};

use crate::event::{Acquisition, Event, SourceLoc, Severity, TraceAnchor};
use crate::lock::Lock;

/// One frame of a call-site trace, built by [`crate::summary::integrate`] each time a critical
/// pair crosses a call boundary (§4.6 step 2: "wrap `cp.trace` with a frame `(callee, loc)`").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceFrame {
    pub callee: String,
    pub loc: SourceLoc,
}

/// An event observed in a state where `acquisitions` are held (§3), with the original source
/// location, whether the witnessing procedure is known to run on the UI thread, and the call-site
/// trace needed to reconstruct a diagnostic across procedure boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CriticalPair {
    pub acquisitions: Vec<Acquisition>,
    pub event: Event,
    pub loc: SourceLoc,
    pub thread_flag: bool,
    pub trace: Vec<TraceFrame>,
}

impl CriticalPair {
    /// Constructs a critical pair capturing the *current* held set as a structural clone (not an
    /// alias) — mutating `held` afterward must not retroactively change `acquisitions` here.
    pub fn new(acquisitions: Vec<Acquisition>, event: Event, loc: SourceLoc, thread_flag: bool) -> Self {
        CriticalPair {
            acquisitions,
            event,
            loc,
            thread_flag,
            trace: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: Vec<TraceFrame>) -> Self {
        self.trace = trace;
        self
    }

    pub fn prepend_frame(mut self, frame: TraceFrame) -> Self {
        self.trace.insert(0, frame);
        self
    }

    /// The lock this pair's event acquires, if its event is a `LockAcquire`.
    pub fn acquired_lock(&self) -> Option<&Lock> {
        self.event.as_lock_acquire()
    }

    /// `is_uithread` (§4.3): reads `thread_flag`.
    pub fn is_uithread(&self) -> bool {
        self.thread_flag
    }

    /// `can_run_in_parallel(p, q)` (§4.3): conservative default true; the only case ruled out is
    /// both pairs witnessed on the UI thread, since the UI thread is single-threaded and a
    /// procedure cannot race against itself there.
    pub fn can_run_in_parallel(p: &CriticalPair, q: &CriticalPair) -> bool {
        !(p.is_uithread() && q.is_uithread())
    }

    /// `may_deadlock(p, q)` (§4.3): the classical lock-order inversion check. True iff there exist
    /// locks A, B (A != B) such that `p` acquires B while holding A, and `q` acquires A while
    /// holding B.
    pub fn may_deadlock(p: &CriticalPair, q: &CriticalPair) -> bool {
        let (Some(b), Some(a_prime)) = (p.acquired_lock(), q.acquired_lock()) else {
            return false;
        };
        if b == a_prime {
            return false;
        }
        let p_holds_a = p.acquisitions.iter().any(|acq| &acq.lock == a_prime);
        let q_holds_b = q.acquisitions.iter().any(|acq| &acq.lock == b);
        p_holds_a && q_holds_b
    }

    /// `get_earliest_lock_or_call_loc(p, procname)` (§4.3): the source location of the first
    /// acquisition belonging to `procname`, falling back to the event location.
    pub fn get_earliest_lock_or_call_loc(&self, procname: &str) -> SourceLoc {
        self.acquisitions
            .iter()
            .find(|acq| acq.procname == procname)
            .map(|acq| acq.loc)
            .unwrap_or(self.loc)
    }

    /// `make_trace(p, header, include_acquisitions)` (§4.3): lazily materializes a human-readable
    /// call-step trace from the accumulated anchors, each line prefixed with `header`.
    pub fn make_trace(&self, header: &str, include_acquisitions: bool) -> Vec<String> {
        let mut lines = Vec::new();

        for frame in &self.trace {
            lines.push(format!("{header}calls `{}` at {}", frame.callee, frame.loc));
        }

        if include_acquisitions {
            for acquisition in &self.acquisitions {
                match &acquisition.trace_anchor {
                    TraceAnchor::Direct => {
                        lines.push(format!(
                            "{header}acquires `{}` in `{}` at {}",
                            acquisition.lock, acquisition.procname, acquisition.loc
                        ));
                    }
                    TraceAnchor::Inherited { callee, call_loc } => {
                        lines.push(format!(
                            "{header}acquires `{}` via call to `{callee}` at {call_loc}",
                            acquisition.lock
                        ));
                    }
                }
            }
        }

        lines.push(format!("{header}{}", describe_event(&self.event)));
        lines
    }
}

fn describe_event(event: &Event) -> String {
    match event {
        Event::LockAcquire(lock) => format!("acquires `{lock}`"),
        Event::MayBlock { description, severity } => format!("may block ({description}, severity {})", describe_severity(*severity)),
        Event::StrictModeCall { description } => format!("performs a Strict Mode violating call ({description})"),
    }
}

fn describe_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_path::{AccessPath, Root};

    fn lock(name: &str) -> Lock {
        Lock::from_access_path(AccessPath::bare(Root::Global(name.into())), Some("Foo".into())).unwrap()
    }

    fn acq(name: &str, proc: &str) -> Acquisition {
        Acquisition::new(lock(name), proc, SourceLoc::new(0, 1, 0))
    }

    #[test]
    fn may_deadlock_detects_lock_order_inversion() {
        // m1: acquires a then b
        let p = CriticalPair::new(vec![acq("a", "m1")], Event::LockAcquire(lock("b")), SourceLoc::new(0, 2, 0), false);
        // m2: acquires b then a
        let q = CriticalPair::new(vec![acq("b", "m2")], Event::LockAcquire(lock("a")), SourceLoc::new(0, 3, 0), false);

        assert!(CriticalPair::may_deadlock(&p, &q));
    }

    #[test]
    fn may_deadlock_false_when_locks_do_not_invert() {
        let p = CriticalPair::new(vec![acq("a", "m1")], Event::LockAcquire(lock("b")), SourceLoc::new(0, 2, 0), false);
        let q = CriticalPair::new(vec![acq("a", "m2")], Event::LockAcquire(lock("c")), SourceLoc::new(0, 3, 0), false);

        assert!(!CriticalPair::may_deadlock(&p, &q));
    }

    #[test]
    fn may_deadlock_false_for_same_lock() {
        let p = CriticalPair::new(vec![acq("a", "m1")], Event::LockAcquire(lock("a")), SourceLoc::new(0, 2, 0), false);
        let q = CriticalPair::new(vec![acq("a", "m2")], Event::LockAcquire(lock("a")), SourceLoc::new(0, 3, 0), false);

        assert!(!CriticalPair::may_deadlock(&p, &q));
    }

    #[test]
    fn cannot_run_in_parallel_when_both_on_ui_thread() {
        let p = CriticalPair::new(vec![], Event::LockAcquire(lock("a")), SourceLoc::new(0, 1, 0), true);
        let q = CriticalPair::new(vec![], Event::LockAcquire(lock("b")), SourceLoc::new(0, 2, 0), true);
        assert!(!CriticalPair::can_run_in_parallel(&p, &q));
    }

    #[test]
    fn can_run_in_parallel_conservative_default() {
        let p = CriticalPair::new(vec![], Event::LockAcquire(lock("a")), SourceLoc::new(0, 1, 0), true);
        let q = CriticalPair::new(vec![], Event::LockAcquire(lock("b")), SourceLoc::new(0, 2, 0), false);
        assert!(CriticalPair::can_run_in_parallel(&p, &q));
    }
}
