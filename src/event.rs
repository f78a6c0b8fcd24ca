//! Event & Acquisition (C2): atomic abstract events and the held-lock stack.

use serde::{Deserialize, Serialize};

use crate::lock::Lock;

/// Severity of a [`Event::MayBlock`] observation, ordered so `High > Medium > Low` (§4.7
/// deduplication picks the highest severity when two starvation reports collide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A tagged variant with exactly the four cases listed in §3; `LockAcquire` is the only one that
/// also appears in the held-acquisition stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    LockAcquire(Lock),
    MayBlock { description: String, severity: Severity },
    StrictModeCall { description: String },
}

impl Event {
    pub fn as_lock_acquire(&self) -> Option<&Lock> {
        match self {
            Event::LockAcquire(lock) => Some(lock),
            _ => None,
        }
    }
}

/// Describes how an [`Acquisition`] entered the held stack: directly observed at a lock-call site,
/// or inherited through [`crate::summary::integrate`] substituting a callee's critical pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceAnchor {
    Direct,
    Inherited { callee: String, call_loc: SourceLoc },
}

/// A source location; opaque to the core beyond ordering (used for stable tie-breaking and
/// deduplication keys, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: u32,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub const fn new(file: u32, line: u32, column: u32) -> Self {
        SourceLoc { file, line, column }
    }
}

impl std::fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A record of where a lock was taken (§3): `{lock, procname, loc, trace_anchor}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acquisition {
    pub lock: Lock,
    pub procname: String,
    pub loc: SourceLoc,
    pub trace_anchor: TraceAnchor,
}

impl Acquisition {
    pub fn new(lock: Lock, procname: impl Into<String>, loc: SourceLoc) -> Self {
        Acquisition {
            lock,
            procname: procname.into(),
            loc,
            trace_anchor: TraceAnchor::Direct,
        }
    }

    pub fn inherited(lock: Lock, procname: impl Into<String>, loc: SourceLoc, callee: impl Into<String>, call_loc: SourceLoc) -> Self {
        Acquisition {
            lock,
            procname: procname.into(),
            loc,
            trace_anchor: TraceAnchor::Inherited { callee: callee.into(), call_loc },
        }
    }
}

/// An ordered, duplicate-free-by-lock chain of [`Acquisition`]s (§3 invariant I1).
///
/// Ordering is by *acquisition order*, i.e. insertion order, not by [`Lock`]'s `Ord` impl — the
/// held stack models a call stack, not a sorted set. Lookups by lock identity are linear, which is
/// acceptable given the bounded size noted in §5 ("critical-pair set size: bounded; no backpressure
/// mechanism needed").
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeldStack(Vec<Acquisition>);

impl HeldStack {
    pub fn new() -> Self {
        HeldStack(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Acquisition> {
        self.0.iter()
    }

    pub fn contains_lock(&self, lock: &Lock) -> bool {
        self.0.iter().any(|acq| &acq.lock == lock)
    }

    /// Pushes `acquisition`, even if its lock is already held — re-acquisition is the
    /// self-deadlock signal (§4.5) and must be observable by the caller before the duplicate is
    /// recorded. Invariant I1 ("held is duplicate-free") is restored by the transfer function's
    /// caller, which does not push the acquisition onto `held` a second time; see
    /// [`crate::transfer::apply_lock`].
    pub(crate) fn push(&mut self, acquisition: Acquisition) {
        self.0.push(acquisition);
    }

    /// Pops the most recent held acquisition matching `lock`, if any; unmatched unlocks are
    /// silently ignored per §4.5.
    pub(crate) fn pop_matching(&mut self, lock: &Lock) {
        if let Some(pos) = self.0.iter().rposition(|acq| &acq.lock == lock) {
            self.0.remove(pos);
        }
    }

    /// The intersection-by-lock of two held stacks, preserving the order of `self` — used by C4's
    /// join, which drops locks not held on all incoming paths (§4.4).
    pub fn intersect(&self, other: &HeldStack) -> HeldStack {
        HeldStack(
            self.0
                .iter()
                .filter(|acq| other.contains_lock(&acq.lock))
                .cloned()
                .collect(),
        )
    }

    pub fn prepend(&self, suffix: &[Acquisition]) -> Vec<Acquisition> {
        let mut result = self.0.clone();
        result.extend(suffix.iter().cloned());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_path::{AccessPath, Root};

    fn lock(name: &str) -> Lock {
        Lock::from_access_path(AccessPath::bare(Root::Global(name.into())), Some("Foo".into())).unwrap()
    }

    #[test]
    fn pop_matching_removes_the_most_recent_entry() {
        let mut stack = HeldStack::new();
        stack.push(Acquisition::new(lock("a"), "m", SourceLoc::new(0, 1, 0)));
        stack.pop_matching(&lock("a"));
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_matching_unknown_lock_is_a_noop() {
        let mut stack = HeldStack::new();
        stack.push(Acquisition::new(lock("a"), "m", SourceLoc::new(0, 1, 0)));
        stack.pop_matching(&lock("b"));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn intersect_drops_locks_not_common_to_both() {
        let mut left = HeldStack::new();
        left.push(Acquisition::new(lock("a"), "m", SourceLoc::new(0, 1, 0)));
        left.push(Acquisition::new(lock("b"), "m", SourceLoc::new(0, 2, 0)));

        let mut right = HeldStack::new();
        right.push(Acquisition::new(lock("a"), "m", SourceLoc::new(0, 1, 0)));

        let joined = left.intersect(&right);
        assert_eq!(joined.len(), 1);
        assert!(joined.contains_lock(&lock("a")));
        assert!(!joined.contains_lock(&lock("b")));
    }
}
