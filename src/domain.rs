//! Domain & lattice (C4): the procedure-local abstract state, join, widen, ordering.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::critical_pair::CriticalPair;
use crate::event::{Acquisition, Event, HeldStack, SourceLoc};
use crate::lock::Lock;

/// A guard-object identifier (§3 "guard map"): scoped lock-guard objects are tracked by whatever
/// identity the IR gives their binding site (e.g. an SSA-style local or a stack slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GuardId(pub u32);

/// The three-valued `on_ui_thread` lattice element (§3): `Bottom` is the initial unknown state,
/// `True`/`Top` both render as "known to run on the UI thread" for reporting purposes, and the
/// join `true ⊔ anything = true` is implemented as "the more certain of the two wins" so I3 holds
/// (once a state observes the UI-thread marker, every later join keeps the truth).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UiThreadFlag {
    Bottom,
    True,
    Top,
}

impl UiThreadFlag {
    pub fn to_bool(self) -> bool {
        !matches!(self, UiThreadFlag::Bottom)
    }

    pub fn join(self, other: UiThreadFlag) -> UiThreadFlag {
        self.max(other)
    }
}

impl Default for UiThreadFlag {
    fn default() -> Self {
        UiThreadFlag::Bottom
    }
}

/// The procedure-local abstract state (§3).
///
/// Mutated exclusively by the transfer function ([`crate::transfer`]); joined at CFG merge points
/// by the external fixpoint engine calling [`AbstractState::join`]; published as an immutable
/// [`crate::summary::Summary`] once the fixpoint converges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractState {
    held: HeldStack,
    critical_pairs: HashSet<CriticalPair>,
    #[serde(with = "guard_map_serde")]
    guards: HashMap<GuardId, Lock>,
    on_ui_thread: UiThreadFlag,
}

impl AbstractState {
    /// Bottom: empty everywhere, `on_ui_thread = bottom` (§4.4).
    pub fn bottom() -> Self {
        AbstractState::default()
    }

    pub fn held(&self) -> &HeldStack {
        &self.held
    }

    pub fn critical_pairs(&self) -> &HashSet<CriticalPair> {
        &self.critical_pairs
    }

    pub fn on_ui_thread(&self) -> bool {
        self.on_ui_thread.to_bool()
    }

    pub fn on_ui_thread_flag(&self) -> UiThreadFlag {
        self.on_ui_thread
    }

    pub fn guard_lock(&self, guard: GuardId) -> Option<&Lock> {
        self.guards.get(&guard)
    }

    /// I4: the guards map is bijective from live guard ids — enforced by always replacing any
    /// prior binding for `guard` rather than allowing two ids to alias one lock's guard slot.
    pub(crate) fn bind_guard(&mut self, guard: GuardId, lock: Lock) {
        self.guards.insert(guard, lock);
    }

    pub(crate) fn unbind_guard(&mut self, guard: GuardId) {
        self.guards.remove(&guard);
    }

    /// Records a lock acquisition and emits the corresponding `LockAcquire` critical pair,
    /// witnessed *against the newly-extended held stack* (§4.5) — if `acquisition.lock` is
    /// already held, the critical pair still records the duplicate, which is how self-deadlock is
    /// surfaced later in the report engine (§4.7 step 2).
    pub(crate) fn record_lock_acquire(&mut self, acquisition: Acquisition, loc: SourceLoc) {
        let lock = acquisition.lock.clone();
        let procname = acquisition.procname.clone();
        let already_held = self.held.contains_lock(&lock);

        self.held.push(acquisition);

        let pair = CriticalPair::new(
            self.held.iter().cloned().collect(),
            Event::LockAcquire(lock.clone()),
            loc,
            self.on_ui_thread(),
        );
        self.critical_pairs.insert(pair);

        if already_held {
            // I1 (`held` duplicate-free by lock) is restored here: the self-deadlock signal has
            // now been recorded as a critical pair, so the duplicate entry is removed.
            self.held.pop_matching(&lock);
            self.held.push(Acquisition::new(lock, procname, loc));
        }
    }

    pub(crate) fn record_unlock(&mut self, lock: &Lock) {
        self.held.pop_matching(lock);
    }

    pub(crate) fn record_event(&mut self, event: Event, loc: SourceLoc) {
        let pair = CriticalPair::new(self.held.iter().cloned().collect(), event, loc, self.on_ui_thread());
        self.critical_pairs.insert(pair);
    }

    pub(crate) fn set_on_ui_thread(&mut self) {
        self.on_ui_thread = self.on_ui_thread.join(UiThreadFlag::True);
    }

    /// Unions a transformed callee critical pair into this state's accumulated set (§4.6 step 3).
    pub(crate) fn absorb_critical_pair(&mut self, pair: CriticalPair) {
        self.critical_pairs.insert(pair);
    }

    pub(crate) fn absorb_ui_thread(&mut self, other: UiThreadFlag) {
        self.on_ui_thread = self.on_ui_thread.join(other);
    }

    /// Component-wise join (§4.4):
    /// - `held`: intersection — a lock not held on all incoming paths is dropped.
    /// - `critical_pairs`: union.
    /// - `guards`: pointwise intersection — a guard survives only if present on all paths bound
    ///   to the same lock.
    /// - `on_ui_thread`: lattice join, `true` absorbing.
    ///
    /// Widening is identical to join (§4.4): the critical-pair set is bounded by the finite lock
    /// alphabet of the procedure, so no separate widening operator is provided; callers that need
    /// one for the external fixpoint engine's interface can pass `join` directly.
    pub fn join(&self, other: &AbstractState) -> AbstractState {
        let held = self.held.intersect(&other.held);

        let critical_pairs = self
            .critical_pairs
            .union(&other.critical_pairs)
            .cloned()
            .collect();

        let guards = self
            .guards
            .iter()
            .filter_map(|(id, lock)| {
                other
                    .guards
                    .get(id)
                    .filter(|other_lock| *other_lock == lock)
                    .map(|_| (*id, lock.clone()))
            })
            .collect();

        let on_ui_thread = self.on_ui_thread.join(other.on_ui_thread);

        AbstractState { held, critical_pairs, guards, on_ui_thread }
    }

    /// `S ⊑ other`: every held lock, critical pair, and guard binding of `self` also appears in
    /// `other`, and `self`'s UI-thread flag does not exceed `other`'s. Used by the external
    /// fixpoint engine to detect convergence; P4 (monotonicity of integration) and P3 (join
    /// properties) are stated in terms of this order.
    pub fn leq(&self, other: &AbstractState) -> bool {
        self.held.iter().all(|acq| other.held.contains_lock(&acq.lock))
            && self.critical_pairs.is_subset(&other.critical_pairs)
            && self.guards.iter().all(|(id, lock)| other.guards.get(id) == Some(lock))
            && self.on_ui_thread <= other.on_ui_thread
    }

}

mod guard_map_serde {
    use super::GuardId;
    use crate::lock::Lock;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S: Serializer>(map: &HashMap<GuardId, Lock>, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<(GuardId, Lock)> = map.iter().map(|(k, v)| (*k, v.clone())).collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashMap<GuardId, Lock>, D::Error> {
        let entries = Vec::<(GuardId, Lock)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
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
    fn join_intersects_held_locks() {
        let mut left = AbstractState::bottom();
        left.record_lock_acquire(Acquisition::new(lock("a"), "m", SourceLoc::new(0, 1, 0)), SourceLoc::new(0, 1, 0));

        let right = AbstractState::bottom();

        let joined = left.join(&right);
        assert!(joined.held().is_empty());
    }

    #[test]
    fn join_unions_critical_pairs() {
        let mut left = AbstractState::bottom();
        left.record_lock_acquire(Acquisition::new(lock("a"), "m", SourceLoc::new(0, 1, 0)), SourceLoc::new(0, 1, 0));

        let mut right = AbstractState::bottom();
        right.record_lock_acquire(Acquisition::new(lock("b"), "m", SourceLoc::new(0, 2, 0)), SourceLoc::new(0, 2, 0));

        let joined = left.join(&right);
        assert_eq!(joined.critical_pairs().len(), 2);
    }

    #[test]
    fn join_is_commutative_and_idempotent() {
        let mut a = AbstractState::bottom();
        a.record_lock_acquire(Acquisition::new(lock("a"), "m", SourceLoc::new(0, 1, 0)), SourceLoc::new(0, 1, 0));
        a.set_on_ui_thread();

        let mut b = AbstractState::bottom();
        b.record_lock_acquire(Acquisition::new(lock("b"), "m", SourceLoc::new(0, 2, 0)), SourceLoc::new(0, 2, 0));

        assert_eq!(a.join(&b), b.join(&a));
        assert_eq!(a.join(&a), a);
    }

    #[test]
    fn once_true_ui_thread_flag_survives_joins() {
        let mut a = AbstractState::bottom();
        a.set_on_ui_thread();
        let b = AbstractState::bottom();

        let joined = a.join(&b);
        assert!(joined.on_ui_thread());
    }

    #[test]
    fn self_reacquire_is_recorded_and_held_stays_duplicate_free() {
        let mut state = AbstractState::bottom();
        state.record_lock_acquire(Acquisition::new(lock("a"), "m", SourceLoc::new(0, 1, 0)), SourceLoc::new(0, 1, 0));
        state.record_lock_acquire(Acquisition::new(lock("a"), "m", SourceLoc::new(0, 2, 0)), SourceLoc::new(0, 2, 0));

        assert_eq!(state.held().len(), 1);
        assert_eq!(state.critical_pairs().len(), 2);
    }
}
