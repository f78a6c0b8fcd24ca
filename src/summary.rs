//! Summary integration (C6): substituting a callee's summary into the caller's state.

use serde::{Deserialize, Serialize};

use crate::access_path::{AccessPath, Root};
use crate::critical_pair::{CriticalPair, TraceFrame};
use crate::domain::AbstractState;
use crate::event::{Acquisition, Event, SourceLoc};
use crate::ir::ProcName;
use crate::lock::Lock;

/// The final abstract state of a procedure at its exit (§3): the join of all of the procedure's
/// exit states, published once the external fixpoint engine converges. A newtype rather than a
/// bare [`AbstractState`] alias so summaries and in-progress states can't be confused at a type
/// level even though they share a representation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary(AbstractState);

impl Summary {
    pub fn from_final_state(state: AbstractState) -> Summary {
        Summary(state)
    }

    pub fn state(&self) -> &AbstractState {
        &self.0
    }
}

/// Rebases a lock's access path at a call site: formal-rooted paths are substituted with the
/// matching actual argument; global- and class-literal-rooted paths pass through unchanged (§4.6
/// step 1). Returns `None` if the lock is rooted at a formal beyond the actual argument list —
/// an unbindable path, which drops the critical pair ("sound over-approximation is preferred; here
/// we elide, as in the source").
fn rebase_lock(lock: &Lock, args: &[AccessPath]) -> Option<Lock> {
    match lock.path().root() {
        Root::Formal(idx) => {
            let idx = *idx;
            let actual = args.get(idx as usize)?;
            lock.rebase(idx, actual)
        }
        Root::Global(_) | Root::ClassLiteral(_) => Some(lock.clone()),
        Root::Local(_) => None,
    }
}

fn rebase_event(event: &Event, args: &[AccessPath]) -> Option<Event> {
    match event {
        Event::LockAcquire(lock) => rebase_lock(lock, args).map(Event::LockAcquire),
        other => Some(other.clone()),
    }
}

fn rebase_acquisition(acquisition: &Acquisition, args: &[AccessPath]) -> Option<Acquisition> {
    let lock = rebase_lock(&acquisition.lock, args)?;
    Some(Acquisition { lock, ..acquisition.clone() })
}

fn rebase_critical_pair(pair: &CriticalPair, args: &[AccessPath]) -> Option<CriticalPair> {
    let mut acquisitions = Vec::with_capacity(pair.acquisitions.len());
    for acquisition in &pair.acquisitions {
        acquisitions.push(rebase_acquisition(acquisition, args)?);
    }
    let event = rebase_event(&pair.event, args)?;

    Some(CriticalPair {
        acquisitions,
        event,
        loc: pair.loc,
        thread_flag: pair.thread_flag,
        trace: pair.trace.clone(),
    })
}

/// Substitutes `summary`'s critical pairs into `state` at a call site `(callee, loc)` with actual
/// arguments `args` (§4.6).
///
/// 1. Each critical pair's access paths are rebased (formal → actual substitution); unbindable
///    pairs are elided.
/// 2. `state`'s currently-held locks are prepended to the rebased pair's acquisitions (the caller
///    was holding these when the callee ran), and the pair's trace gains a `(callee, loc)` frame.
/// 3. The transformed pairs are unioned into `state`'s critical-pair set.
/// 4. `state.on_ui_thread` absorbs `summary.on_ui_thread` (`true` wins, §3 I3).
/// 5. `held` and `guards` are NOT inherited from the callee — callees are assumed balanced.
///
/// Monotonic in both `state` and `summary` (P4); integrating the same summary twice is idempotent
/// (R2), since step 3's union and step 4's join are themselves idempotent and steps 1-2 are
/// deterministic functions of `state.held()`, `summary`, and `args`.
pub fn integrate(state: &mut AbstractState, summary: &Summary, callee: &ProcName, loc: SourceLoc) {
    integrate_with_args(state, summary, callee, &[], loc)
}

/// As [`integrate`], but rebasing critical pairs against the call site's actual arguments. Split
/// out from [`integrate`] so callers that already know there are no formal-rooted locks to rebase
/// (e.g. a zero-argument callee) can skip passing an argument list.
pub fn integrate_with_args(state: &mut AbstractState, summary: &Summary, callee: &ProcName, args: &[AccessPath], loc: SourceLoc) {
    let held_prefix: Vec<Acquisition> = state.held().iter().cloned().collect();

    for pair in summary.state().critical_pairs() {
        let Some(rebased) = rebase_critical_pair(pair, args) else {
            continue;
        };

        let mut acquisitions = held_prefix.clone();
        acquisitions.extend(rebased.acquisitions);

        let combined = CriticalPair {
            acquisitions,
            event: rebased.event,
            loc: rebased.loc,
            thread_flag: rebased.thread_flag,
            trace: rebased.trace,
        }
        .prepend_frame(TraceFrame { callee: callee.clone(), loc });

        state.absorb_critical_pair(combined);
    }

    state.absorb_ui_thread(summary.state().on_ui_thread_flag());
}
