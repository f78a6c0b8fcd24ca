//! Transfer function (C5): interprets IR instructions as domain transformers.

use crate::access_path::AccessPath;
use crate::domain::{AbstractState, GuardId};
use crate::error::{AnalysisError, Result};
use crate::event::Event;
use crate::ir::{Instruction, LockEffect, LockEffectClassifier, ProcName, TypeEnvironment};
use crate::lock::Lock;
use crate::summary;

/// Applies `instr` to `state`, mutating it in place (§4.5).
///
/// `procname` is the enclosing procedure, used to stamp new [`crate::event::Acquisition`]s and to
/// key summary-store lookups. Errors other than [`AnalysisError::InternalInvariant`] are logged
/// and absorbed here per §7's policy table; only a defect that the report engine alone can detect
/// propagates as an `Err`, so this function never returns one in practice, but keeps the `Result`
/// signature for symmetry with [`crate::report`] and future-proofing against a classifier that
/// needs to signal a hard failure.
pub fn apply(
    state: &mut AbstractState,
    procname: &ProcName,
    instr: &Instruction,
    classifier: &dyn LockEffectClassifier,
    type_env: &dyn TypeEnvironment,
    summary_store: &dyn crate::ir::SummaryStore,
) -> Result<()> {
    let Instruction::DirectCall { callee, args, loc } = instr else {
        // Assignment / assumption / metadata / indirect call: identity.
        return Ok(());
    };

    match classifier.classify(callee, args) {
        LockEffect::Lock(paths) => {
            for path in &paths {
                match lock_from_path(path, type_env) {
                    Some(lock) => {
                        let acquisition = crate::event::Acquisition::new(lock, procname.clone(), *loc);
                        state.record_lock_acquire(acquisition, *loc);
                    }
                    None => AnalysisError::UnresolvedLock { procname: procname.clone() }.log(),
                }
            }
        }
        LockEffect::Unlock(paths) => {
            // Unmatched unlocks (including unresolved lock expressions) are silently ignored.
            for path in &paths {
                if let Some(lock) = lock_from_path(path, type_env) {
                    state.record_unlock(&lock);
                }
            }
        }
        LockEffect::GuardConstruct { guard, lock, acquire_now } => match lock_from_path(&lock, type_env) {
            Some(lock) => {
                state.bind_guard(guard, lock.clone());
                if acquire_now {
                    let acquisition = crate::event::Acquisition::new(lock, procname.clone(), *loc);
                    state.record_lock_acquire(acquisition, *loc);
                }
            }
            None => AnalysisError::ModelingGap {
                procname: procname.clone(),
                callee: callee.clone(),
                detail: "guard constructor without a parsable lock".into(),
            }
            .log(),
        },
        LockEffect::GuardLock(guard) => apply_guard_op(state, procname, callee, guard, *loc, GuardOp::Lock),
        LockEffect::GuardUnlock(guard) => apply_guard_op(state, procname, callee, guard, *loc, GuardOp::Unlock),
        LockEffect::GuardDestroy(guard) => {
            apply_guard_op(state, procname, callee, guard, *loc, GuardOp::Unlock);
            state.unbind_guard(guard);
        }
        // identity: no unconditional effect.
        LockEffect::LockedIfTrue(_) | LockEffect::GuardLockedIfTrue(_) => {}
        LockEffect::NoEffect => apply_no_effect(state, procname, callee, args, *loc, classifier, type_env, summary_store),
    }

    Ok(())
}

enum GuardOp {
    Lock,
    Unlock,
}

fn apply_guard_op(
    state: &mut AbstractState,
    procname: &ProcName,
    callee: &ProcName,
    guard: GuardId,
    loc: crate::event::SourceLoc,
    op: GuardOp,
) {
    let Some(lock) = state.guard_lock(guard).cloned() else {
        AnalysisError::ModelingGap {
            procname: procname.clone(),
            callee: callee.clone(),
            detail: "guard operation on an unbound guard id".into(),
        }
        .log();
        return;
    };

    match op {
        GuardOp::Lock => {
            let acquisition = crate::event::Acquisition::new(lock, procname.clone(), loc);
            state.record_lock_acquire(acquisition, loc);
        }
        GuardOp::Unlock => state.record_unlock(&lock),
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_no_effect(
    state: &mut AbstractState,
    procname: &ProcName,
    callee: &ProcName,
    args: &[AccessPath],
    loc: crate::event::SourceLoc,
    classifier: &dyn LockEffectClassifier,
    type_env: &dyn TypeEnvironment,
    summary_store: &dyn crate::ir::SummaryStore,
) {
    let models = classifier.no_effect_models(callee, args);

    if let Some(path) = &models.synchronized_wrapper_lock {
        match lock_from_path(path, type_env) {
            Some(lock) => {
                // Acquire then release, combining effects (§4.5).
                let acquisition = crate::event::Acquisition::new(lock.clone(), procname.clone(), loc);
                state.record_lock_acquire(acquisition, loc);
                state.record_unlock(&lock);
            }
            None => AnalysisError::UnresolvedLock { procname: procname.clone() }.log(),
        }
        return;
    }

    if models.ui_thread_marker {
        state.set_on_ui_thread();
        return;
    }

    if let Some(description) = models.strict_mode_violation {
        state.record_event(Event::StrictModeCall { description }, loc);
        return;
    }

    if let Some((description, severity)) = models.may_block {
        if !classifier.suppress_blocking_analysis(callee) {
            state.record_event(Event::MayBlock { description, severity }, loc);
        }
        return;
    }

    if models.skip_analysis {
        // Identity — prevents runaway traversal into stdlib.
        return;
    }

    match summary_store.read(procname, callee) {
        Some(callee_summary) => summary::integrate_with_args(state, &callee_summary, callee, args, loc),
        None => AnalysisError::MissingSummary { caller: procname.clone(), callee: callee.clone() }.log(),
    }
}

/// C1: constructs a [`Lock`] from a recognized access path, deriving the owner-class attribute
/// from the type environment. Returns `None` for a local/temporary root ([`AnalysisError::UnresolvedLock`]).
fn lock_from_path(path: &AccessPath, type_env: &dyn TypeEnvironment) -> Option<Lock> {
    let owner_class = type_env.owner_class_of(path);
    Lock::from_access_path(path.clone(), owner_class)
}
