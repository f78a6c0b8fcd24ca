//! IR instruction variant and external collaborator interfaces (§6).
//!
//! None of the types in this module know how to build a CFG, parse source, or run a fixpoint
//! loop — those are explicitly out of scope (§1) and are expected to be supplied by the host
//! engine. What lives here is the seam: the instruction shape the transfer function (C5)
//! interprets, and the trait objects a host plugs in for lock-effect classification, type
//! resolution, procedure attributes, and persistence.

use crate::access_path::AccessPath;
use crate::domain::GuardId;
use crate::event::{Severity, SourceLoc};

/// A procedure identifier. Opaque beyond equality/ordering/display; the host IR decides what it
/// actually denotes (a mangled symbol, a qualified method name, ...).
pub type ProcName = String;

/// A class identifier, as used by [`TypeEnvironment`] and [`Lock::owner_class`](crate::lock::Lock::owner_class).
pub type ClassName = String;

/// One instruction in a procedure's CFG, as the transfer function (C5) sees it.
///
/// `Assignment`, `Assume`, `Metadata`, and `IndirectCall` are identity transformers (§4.5) and are
/// folded into a single [`Instruction::Other`] variant here since the core never distinguishes
/// between them; only the shape of a [`Instruction::DirectCall`] drives any domain transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Assignment, assumption, metadata, or an indirect call — identity under the transfer
    /// function.
    Other,
    /// A direct call `callee(args)` at `loc`.
    DirectCall { callee: ProcName, args: Vec<AccessPath>, loc: SourceLoc },
}

/// The lock-effect classification of a direct call (§6), as returned by
/// [`LockEffectClassifier::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEffect {
    /// Acquires each of the given (already lock-identified) paths.
    Lock(Vec<AccessPath>),
    /// Releases each of the given paths.
    Unlock(Vec<AccessPath>),
    /// Constructs a scoped guard bound to `lock`; if `acquire_now`, the construction itself also
    /// acquires the lock (e.g. `MutexGuard::new` vs. a deferred-lock guard type).
    GuardConstruct { guard: GuardId, lock: AccessPath, acquire_now: bool },
    GuardLock(GuardId),
    GuardUnlock(GuardId),
    GuardDestroy(GuardId),
    /// A call that acquires a lock only along a conditional branch; §4.5 models this as identity
    /// since the unconditional transfer function cannot express the condition.
    LockedIfTrue(AccessPath),
    GuardLockedIfTrue(GuardId),
    /// The call has no direct lock effect by itself. The transfer function goes on to consult the
    /// finer-grained models below to decide what, if anything, a `NoEffect` call actually does
    /// (§4.5's "NoEffect with ... model" cases).
    NoEffect,
}

/// Per `NoEffect` call, finer classification into the models §4.5 names individually. Exactly one
/// of these should match for any given `NoEffect` call in practice; if none match, the transfer
/// function integrates the callee's summary (§4.6).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoEffectModels {
    /// Models a synchronized-wrapper call (Java `synchronized` block desugared to a call, or a
    /// library wrapper that internally locks and releases around its body) as an immediate
    /// acquire-then-release of the given argument's lock.
    pub synchronized_wrapper_lock: Option<AccessPath>,
    /// True if this call is the Java UI-thread marker (e.g. `Looper.getMainLooper()` context
    /// check) that sets `on_ui_thread = true` unconditionally for the remainder of the procedure.
    pub ui_thread_marker: bool,
    /// A description if this call is a statically-known Strict-Mode-violating call.
    pub strict_mode_violation: Option<String>,
    /// A description and severity if this call is a statically-known blocking call.
    pub may_block: Option<(String, Severity)>,
    /// True if this callee is known to be uninteresting (e.g. into the standard library) and
    /// traversal should stop here rather than attempt callee-summary integration.
    pub skip_analysis: bool,
}

/// The lock-effect classifier (§6): given a callee identity and actuals, returns a [`LockEffect`].
/// A separate, optional refinement is consulted for `NoEffect` calls via [`NoEffectModels`].
///
/// This is the "library of lock-effect models for specific APIs" explicitly out of scope for this
/// core (§1) — the core only defines the seam.
pub trait LockEffectClassifier {
    fn classify(&self, callee: &ProcName, args: &[AccessPath]) -> LockEffect;

    /// Consulted only when [`Self::classify`] returns [`LockEffect::NoEffect`]. The default
    /// returns all-`None`/`false`, i.e. "integrate the callee summary" (§4.5's final fallback).
    fn no_effect_models(&self, _callee: &ProcName, _args: &[AccessPath]) -> NoEffectModels {
        NoEffectModels::default()
    }

    /// Whether C++/Objective-C blocking-call analysis is suppressed for this callee's language
    /// (§4.5: "C++/Objective-C: only deadlock behavior is meaningful; blocking-call analysis is
    /// suppressed"). Java callees (the default) never suppress.
    fn suppress_blocking_analysis(&self, _callee: &ProcName) -> bool {
        false
    }
}

/// Resolves class names to method tables (§6).
pub trait TypeEnvironment {
    /// All methods of `class` eligible for C7's cross-procedure composition: declared methods
    /// plus those inherited from superclasses, per §4.7 step 5 ("Enumerate reportable methods of
    /// `K` (declared + inherited)").
    fn methods_of(&self, class: &ClassName) -> Vec<ProcName>;

    /// The declared type of `path`'s root, used by C1 to derive a [`crate::lock::Lock`]'s
    /// owner-class attribute. `None` for roots the type environment cannot resolve (e.g. a path
    /// rooted at a formal of primitive type, which cannot be a lock anyway).
    fn owner_class_of(&self, path: &AccessPath) -> Option<ClassName>;
}

/// Annotation/attribute lookups the report engine (C7) needs (§6).
pub trait ProcedureAttributes {
    fn is_lockless(&self, proc: &ProcName) -> bool;
    fn is_constructor(&self, proc: &ProcName) -> bool;
    /// Private procedures, class initializers, and auto-generated methods are ineligible for
    /// reporting (§4.7 "Ineligibility") even though their summaries are still consumed.
    fn is_reportable(&self, proc: &ProcName) -> bool;
}

/// `read(caller, callee) -> summary option`, `write(procname, summary)` (§6).
pub trait SummaryStore {
    /// Looks up `callee`'s summary for integration into `caller`'s state (§4.6). The distinction
    /// from [`Self::summary_of`] exists only so an implementation can apply call-site-specific
    /// policy (e.g. excluding a summary that hasn't converged for this particular caller yet); the
    /// default just forwards.
    fn read(&self, caller: &ProcName, callee: &ProcName) -> Option<crate::summary::Summary> {
        let _ = caller;
        self.summary_of(callee)
    }

    /// Looks up any procedure's published summary directly — used by the report engine (C7) to
    /// fetch sibling methods' summaries when composing cross-procedure deadlock/starvation checks.
    fn summary_of(&self, procname: &ProcName) -> Option<crate::summary::Summary>;

    fn write(&mut self, procname: ProcName, summary: crate::summary::Summary);
}

/// `log(procname, severity, location, trace, issue_kind, message)` (§6); persistence format is
/// opaque to the core.
pub trait IssueLog {
    fn log(&mut self, issue: crate::report::Issue);
}
