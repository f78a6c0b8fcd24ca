//! Report engine (C7): scans critical pairs, composes across sibling procedures, deduplicates.

use std::collections::HashMap;

use crate::config::Config;
use crate::critical_pair::CriticalPair;
use crate::error::{AnalysisError, Result};
use crate::event::{Severity, SourceLoc};
use crate::ir::{ProcName, ProcedureAttributes, SummaryStore, TypeEnvironment};
use crate::lock::Lock;
use crate::summary::Summary;

/// The four issue kinds this core can emit (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    Deadlock,
    Starvation(Severity),
    StrictModeViolation,
    LocklessViolation,
}

impl IssueKind {
    /// The family a kind belongs to for deduplication purposes (§4.7): two `Starvation` issues of
    /// different severity still compete for the same slot at a location.
    fn family(self) -> u8 {
        match self {
            IssueKind::Deadlock => 0,
            IssueKind::Starvation(_) => 1,
            IssueKind::StrictModeViolation => 2,
            IssueKind::LocklessViolation => 3,
        }
    }
}

/// A single emitted diagnostic, carrying everything [`crate::ir::IssueLog::log`] needs to render
/// or persist it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub procname: ProcName,
    pub loc: SourceLoc,
    pub trace: Vec<String>,
    pub kind: IssueKind,
    pub message: String,
}

impl Issue {
    /// The weight used for sink deduplication (§4.7): for deadlocks and Strict-Mode violations,
    /// the negated trace length (shorter traces win); for starvation, the severity (more severe
    /// wins); lockless violations don't currently collide with one another at a single call site,
    /// so weight is constant.
    fn weight(&self) -> i64 {
        match self.kind {
            IssueKind::Deadlock | IssueKind::StrictModeViolation => -(self.trace.len() as i64),
            IssueKind::Starvation(sev) => severity_weight(sev),
            IssueKind::LocklessViolation => 0,
        }
    }
}

fn severity_weight(severity: Severity) -> i64 {
    match severity {
        Severity::Low => 0,
        Severity::Medium => 1,
        Severity::High => 2,
    }
}

/// Collects every issue the report engine finds for a single procedure `proc` with summary
/// `summary`, composing with sibling methods of lock-owner classes as needed (§4.7 steps 1-5).
///
/// Issues are returned unsorted and un-deduplicated; callers accumulating issues across an entire
/// program should pass the concatenation of every procedure's issues through [`deduplicate`]
/// before handing them to an [`crate::ir::IssueLog`].
pub fn report_procedure(
    proc: &ProcName,
    summary: &Summary,
    config: &Config,
    attrs: &dyn ProcedureAttributes,
    type_env: &dyn TypeEnvironment,
    summary_store: &dyn SummaryStore,
) -> Result<Vec<Issue>> {
    // Ineligibility (§4.7): private procedures, class initializers, and auto-generated methods
    // are not reported on, though their summaries are still consumed by sibling procedures.
    if !attrs.is_reportable(proc) {
        return Ok(Vec::new());
    }

    let mut issues = Vec::new();

    for cp in summary.state().critical_pairs() {
        // Step 1: lockless violation.
        if attrs.is_lockless(proc) {
            if let Some(lock) = cp.acquired_lock() {
                issues.push(Issue {
                    procname: proc.clone(),
                    loc: cp.loc,
                    trace: cp.make_trace("", true),
                    kind: IssueKind::LocklessViolation,
                    message: format!("`{proc}` is annotated lockless but acquires `{lock}`"),
                });
            }
        }

        // Step 2: self-deadlock. `cp.acquisitions` always contains the triggering acquisition
        // itself (§4.5), so re-acquisition shows up as *two* matching entries, not one.
        if let Some(lock) = cp.acquired_lock() {
            if cp.acquisitions.iter().filter(|acq| &acq.lock == lock).count() >= 2 {
                issues.push(Issue {
                    procname: proc.clone(),
                    loc: cp.loc,
                    trace: cp.make_trace("", true),
                    kind: IssueKind::Deadlock,
                    message: format!("Potential self deadlock: `{proc}` acquires `{lock}` twice."),
                });
            }
        }

        if config.report_starvation && cp.is_uithread() && !attrs.is_constructor(proc) {
            // Step 3: blocking on the UI thread.
            if let crate::event::Event::MayBlock { description, severity } = &cp.event {
                issues.push(starvation_issue(proc, cp, *severity, description, &[]));
            }

            // Step 4: Strict-Mode violation on the UI thread.
            if let crate::event::Event::StrictModeCall { description } = &cp.event {
                issues.push(Issue {
                    procname: proc.clone(),
                    loc: cp.loc,
                    trace: cp.make_trace("", true),
                    kind: IssueKind::StrictModeViolation,
                    message: format!("`{proc}` runs a Strict-Mode-violating call on the UI thread: {description}"),
                });
            }
        }

        // Step 5: cross-procedure deadlock / held-lock blocking.
        if let Some(lock) = cp.acquired_lock() {
            issues.extend(cross_procedure_issues(proc, cp, lock, config, attrs, type_env, summary_store)?);
        }
    }

    Ok(issues)
}

fn starvation_issue(proc: &ProcName, cp: &CriticalPair, severity: Severity, description: &str, extra_trace: &[String]) -> Issue {
    let mut trace = cp.make_trace("", true);
    trace.extend_from_slice(extra_trace);
    Issue {
        procname: proc.clone(),
        loc: cp.loc,
        trace,
        kind: IssueKind::Starvation(severity),
        message: format!("`{proc}` may block the UI thread: {description}"),
    }
}

fn cross_procedure_issues(
    proc: &ProcName,
    cp: &CriticalPair,
    lock: &Lock,
    config: &Config,
    attrs: &dyn ProcedureAttributes,
    type_env: &dyn TypeEnvironment,
    summary_store: &dyn SummaryStore,
) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();

    let Some(owner_class) = lock.owner_class() else {
        return Ok(issues);
    };

    for sibling in type_env.methods_of(&owner_class.to_string()) {
        if !attrs.is_reportable(&sibling) {
            continue;
        }

        let Some(sibling_summary) = summary_store.summary_of(&sibling) else {
            continue; // MissingSummary: treated as bottom, no pairs to compare.
        };

        for cp2 in sibling_summary.state().critical_pairs() {
            if !CriticalPair::can_run_in_parallel(cp, cp2) {
                continue;
            }

            if config.report_starvation && cp.is_uithread() && !attrs.is_constructor(proc) {
                if let crate::event::Event::MayBlock { description, severity } = &cp2.event {
                    if cp2.acquisitions.iter().any(|acq| &acq.lock == lock) {
                        let mut extra = vec![format!("`{sibling}` blocks while holding `{lock}`:")];
                        extra.extend(cp2.make_trace("  ", true));
                        issues.push(starvation_issue(proc, cp, *severity, description, &extra));
                    }
                }
            }

            if config.report_deadlocks {
                if let Some(lock2) = deadlock_candidate(cp, cp2, proc)? {
                    if CriticalPair::may_deadlock(cp, cp2) && should_report(lock, &lock2, cp.loc, cp2.loc, config) {
                        issues.push(deadlock_issue(proc, cp, &sibling, cp2));
                    }
                }
            }
        }
    }

    Ok(issues)
}

fn deadlock_issue(proc: &ProcName, cp: &CriticalPair, sibling: &ProcName, cp2: &CriticalPair) -> Issue {
    let mut trace = cp.make_trace("", true);
    trace.push(format!("conflicts with `{sibling}`:"));
    trace.extend(cp2.make_trace("  ", true));

    Issue {
        procname: proc.clone(),
        loc: cp.loc,
        trace,
        kind: IssueKind::Deadlock,
        message: format!(
            "Potential deadlock: `{proc}` and `{sibling}` acquire `{}` and `{}` in opposite orders.",
            cp.acquired_lock().unwrap(),
            cp2.acquired_lock().unwrap()
        ),
    }
}

/// Guards the structurally-impossible configuration §7's `InternalInvariant` names: a deadlock
/// candidate pair where either side isn't actually a `LockAcquire`. Every call site in this module
/// only reaches here after already matching on `LockAcquire`, so this should never observe the
/// error arm in practice — it exists so a defect upstream (e.g. a future refactor that stops
/// gating on the event variant) fails loudly instead of silently mis-reporting.
fn deadlock_candidate(cp: &CriticalPair, cp2: &CriticalPair, procname: &ProcName) -> Result<Option<Lock>> {
    match (cp.acquired_lock(), cp2.acquired_lock()) {
        (Some(_), Some(lock2)) => Ok(Some(lock2.clone())),
        (None, None) => Ok(None),
        _ => Err(AnalysisError::InternalInvariant {
            procname: procname.clone(),
            detail: "deadlock candidate pair with mismatched event shapes (one LockAcquire, one not)".into(),
        }),
    }
}

/// Symmetry-breaking (§4.7): avoids reporting each deadlock pair twice.
///
/// - Class-lock roots always report — the reverse pairing is structurally inaccessible (S2).
/// - Otherwise, compare the two locks' root type strings; report only when the first sorts
///   strictly before the second, or when they're equal and the first's location sorts before the
///   second's (S1: exactly one direction reports).
/// - If deduplication is disabled, always report (both directions fire).
fn should_report(lock: &Lock, lock2: &Lock, loc: SourceLoc, loc2: SourceLoc, config: &Config) -> bool {
    if !config.deduplicate {
        return true;
    }

    if lock.is_class_lock() || lock2.is_class_lock() {
        return true;
    }

    match lock.type_string().cmp(&lock2.type_string()) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Equal => loc < loc2,
        std::cmp::Ordering::Greater => false,
    }
}

/// Deduplicates a flat collection of issues (§4.7 "Deduplication at sink"): groups by `(loc,
/// kind family)`, keeps the highest-weight issue in each group, and suffixes its message with a
/// suppression note when others were dropped. A no-op when `config.deduplicate` is `false`.
pub fn deduplicate(issues: Vec<Issue>, config: &Config) -> Vec<Issue> {
    if !config.deduplicate {
        return issues;
    }

    let mut groups: HashMap<(SourceLoc, u8), Vec<Issue>> = HashMap::new();
    for issue in issues {
        groups.entry((issue.loc, issue.kind.family())).or_default().push(issue);
    }

    let mut result = Vec::with_capacity(groups.len());
    for (_, mut group) in groups {
        group.sort_by_key(|issue| -issue.weight());
        let suppressed = group.len() - 1;
        let mut winner = group.remove(0);
        if suppressed > 0 {
            winner.message = format!(
                "{} ({suppressed} additional report{} on this line suppressed)",
                winner.message,
                if suppressed == 1 { "" } else { "s" }
            );
        }
        result.push(winner);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_path::{AccessPath, Root};
    use crate::domain::AbstractState;
    use crate::event::{Acquisition, Event};
    use std::collections::HashMap as StdHashMap;

    fn lock(name: &str, owner: &str) -> Lock {
        Lock::from_access_path(AccessPath::bare(Root::Global(name.into())), Some(owner.into())).unwrap()
    }

    struct FixtureAttrs {
        lockless: StdHashMap<String, bool>,
        constructors: StdHashMap<String, bool>,
    }

    impl ProcedureAttributes for FixtureAttrs {
        fn is_lockless(&self, proc: &ProcName) -> bool {
            *self.lockless.get(proc).unwrap_or(&false)
        }
        fn is_constructor(&self, proc: &ProcName) -> bool {
            *self.constructors.get(proc).unwrap_or(&false)
        }
        fn is_reportable(&self, _proc: &ProcName) -> bool {
            true
        }
    }

    struct FixtureTypeEnv {
        methods: StdHashMap<String, Vec<String>>,
    }

    impl TypeEnvironment for FixtureTypeEnv {
        fn methods_of(&self, class: &String) -> Vec<ProcName> {
            self.methods.get(class).cloned().unwrap_or_default()
        }
        fn owner_class_of(&self, _path: &AccessPath) -> Option<String> {
            None
        }
    }

    struct FixtureStore {
        summaries: StdHashMap<String, Summary>,
    }

    impl SummaryStore for FixtureStore {
        fn summary_of(&self, procname: &ProcName) -> Option<Summary> {
            self.summaries.get(procname).cloned()
        }
        fn write(&mut self, procname: ProcName, summary: Summary) {
            self.summaries.insert(procname, summary);
        }
    }

    fn no_op_attrs() -> FixtureAttrs {
        FixtureAttrs { lockless: StdHashMap::new(), constructors: StdHashMap::new() }
    }

    #[test]
    fn self_deadlock_is_reported() {
        let mut state = AbstractState::bottom();
        let l = lock("a", "Foo");
        state.record_lock_acquire(Acquisition::new(l.clone(), "m", SourceLoc::new(0, 1, 0)), SourceLoc::new(0, 1, 0));
        state.record_lock_acquire(Acquisition::new(l, "m", SourceLoc::new(0, 2, 0)), SourceLoc::new(0, 2, 0));
        let summary = Summary::from_final_state(state);

        let attrs = no_op_attrs();
        let type_env = FixtureTypeEnv { methods: StdHashMap::new() };
        let store = FixtureStore { summaries: StdHashMap::new() };
        let config = Config::default();

        let issues = report_procedure(&"m".to_string(), &summary, &config, &attrs, &type_env, &store).unwrap();
        assert!(issues.iter().any(|i| i.kind == IssueKind::Deadlock && i.message.contains("self deadlock")));
    }

    #[test]
    fn lockless_violation_is_reported() {
        let mut state = AbstractState::bottom();
        state.record_lock_acquire(Acquisition::new(lock("a", "Foo"), "m", SourceLoc::new(0, 1, 0)), SourceLoc::new(0, 1, 0));
        let summary = Summary::from_final_state(state);

        let mut lockless = StdHashMap::new();
        lockless.insert("m".to_string(), true);
        let attrs = FixtureAttrs { lockless, constructors: StdHashMap::new() };
        let type_env = FixtureTypeEnv { methods: StdHashMap::new() };
        let store = FixtureStore { summaries: StdHashMap::new() };
        let config = Config::default();

        let issues = report_procedure(&"m".to_string(), &summary, &config, &attrs, &type_env, &store).unwrap();
        assert!(issues.iter().any(|i| i.kind == IssueKind::LocklessViolation));
    }

    #[test]
    fn ui_thread_block_is_reported_as_starvation() {
        let mut state = AbstractState::bottom();
        state.set_on_ui_thread();
        state.record_event(Event::MayBlock { description: "Thread.sleep".into(), severity: Severity::High }, SourceLoc::new(0, 1, 0));
        let summary = Summary::from_final_state(state);

        let attrs = no_op_attrs();
        let type_env = FixtureTypeEnv { methods: StdHashMap::new() };
        let store = FixtureStore { summaries: StdHashMap::new() };
        let config = Config::default();

        let issues = report_procedure(&"onClick".to_string(), &summary, &config, &attrs, &type_env, &store).unwrap();
        assert!(issues.iter().any(|i| matches!(i.kind, IssueKind::Starvation(Severity::High))));
    }

    #[test]
    fn constructors_are_not_reported_for_starvation() {
        let mut state = AbstractState::bottom();
        state.set_on_ui_thread();
        state.record_event(Event::MayBlock { description: "Thread.sleep".into(), severity: Severity::High }, SourceLoc::new(0, 1, 0));
        let summary = Summary::from_final_state(state);

        let mut constructors = StdHashMap::new();
        constructors.insert("<init>".to_string(), true);
        let attrs = FixtureAttrs { lockless: StdHashMap::new(), constructors };
        let type_env = FixtureTypeEnv { methods: StdHashMap::new() };
        let store = FixtureStore { summaries: StdHashMap::new() };
        let config = Config::default();

        let issues = report_procedure(&"<init>".to_string(), &summary, &config, &attrs, &type_env, &store).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn cross_procedure_deadlock_reports_once_via_symmetry_breaking() {
        // m1: acquires a then b. m2: acquires b then a. Both in class Foo.
        let mut m1_state = AbstractState::bottom();
        m1_state.record_lock_acquire(Acquisition::new(lock("a", "Foo"), "m1", SourceLoc::new(0, 1, 0)), SourceLoc::new(0, 1, 0));
        m1_state.record_lock_acquire(Acquisition::new(lock("b", "Foo"), "m1", SourceLoc::new(0, 2, 0)), SourceLoc::new(0, 2, 0));
        let m1_summary = Summary::from_final_state(m1_state);

        let mut m2_state = AbstractState::bottom();
        m2_state.record_lock_acquire(Acquisition::new(lock("b", "Foo"), "m2", SourceLoc::new(0, 3, 0)), SourceLoc::new(0, 3, 0));
        m2_state.record_lock_acquire(Acquisition::new(lock("a", "Foo"), "m2", SourceLoc::new(0, 4, 0)), SourceLoc::new(0, 4, 0));
        let m2_summary = Summary::from_final_state(m2_state);

        let attrs = no_op_attrs();
        let mut methods = StdHashMap::new();
        methods.insert("Foo".to_string(), vec!["m1".to_string(), "m2".to_string()]);
        let type_env = FixtureTypeEnv { methods };

        let mut summaries = StdHashMap::new();
        summaries.insert("m1".to_string(), m1_summary.clone());
        summaries.insert("m2".to_string(), m2_summary.clone());
        let store = FixtureStore { summaries };
        let config = Config::default();

        let m1_issues = report_procedure(&"m1".to_string(), &m1_summary, &config, &attrs, &type_env, &store).unwrap();
        let m2_issues = report_procedure(&"m2".to_string(), &m2_summary, &config, &attrs, &type_env, &store).unwrap();

        let all: Vec<_> = m1_issues.into_iter().chain(m2_issues).filter(|i| i.kind == IssueKind::Deadlock).collect();
        // Exactly one direction reports (S1): either m1->m2 or m2->m1, never both, never neither.
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn deduplicate_keeps_the_shorter_trace_deadlock() {
        let short = Issue {
            procname: "m".into(),
            loc: SourceLoc::new(0, 1, 0),
            trace: vec!["a".into(), "b".into(), "c".into()],
            kind: IssueKind::Deadlock,
            message: "short".into(),
        };
        let long = Issue {
            procname: "m".into(),
            loc: SourceLoc::new(0, 1, 0),
            trace: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            kind: IssueKind::Deadlock,
            message: "long".into(),
        };

        let config = Config::default();
        let result = deduplicate(vec![short, long], &config);
        assert_eq!(result.len(), 1);
        assert!(result[0].message.starts_with("short"));
        assert!(result[0].message.contains("1 additional report"));
    }

    #[test]
    fn deduplicate_disabled_emits_all() {
        let a = Issue {
            procname: "m".into(),
            loc: SourceLoc::new(0, 1, 0),
            trace: vec![],
            kind: IssueKind::Deadlock,
            message: "a".into(),
        };
        let b = a.clone();

        let mut config = Config::default();
        config.deduplicate = false;
        let result = deduplicate(vec![a, b], &config);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn deadlock_candidate_is_an_internal_invariant_when_shapes_mismatch() {
        let cp = CriticalPair::new(vec![], Event::MayBlock { description: "x".into(), severity: Severity::Low }, SourceLoc::new(0, 1, 0), false);
        let cp2 = CriticalPair::new(vec![], Event::LockAcquire(lock("a", "Foo")), SourceLoc::new(0, 2, 0), false);

        let result = deadlock_candidate(&cp, &cp2, &"m".to_string());
        assert!(matches!(result, Err(AnalysisError::InternalInvariant { .. })));
    }
}
