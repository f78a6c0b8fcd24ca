//! A concurrency-defect analysis core: abstract domain, transfer function, summary integration,
//! and report engine for detecting deadlocks, UI-thread starvation, Strict-Mode violations, and
//! lockless-contract violations.
//!
//! This crate deliberately does not build a CFG, parse source, or run a fixpoint loop — those are
//! external collaborators. What's here is the seam a host analyzer plugs into: feed it
//! [`ir::Instruction`]s through [`transfer::apply`], join states at merge points with
//! [`domain::AbstractState::join`], publish converged states as [`summary::Summary`], and ask
//! [`report::report_procedure`] what to report once every procedure's summary is available.

pub mod access_path;
pub mod config;
pub mod critical_pair;
pub mod domain;
pub mod error;
pub mod event;
pub mod ir;
pub mod lock;
pub mod report;
pub mod summary;
pub mod transfer;

pub use access_path::{AccessPath, PathElement, Root};
pub use config::Config;
pub use critical_pair::{CriticalPair, TraceFrame};
pub use domain::{AbstractState, GuardId, UiThreadFlag};
pub use error::{AnalysisError, Result};
pub use event::{Acquisition, Event, HeldStack, Severity, SourceLoc, TraceAnchor};
pub use ir::{Instruction, IssueLog, LockEffect, LockEffectClassifier, NoEffectModels, ProcedureAttributes, SummaryStore, TypeEnvironment};
pub use lock::Lock;
pub use report::{Issue, IssueKind};
pub use summary::Summary;
