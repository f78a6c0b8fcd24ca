//! Error taxonomy (§7, ambient C0).

use thiserror::Error;

use crate::ir::ProcName;

/// The four-case error taxonomy from §7, unified into one enum so a consumer composing this core
/// into a larger tool can match on `AnalysisError` and apply a uniform policy, while each call
/// site that can legitimately recover still does so locally (`ModelingGap`/`UnresolvedLock` are
/// logged and swallowed; only `InternalInvariant` actually propagates as an `Err`).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The classifier returned an unexpected shape (e.g. a guard constructor without a parsable
    /// lock). Policy: log at debug verbosity, continue with identity transfer.
    #[error("modeling gap in `{procname}` at a call to `{callee}`: {detail}")]
    ModelingGap { procname: ProcName, callee: ProcName, detail: String },

    /// A critical-pair pair reached the report engine in a structurally impossible
    /// configuration. Policy: fatal — indicates a defect in the analyzer; abort analysis of the
    /// affected procedure with a diagnostic.
    #[error("internal invariant violated while reporting on `{procname}`: {detail}")]
    InternalInvariant { procname: ProcName, detail: String },

    /// Callee summary not yet written. Policy: treat as bottom; the scheduler is expected to
    /// revisit.
    #[error("summary for `{callee}` requested by `{caller}` is not yet available")]
    MissingSummary { caller: ProcName, callee: ProcName },

    /// A lock expression that doesn't normalize to an accepted root. Policy: silently drop
    /// (expected for locals/temporaries).
    #[error("`{procname}` uses a lock expression that does not resolve to a formal, global, or class literal")]
    UnresolvedLock { procname: ProcName },
}

impl AnalysisError {
    /// Logs this error at the verbosity §7 specifies for its case, without deciding whether the
    /// caller should also propagate it — callers own that decision (only `InternalInvariant` is
    /// expected to be propagated as a hard `Err` in practice).
    pub fn log(&self) {
        match self {
            AnalysisError::ModelingGap { .. } | AnalysisError::UnresolvedLock { .. } => {
                log::debug!("{self}");
            }
            AnalysisError::MissingSummary { .. } => {
                log::debug!("{self}");
            }
            AnalysisError::InternalInvariant { .. } => {
                log::error!("{self}");
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
