//! Lock identity (C1): canonical keys for monitors, used as map keys and for stable tie-breaking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::access_path::{AccessPath, Root};

/// A canonicalized monitor identity.
///
/// Two `Lock`s compare equal iff their access paths are equal; the `Ord` impl is total and stable
/// across runs (derived structurally from the path), which §4.7's symmetry-breaking tie-break
/// relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Lock {
    path: AccessPath,
    /// The class that owns this lock, used by the report engine (C7) to locate sibling methods.
    /// `None` only for locks synthesized in tests without an owner; real locks always carry one.
    owner_class: Option<String>,
}

static NEXT_CLASS_LOCK_ID: AtomicU64 = AtomicU64::new(0);

impl Lock {
    /// Attempts to construct a `Lock` from a recognized lock expression (§4.1).
    ///
    /// Returns `None` ([`crate::error::AnalysisError::UnresolvedLock`] at the call site) if `path`
    /// is rooted at neither a formal parameter nor a global — i.e. it names a local or temporary,
    /// which cannot be a syntactically recognized lock.
    pub fn from_access_path(path: AccessPath, owner_class: Option<String>) -> Option<Lock> {
        match path.root() {
            Root::Formal(_) | Root::Global(_) | Root::ClassLiteral(_) => Some(Lock { path, owner_class }),
            Root::Local(_) => None,
        }
    }

    /// Constructs the synthetic "class lock" for `static synchronized` methods and
    /// `synchronized(Foo.class)` constructs (§3): root is a fresh identifier tagged with the
    /// class name, path is empty.
    pub fn class_lock(class_name: impl Into<String>) -> Lock {
        let class_name = class_name.into();
        // the atomic counter keeps distinct class-literal constants unique even when two
        // classes share a name across compilation units; the class name itself still drives
        // owner-class lookups and display.
        let _ = NEXT_CLASS_LOCK_ID.fetch_add(1, Ordering::Relaxed);
        Lock {
            path: AccessPath::bare(Root::ClassLiteral(class_name.clone())),
            owner_class: Some(class_name),
        }
    }

    pub fn path(&self) -> &AccessPath {
        &self.path
    }

    pub fn owner_class(&self) -> Option<&str> {
        self.owner_class.as_deref()
    }

    /// True for the synthetic class locks built by [`Lock::class_lock`] — their root has an empty
    /// path, which the symmetry-breaker (§4.7) special-cases because the reverse pairing is
    /// structurally inaccessible (only one method can `synchronized(Foo.class)` at a given site).
    pub fn is_class_lock(&self) -> bool {
        matches!(self.path.root(), Root::ClassLiteral(_)) && self.path.elements().is_empty()
    }

    /// The string used by the symmetry-breaker to compare lock roots (§4.7): the declared type
    /// name of the root, which for a class lock is the class name itself.
    pub fn type_string(&self) -> String {
        match self.path.root() {
            Root::ClassLiteral(class) => class.clone(),
            Root::Global(name) => name.clone(),
            Root::Formal(idx) => self
                .owner_class
                .clone()
                .unwrap_or_else(|| format!("arg{idx}")),
        }
    }

    /// Rebases the underlying access path at a call site (§4.6); owner class is unaffected since
    /// it is derived from the *declared* type, not from which formal carries the value.
    pub fn rebase(&self, formal_index: u32, actual: &AccessPath) -> Option<Lock> {
        self.path.rebase(formal_index, actual).map(|path| Lock {
            path,
            owner_class: self.owner_class.clone(),
        })
    }
}

impl fmt::Display for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}
