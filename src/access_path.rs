//! Canonical access paths: the identifiers the rest of the core treats opaquely.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The root of an [`AccessPath`].
///
/// `Formal` roots are rebased by [`crate::summary::integrate`] when a callee's critical pairs are
/// substituted into a caller's state; `Global` and `ClassLiteral` roots pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Root {
    /// A formal parameter, identified by its zero-based index in the enclosing procedure.
    Formal(u32),
    /// A global or static variable, identified by its qualified name.
    Global(String),
    /// A synthetic root standing for a class literal (`Foo.class`, `synchronized(Foo.class)`),
    /// tagged with the class it names. Used only to build class locks, see [`crate::lock::Lock`].
    ClassLiteral(String),
    /// A local or temporary variable. Never a syntactically recognized lock (§4.1); kept as a
    /// variant here (rather than simply not constructing an `AccessPath`) so that
    /// [`crate::lock::Lock::from_access_path`] has something concrete to reject, matching "all
    /// other expressions yield `none`".
    Local(u32),
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Root::Formal(idx) => write!(f, "arg{idx}"),
            Root::Global(name) => write!(f, "{name}"),
            Root::ClassLiteral(class) => write!(f, "{class}.class"),
            Root::Local(idx) => write!(f, "local{idx}"),
        }
    }
}

/// A single field or array access appended to an [`AccessPath`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PathElement {
    Field(String),
    ArrayIndex,
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Field(name) => write!(f, ".{name}"),
            PathElement::ArrayIndex => write!(f, "[]"),
        }
    }
}

/// A canonical identifier denoting a memory location: a root followed by an ordered sequence of
/// field/array accesses (§3).
///
/// Paths are normalized at construction time (see [`AccessPath::new`]) so that the rest of the core
/// can compare and hash paths structurally without re-deriving canonical form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccessPath {
    root: Root,
    elements: Vec<PathElement>,
}

impl AccessPath {
    /// Builds a normalized access path, folding nested-class synthetic `this$N` field accesses
    /// into the enclosing-class root (§4.1) so equivalent paths reached through different inner
    /// classes canonicalize to the same value.
    pub fn new(root: Root, elements: Vec<PathElement>) -> Self {
        let elements = fold_outer_this_chains(elements);
        AccessPath { root, elements }
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// A path consisting only of its root, with no field accesses.
    pub fn bare(root: Root) -> Self {
        AccessPath { root, elements: Vec::new() }
    }

    /// Substitutes `self`'s root with `actual` if `self` is rooted at `formal_index`, leaving
    /// `Global`/`ClassLiteral` roots untouched. Returns `None` if `self` is rooted at a different
    /// formal than `formal_index` maps from (the caller is expected to try all formals, see
    /// [`crate::summary::rebase_formal`]).
    pub fn rebase(&self, formal_index: u32, actual: &AccessPath) -> Option<AccessPath> {
        match &self.root {
            Root::Formal(idx) if *idx == formal_index => {
                let mut elements = actual.elements.clone();
                elements.extend(self.elements.iter().cloned());
                Some(AccessPath::new(actual.root.clone(), elements))
            }
            _ => None,
        }
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for element in &self.elements {
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

/// Folds consecutive `this$N` synthetic outer-class field accesses that lead nowhere useful.
///
/// A nested (non-static) class in Java captures its enclosing instance in a synthetic field named
/// `this$0` (and `this$1`, `this$2`, ... for further nesting). Two paths of the form
/// `a.this$0.x` and `b.this$0.this$0.x` that ultimately name the same field `x` on the same
/// outermost enclosing instance must canonicalize identically; this pass simply drops every
/// `this$N` element, which folds any chain of synthetic outer-class hops down to the field access
/// that follows it.
fn fold_outer_this_chains(elements: Vec<PathElement>) -> Vec<PathElement> {
    elements
        .into_iter()
        .filter(|element| !is_synthetic_outer_this(element))
        .collect()
}

fn is_synthetic_outer_this(element: &PathElement) -> bool {
    matches!(element, PathElement::Field(name) if is_this_n(name))
}

fn is_this_n(name: &str) -> bool {
    name.strip_prefix("this$")
        .map(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_nested_this_chains_to_equal_paths() {
        let a = AccessPath::new(
            Root::Formal(0),
            vec![PathElement::Field("this$0".into()), PathElement::Field("x".into())],
        );
        let b = AccessPath::new(
            Root::Formal(0),
            vec![
                PathElement::Field("this$0".into()),
                PathElement::Field("this$0".into()),
                PathElement::Field("x".into()),
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_fields_remain_distinct() {
        let a = AccessPath::new(Root::Formal(0), vec![PathElement::Field("x".into())]);
        let b = AccessPath::new(Root::Formal(0), vec![PathElement::Field("y".into())]);
        assert_ne!(a, b);
    }

    #[test]
    fn rebase_substitutes_matching_formal_only() {
        let callee_path = AccessPath::new(Root::Formal(1), vec![PathElement::Field("lock".into())]);
        let actual = AccessPath::bare(Root::Global("g_counter".into()));

        let rebased = callee_path.rebase(1, &actual).unwrap();
        assert_eq!(rebased.root(), &Root::Global("g_counter".into()));
        assert_eq!(rebased.elements(), &[PathElement::Field("lock".into())]);

        assert!(callee_path.rebase(0, &actual).is_none());
    }

    #[test]
    fn global_and_class_literal_paths_are_total_ordered() {
        let mut paths = vec![
            AccessPath::bare(Root::Global("z".into())),
            AccessPath::bare(Root::ClassLiteral("A".into())),
            AccessPath::bare(Root::Formal(0)),
        ];
        paths.sort();
        // Formal < Global < ClassLiteral by derive(Ord) variant order; assert it's total and stable.
        let mut paths2 = paths.clone();
        paths2.sort();
        assert_eq!(paths, paths2);
    }
}
