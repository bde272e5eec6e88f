//! Identity-based snapshot diffing.

use std::collections::HashSet;

use crate::comment::Comment;

#[derive(Debug, Clone, Default)]
/// Identities already accounted for during one watch run. Only ever grows.
pub struct ObservedSet {
    identities: HashSet<String>,
}

impl ObservedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a baseline fetch; nothing in the baseline is ever reported as new.
    pub fn seeded(baseline: &[Comment]) -> Self {
        Self {
            identities: baseline
                .iter()
                .map(|comment| comment.identity.clone())
                .collect(),
        }
    }

    /// Return the comments whose identity was not observed yet, in input order,
    /// and record them as observed.
    ///
    /// Edits to already observed comments are not new.
    pub fn diff(&mut self, fresh: Vec<Comment>) -> Vec<Comment> {
        fresh
            .into_iter()
            .filter(|comment| self.identities.insert(comment.identity.clone()))
            .collect()
    }
}
