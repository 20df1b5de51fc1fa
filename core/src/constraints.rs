//! User-pinned segments that force or forbid spans during decoding.
//!
//! A `OneStep` entry at column `i` pins a word over `[i, end)`; every
//! column strictly inside the span becomes `NoSearch`, pointing back at its
//! owner so clearing any covered column clears the whole pin. `validate`
//! re-checks the surviving pins against a mutated matrix and silently drops
//! the stale ones.

use crate::matrix::PhoneticKeyMatrix;
use crate::phrase::{PhraseIndex, Token, NULL_TOKEN};
use crate::search::compute_pronunciation_possibility;
use crate::trellis::MatchResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Constraint {
    #[default]
    NoConstraint,
    /// A pinned word covering `[column, end)`.
    OneStep { token: Token, end: usize },
    /// Covered by the `OneStep` at `owner`.
    NoSearch { owner: usize },
}

#[derive(Debug, Clone, Default)]
pub struct ForwardPhoneticConstraints {
    constraints: Vec<Constraint>,
}

impl ForwardPhoneticConstraints {
    pub fn new() -> Self {
        ForwardPhoneticConstraints::default()
    }

    /// Sized constructor for callers that know the matrix size up front.
    pub fn with_length(length: usize) -> Self {
        ForwardPhoneticConstraints {
            constraints: vec![Constraint::NoConstraint; length],
        }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// The constraint at `index`; out-of-range columns read as
    /// unconstrained.
    pub fn get(&self, index: usize) -> Constraint {
        self.constraints
            .get(index)
            .copied()
            .unwrap_or(Constraint::NoConstraint)
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    /// Pin `token` over `[start, end)`, clearing whatever the span
    /// overlapped. Returns the span length, or 0 when the span does not
    /// fit.
    pub fn add_constraint(&mut self, start: usize, end: usize, token: Token) -> usize {
        if start >= end || end > self.constraints.len() {
            return 0;
        }

        for index in start..end {
            self.clear_constraint(index);
        }

        self.constraints[start] = Constraint::OneStep { token, end };
        for index in start + 1..end {
            self.constraints[index] = Constraint::NoSearch { owner: start };
        }

        end - start
    }

    /// Clear the pin covering `index` (jumping to its owner if `index` is
    /// inside the span). Returns whether anything was cleared.
    pub fn clear_constraint(&mut self, index: usize) -> bool {
        let mut index = index;
        if index >= self.constraints.len() {
            return false;
        }

        if let Constraint::NoSearch { owner } = self.constraints[index] {
            index = owner;
        }

        let end = match self.constraints[index] {
            Constraint::NoConstraint => return false,
            Constraint::OneStep { end, .. } => end,
            // a NoSearch owner must be a OneStep
            Constraint::NoSearch { .. } => unreachable!("dangling no-search constraint"),
        };

        for i in index..end.min(self.constraints.len()) {
            self.constraints[i] = Constraint::NoConstraint;
        }

        true
    }

    /// Re-align with a (possibly mutated) matrix: resize to `matrix.size()`
    /// keeping the overlapping prefix, then drop every pin whose span ran
    /// off the end or whose pronunciation no longer fits the matrix.
    pub fn validate(&mut self, matrix: &PhoneticKeyMatrix, phrase_index: &PhraseIndex) {
        self.constraints
            .resize(matrix.size(), Constraint::NoConstraint);

        for index in 0..self.constraints.len() {
            if let Constraint::OneStep { token, end } = self.constraints[index] {
                if end >= self.constraints.len() {
                    self.clear_constraint(index);
                    continue;
                }

                let possibility = match phrase_index.get_item(token) {
                    Some(item) => compute_pronunciation_possibility(matrix, index, end, item),
                    None => 0.0,
                };
                if possibility < f32::EPSILON {
                    self.clear_constraint(index);
                }
            }
        }
    }

    /// Pin every word of `other` that differs from `best`. Returns whether
    /// anything changed.
    pub fn diff_result(&mut self, best: &MatchResult, other: &MatchResult) -> bool {
        assert_eq!(best.len(), other.len());

        let mut changed = false;

        for pos in 0..other.len() {
            let other_token = other[pos];
            if other_token == NULL_TOKEN || other_token == best[pos] {
                continue;
            }

            changed = true;

            // the tail column is never searched; a word with no successor
            // extends there
            let next_pos = (pos + 1..other.len())
                .find(|&i| other[i] != NULL_TOKEN)
                .unwrap_or(other.len() - 1);

            self.add_constraint(pos, next_pos, other_token);
        }

        changed
    }
}
