/*!
SingleGram: the next-token frequency distribution stored under one
`prev_token` in a bigram store.

Holds a total frequency and a token-sorted `(token, freq)` list. The lookup
consumes it through `search` (normalized frequencies restricted to a token
range) and the trainer through the freq getters/setters; system and user
distributions merge by summing counts.
*/

use crate::phonetic_index::PhraseIndexRange;
use crate::phrase::Token;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleGram {
    total_freq: u32,
    /// Sorted by token, unique.
    items: Vec<(Token, u32)>,
}

impl SingleGram {
    pub fn new() -> Self {
        SingleGram::default()
    }

    pub fn get_total_freq(&self) -> u32 {
        self.total_freq
    }

    pub fn set_total_freq(&mut self, total: u32) {
        self.total_freq = total;
    }

    /// Number of distinct next tokens.
    pub fn get_length(&self) -> usize {
        self.items.len()
    }

    /// Insert a new token. Returns false (and changes nothing) if the token
    /// is already present.
    pub fn insert_freq(&mut self, token: Token, freq: u32) -> bool {
        match self.items.binary_search_by_key(&token, |&(t, _)| t) {
            Ok(_) => false,
            Err(pos) => {
                self.items.insert(pos, (token, freq));
                true
            }
        }
    }

    /// Update an existing token. Returns false if the token is absent.
    pub fn set_freq(&mut self, token: Token, freq: u32) -> bool {
        match self.items.binary_search_by_key(&token, |&(t, _)| t) {
            Ok(pos) => {
                self.items[pos].1 = freq;
                true
            }
            Err(_) => false,
        }
    }

    pub fn get_freq(&self, token: Token) -> Option<u32> {
        match self.items.binary_search_by_key(&token, |&(t, _)| t) {
            Ok(pos) => Some(self.items[pos].1),
            Err(_) => None,
        }
    }

    /// Tokens inside `range` with their normalized frequency
    /// `freq / total_freq` (0.0 when the total is unset).
    pub fn search(&self, range: &PhraseIndexRange) -> Vec<(Token, f32)> {
        let mut out = Vec::new();
        if range.begin >= range.end {
            return out;
        }

        let start = self
            .items
            .partition_point(|&(token, _)| token < range.begin);
        let total = self.total_freq as f32;
        for &(token, freq) in &self.items[start..] {
            if token >= range.end {
                break;
            }
            let norm = if total > 0.0 { freq as f32 / total } else { 0.0 };
            out.push((token, norm));
        }
        out
    }
}

/// Merge system and user distributions by summing counts; `None` when both
/// sides are absent.
pub fn merge_single_gram(
    system: Option<&SingleGram>,
    user: Option<&SingleGram>,
) -> Option<SingleGram> {
    match (system, user) {
        (None, None) => None,
        (Some(one), None) | (None, Some(one)) => Some(one.clone()),
        (Some(system), Some(user)) => {
            let mut merged = SingleGram {
                total_freq: system.total_freq.saturating_add(user.total_freq),
                items: Vec::with_capacity(system.items.len() + user.items.len()),
            };

            let (mut i, mut j) = (0, 0);
            while i < system.items.len() && j < user.items.len() {
                let (st, sf) = system.items[i];
                let (ut, uf) = user.items[j];
                if st < ut {
                    merged.items.push((st, sf));
                    i += 1;
                } else if st > ut {
                    merged.items.push((ut, uf));
                    j += 1;
                } else {
                    merged.items.push((st, sf.saturating_add(uf)));
                    i += 1;
                    j += 1;
                }
            }
            merged.items.extend_from_slice(&system.items[i..]);
            merged.items.extend_from_slice(&user.items[j..]);

            Some(merged)
        }
    }
}
