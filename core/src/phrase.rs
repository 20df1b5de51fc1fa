//! Phrase items and the layered phrase index.
//!
//! A token is a 32-bit word identifier: the high nibble selects one of 16
//! sub-libraries (system dictionary, user dictionary, addon dictionaries...),
//! the low 24 bits are the id inside that library. `PhraseItem` carries the
//! phrase string, its unigram frequency and its pronunciation distribution;
//! `PhraseIndex` resolves tokens to items and keeps the global unigram total
//! used for normalization.

use crate::utils;
use crate::SyllableKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// 32-bit word identifier; see module docs for the layout.
pub type Token = u32;

/// Marks the absence of a word in a match result.
pub const NULL_TOKEN: Token = 0;

/// The universal sentence prefix token.
pub const SENTENCE_START: Token = 1;

pub const PHRASE_MASK: Token = 0x00FF_FFFF;
pub const PHRASE_INDEX_LIBRARY_MASK: Token = 0x0F00_0000;
pub const PHRASE_INDEX_LIBRARY_COUNT: usize = 16;

/// Longest phrase, in syllables, the phonetic index will be probed with.
pub const MAX_PHRASE_LENGTH: usize = 16;

/// Compose a token from a library index and an intra-library id.
pub fn make_token(library: usize, index: u32) -> Token {
    (((library as Token) << 24) & PHRASE_INDEX_LIBRARY_MASK) | (index & PHRASE_MASK)
}

/// The library nibble of a token.
pub fn library_index(token: Token) -> usize {
    ((token & PHRASE_INDEX_LIBRARY_MASK) >> 24) as usize
}

/// One way to pronounce a phrase, with its observation count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pronunciation {
    pub keys: Vec<SyllableKey>,
    pub freq: u32,
}

/// A dictionary word: string, unigram frequency and pronunciation
/// distribution. The conditional probability of a pronunciation is its
/// count over the sum of all counts for the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseItem {
    phrase: String,
    unigram_freq: u32,
    pronunciations: Vec<Pronunciation>,
}

impl PhraseItem {
    /// Create an item with a single pronunciation.
    pub fn new(phrase: &str, unigram_freq: u32, keys: Vec<SyllableKey>) -> Self {
        PhraseItem {
            phrase: utils::normalize(phrase),
            unigram_freq,
            pronunciations: vec![Pronunciation { keys, freq: 1 }],
        }
    }

    pub fn phrase_string(&self) -> &str {
        &self.phrase
    }

    /// Phrase length in characters.
    pub fn phrase_length(&self) -> usize {
        self.phrase.chars().count()
    }

    pub fn unigram_frequency(&self) -> u32 {
        self.unigram_freq
    }

    pub fn add_unigram_frequency(&mut self, delta: u32) {
        self.unigram_freq = self.unigram_freq.saturating_add(delta);
    }

    /// Register another pronunciation (or reinforce an existing one).
    pub fn add_pronunciation(&mut self, keys: Vec<SyllableKey>, freq: u32) {
        match self.pronunciations.iter_mut().find(|p| p.keys == keys) {
            Some(p) => p.freq = p.freq.saturating_add(freq),
            None => self.pronunciations.push(Pronunciation { keys, freq }),
        }
    }

    /// P(keys | phrase): the conditional probability that this word is
    /// pronounced with exactly these syllables. Zero when the pronunciation
    /// is not listed.
    pub fn get_pronunciation_possibility(&self, keys: &[SyllableKey]) -> f32 {
        let total: u64 = self.pronunciations.iter().map(|p| p.freq as u64).sum();
        if total == 0 {
            return 0.0;
        }
        match self.pronunciations.iter().find(|p| p.keys == keys) {
            Some(p) => p.freq as f32 / total as f32,
            None => 0.0,
        }
    }

    /// Reinforce a listed pronunciation by `delta`. A pronunciation the item
    /// does not list is left untouched.
    pub fn increase_pronunciation_possibility(&mut self, keys: &[SyllableKey], delta: u32) {
        if let Some(p) = self.pronunciations.iter_mut().find(|p| p.keys == keys) {
            p.freq = p.freq.saturating_add(delta);
        }
    }
}

/// Token → item table, split into 16 sub-libraries by the token's high
/// nibble. Tracks the total unigram frequency for probability
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseIndex {
    libraries: Vec<HashMap<u32, PhraseItem>>,
    total_freq: u64,
}

impl Default for PhraseIndex {
    fn default() -> Self {
        PhraseIndex::new()
    }
}

impl PhraseIndex {
    pub fn new() -> Self {
        PhraseIndex {
            libraries: (0..PHRASE_INDEX_LIBRARY_COUNT).map(|_| HashMap::new()).collect(),
            total_freq: 0,
        }
    }

    /// Add (or replace) an item. Replacing adjusts the unigram total.
    pub fn add_item(&mut self, token: Token, item: PhraseItem) {
        let freq = item.unigram_frequency() as u64;
        let library = &mut self.libraries[library_index(token)];
        if let Some(old) = library.insert(token & PHRASE_MASK, item) {
            self.total_freq -= old.unigram_frequency() as u64;
        }
        self.total_freq += freq;
    }

    /// Resolve a token. `None` means the token is unknown and the caller
    /// skips the hypothesis.
    pub fn get_item(&self, token: Token) -> Option<&PhraseItem> {
        self.libraries[library_index(token)].get(&(token & PHRASE_MASK))
    }

    pub fn get_item_mut(&mut self, token: Token) -> Option<&mut PhraseItem> {
        self.libraries[library_index(token)].get_mut(&(token & PHRASE_MASK))
    }

    /// Bump a word's unigram frequency, keeping the global total in sync.
    /// Returns false for unknown tokens.
    pub fn add_unigram_frequency(&mut self, token: Token, delta: u32) -> bool {
        match self.get_item_mut(token) {
            Some(item) => {
                item.add_unigram_frequency(delta);
                self.total_freq += delta as u64;
                true
            }
            None => false,
        }
    }

    /// Total unigram frequency across every library.
    pub fn total_freq(&self) -> u64 {
        self.total_freq
    }

    /// Snapshot to disk (write-to-temp then rename).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let index: Self = bincode::deserialize_from(reader)?;
        Ok(index)
    }
}
