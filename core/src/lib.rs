//! libphonetic-core
//!
//! Decoder core of a sentence-level Chinese phonetic input method: the
//! phonetic key matrix, the span search over it, the beam-pruned n-best
//! Viterbi lookup under an interpolated bigram/unigram model, user
//! constraints, and the per-sentence training update.
//!
//! The pinyin/zhuyin parsers, the stateful editing façade and any CLI live
//! in sibling crates; this crate consumes their output (syllable keys with
//! raw-input spans) and the model stores.
//!
//! Public API:
//! - `PhoneticKeyMatrix` + `fill_matrix` / `fuzzy_matrix_step` - the input lattice
//! - `PhoneticIndex`, `PhraseIndex`, `Bigram` - the model stores
//! - `ForwardPhoneticConstraints` - user-pinned spans
//! - `PhoneticLookup` - n-best decoding and training
//! - `Config`, `SystemTableInfo` - tuning and versioning

use serde::{Deserialize, Serialize};

pub mod syllable;
pub use syllable::{Final, Initial, KeyRest, Middle, SyllableKey, Tone};

pub mod matrix;
pub use matrix::{fill_matrix, PhoneticKeyMatrix};

pub mod fuzzy;
pub use fuzzy::{fuzzy_matrix_step, FuzzyOptions};

pub mod phonetic_index;
pub use phonetic_index::{
    empty_ranges, PhoneticIndex, PhraseIndexRange, PhraseIndexRanges, SearchResult,
};

pub mod phrase;
pub use phrase::{
    library_index, make_token, PhraseIndex, PhraseItem, Token, MAX_PHRASE_LENGTH, NULL_TOKEN,
    SENTENCE_START,
};

pub mod search;
pub use search::{
    compute_pronunciation_possibility, increase_pronunciation_possibility, search_matrix,
};

pub mod single_gram;
pub use single_gram::{merge_single_gram, SingleGram};

pub mod bigram;
pub use bigram::Bigram;

pub mod constraints;
pub use constraints::{Constraint, ForwardPhoneticConstraints};

pub mod trellis;
pub use trellis::{ForwardPhoneticTrellis, MatchResult, TrellisNode, TrellisValue};

pub mod lookup;
pub use lookup::{convert_to_string, Model, NBestMatchResults, PhoneticLookup};

pub mod table_info;
pub use table_info::{SystemTableInfo, UserTableInfo};

/// Interpolation weight trained offline via deleted interpolation;
/// overridden by the value shipped in the system table info.
pub const DEFAULT_LAMBDA: f32 = 0.588792;

/// Decoder tuning knobs.
///
/// `lambda` weights bigram against unigram probability:
/// `score = λ·P(w2|w1) + (1−λ)·P(w2)`. `nstore` bounds the hypotheses kept
/// per trellis node, `nbest` the extracted results; n-best decoding wants
/// `nstore > 1`, plain decoding runs leaner with both at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub lambda: f32,
    pub fuzzy: FuzzyOptions,
    pub nstore: usize,
    pub nbest: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lambda: DEFAULT_LAMBDA,
            fuzzy: FuzzyOptions::NONE,
            nstore: 1,
            nbest: 1,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Utility helpers.
pub mod utils {
    /// Normalize phrase strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }
}
