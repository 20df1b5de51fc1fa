//! Syllable-sequence → token-range index.
//!
//! The index maps a sequence of syllable keys (packed to big-endian bytes,
//! so byte order equals canonical key order) to the tokens pronounced that
//! way, reported as contiguous per-library token ranges. A search also
//! reports whether any *longer* stored key extends the probe, which is what
//! lets the decoder stop widening a span.
//!
//! Two backends, same as the lexicon elsewhere in this codebase family: an
//! in-memory ordered map for dynamically built tables, and an `fst::Map`
//! plus a bincode payload vector for tables loaded from disk.

use crate::phrase::{library_index, Token, PHRASE_INDEX_LIBRARY_COUNT};
use crate::syllable::SyllableKey;
use anyhow::Context;
use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::ops::Bound;
use std::path::Path;

/// Outcome flags of an index or span search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult(pub u32);

impl SearchResult {
    /// Found nothing.
    pub const NONE: SearchResult = SearchResult(0);
    /// At least one token matched.
    pub const OK: SearchResult = SearchResult(1);
    /// A longer key extends the probe; widening the span can still match.
    pub const CONTINUED: SearchResult = SearchResult(2);

    pub fn contains(self, other: SearchResult) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SearchResult {
    type Output = SearchResult;

    fn bitor(self, rhs: SearchResult) -> SearchResult {
        SearchResult(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for SearchResult {
    fn bitor_assign(&mut self, rhs: SearchResult) {
        self.0 |= rhs.0;
    }
}

/// Half-open token range `[begin, end)` inside one library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseIndexRange {
    pub begin: Token,
    pub end: Token,
}

/// One range list per phrase library.
pub type PhraseIndexRanges = [Vec<PhraseIndexRange>; PHRASE_INDEX_LIBRARY_COUNT];

pub fn empty_ranges() -> PhraseIndexRanges {
    std::array::from_fn(|_| Vec::new())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(bytes)?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn pack_keys(keys: &[SyllableKey]) -> Vec<u8> {
    let mut out = Vec::with_capacity(keys.len() * 2);
    for key in keys {
        out.extend_from_slice(&key.pack().to_be_bytes());
    }
    out
}

/// Append sorted tokens to `ranges`, merging consecutive ids of the same
/// library into one contiguous range.
fn collect_ranges(tokens: &[Token], ranges: &mut PhraseIndexRanges) {
    for &token in tokens {
        let library = library_index(token);
        match ranges[library].last_mut() {
            Some(range) if range.end == token => range.end = token + 1,
            _ => ranges[library].push(PhraseIndexRange {
                begin: token,
                end: token + 1,
            }),
        }
    }
}

/// The phonetic table.
#[derive(Debug, Default)]
pub struct PhoneticIndex {
    /// Dynamically inserted entries, ordered by packed key bytes.
    map: BTreeMap<Vec<u8>, Vec<Token>>,
    /// Disk-loaded artifacts: key bytes → payload offset, and the payloads.
    fst_map: Option<Map<Vec<u8>>>,
    payloads: Option<Vec<Vec<Token>>>,
}

impl PhoneticIndex {
    pub fn new() -> Self {
        PhoneticIndex::default()
    }

    /// Register `token` under the pronunciation `keys`. Tokens stay sorted
    /// per key so searches yield contiguous ranges.
    pub fn insert(&mut self, keys: &[SyllableKey], token: Token) {
        let tokens = self.map.entry(pack_keys(keys)).or_default();
        if let Err(pos) = tokens.binary_search(&token) {
            tokens.insert(pos, token);
        }
    }

    /// Exact-prefix search. Appends matched ranges to `ranges` and returns
    /// `OK`/`CONTINUED` flags.
    pub fn search(&self, keys: &[SyllableKey], ranges: &mut PhraseIndexRanges) -> SearchResult {
        debug_assert!(!keys.is_empty());

        let probe = pack_keys(keys);
        let mut result = SearchResult::NONE;

        if let Some(tokens) = self.map.get(&probe) {
            if !tokens.is_empty() {
                result |= SearchResult::OK;
                collect_ranges(tokens, ranges);
            }
        }
        let mut after = self
            .map
            .range::<Vec<u8>, _>((Bound::Excluded(&probe), Bound::Unbounded));
        if let Some((key, _)) = after.next() {
            if key.starts_with(&probe) {
                result |= SearchResult::CONTINUED;
            }
        }

        if let (Some(map), Some(payloads)) = (&self.fst_map, &self.payloads) {
            if let Some(offset) = map.get(&probe) {
                if let Some(tokens) = payloads.get(offset as usize) {
                    if !tokens.is_empty() {
                        result |= SearchResult::OK;
                        collect_ranges(tokens, ranges);
                    }
                }
            }
            let mut stream = map.range().gt(probe.as_slice()).into_stream();
            if let Some((key, _)) = stream.next() {
                if key.starts_with(&probe) {
                    result |= SearchResult::CONTINUED;
                }
            }
        }

        result
    }

    /// Write the in-memory entries as the two on-disk artifacts.
    pub fn save<P: AsRef<Path>>(&self, fst_path: P, payload_path: P) -> anyhow::Result<()> {
        let mut builder = MapBuilder::new(Vec::new())?;
        let mut payloads: Vec<&Vec<Token>> = Vec::with_capacity(self.map.len());

        // BTreeMap iteration order is the byte order fst requires
        for (key, tokens) in &self.map {
            builder.insert(key, payloads.len() as u64)?;
            payloads.push(tokens);
        }

        let fst_bytes = builder.into_inner()?;
        write_atomically(fst_path.as_ref(), &fst_bytes)?;

        let payload_bytes = bincode::serialize(&payloads)?;
        write_atomically(payload_path.as_ref(), &payload_bytes)?;

        Ok(())
    }

    /// Load the two on-disk artifacts.
    pub fn load<P: AsRef<Path>>(fst_path: P, payload_path: P) -> anyhow::Result<Self> {
        let mut buf = Vec::new();
        File::open(fst_path.as_ref())
            .with_context(|| format!("open fst {}", fst_path.as_ref().display()))?
            .read_to_end(&mut buf)?;
        let map = Map::new(buf).context("fst map")?;

        let mut buf = Vec::new();
        File::open(payload_path.as_ref())
            .with_context(|| format!("open payloads {}", payload_path.as_ref().display()))?
            .read_to_end(&mut buf)?;
        let payloads: Vec<Vec<Token>> = bincode::deserialize(&buf).context("payloads")?;

        Ok(PhoneticIndex {
            map: BTreeMap::new(),
            fst_map: Some(map),
            payloads: Some(payloads),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase::make_token;
    use crate::syllable::{Final, Initial, Middle};

    fn ni() -> SyllableKey {
        SyllableKey::toneless(Initial::N, Middle::I, Final::Zero)
    }

    fn hao() -> SyllableKey {
        SyllableKey::toneless(Initial::H, Middle::Zero, Final::Ao)
    }

    #[test]
    fn exact_match_reports_ok() {
        let mut index = PhoneticIndex::new();
        index.insert(&[ni()], make_token(1, 10));

        let mut ranges = empty_ranges();
        let result = index.search(&[ni()], &mut ranges);

        assert!(result.contains(SearchResult::OK));
        assert!(!result.contains(SearchResult::CONTINUED));
        assert_eq!(ranges[1].len(), 1);
        assert_eq!(ranges[1][0].begin, make_token(1, 10));
        assert_eq!(ranges[1][0].end, make_token(1, 11));
    }

    #[test]
    fn longer_key_reports_continued() {
        let mut index = PhoneticIndex::new();
        index.insert(&[ni(), hao()], make_token(1, 20));

        let mut ranges = empty_ranges();
        let result = index.search(&[ni()], &mut ranges);

        assert!(!result.contains(SearchResult::OK));
        assert!(result.contains(SearchResult::CONTINUED));
        assert!(ranges.iter().all(|r| r.is_empty()));

        // the full key matches, nothing extends it
        let mut ranges = empty_ranges();
        let result = index.search(&[ni(), hao()], &mut ranges);
        assert!(result.contains(SearchResult::OK));
        assert!(!result.contains(SearchResult::CONTINUED));
    }

    #[test]
    fn consecutive_tokens_merge_into_one_range() {
        let mut index = PhoneticIndex::new();
        index.insert(&[ni()], make_token(1, 10));
        index.insert(&[ni()], make_token(1, 11));
        index.insert(&[ni()], make_token(1, 13));
        index.insert(&[ni()], make_token(2, 5));

        let mut ranges = empty_ranges();
        index.search(&[ni()], &mut ranges);

        assert_eq!(ranges[1].len(), 2);
        assert_eq!(
            (ranges[1][0].begin, ranges[1][0].end),
            (make_token(1, 10), make_token(1, 12))
        );
        assert_eq!(
            (ranges[1][1].begin, ranges[1][1].end),
            (make_token(1, 13), make_token(1, 14))
        );
        assert_eq!(ranges[2].len(), 1);
    }

    #[test]
    fn disk_roundtrip_preserves_search() {
        let mut index = PhoneticIndex::new();
        index.insert(&[ni()], make_token(1, 10));
        index.insert(&[ni(), hao()], make_token(1, 20));

        let stamp = std::process::id();
        let fst_path = std::env::temp_dir().join(format!("libphonetic_index_{stamp}.fst"));
        let payload_path = std::env::temp_dir().join(format!("libphonetic_index_{stamp}.bin"));

        index.save(&fst_path, &payload_path).expect("save");
        let loaded = PhoneticIndex::load(&fst_path, &payload_path).expect("load");
        let _ = std::fs::remove_file(&fst_path);
        let _ = std::fs::remove_file(&payload_path);

        let mut ranges = empty_ranges();
        let result = loaded.search(&[ni()], &mut ranges);
        assert!(result.contains(SearchResult::OK));
        assert!(result.contains(SearchResult::CONTINUED));
        assert_eq!(ranges[1].len(), 1);

        let mut ranges = empty_ranges();
        let result = loaded.search(&[hao()], &mut ranges);
        assert_eq!(result, SearchResult::NONE);
    }
}
