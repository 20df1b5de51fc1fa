// core/src/search.rs
//
// Span search over the key matrix: enumerate every syllable path between
// two columns, probe the phonetic index with each, and fold the outcomes.
// The same recursion shape computes and reinforces per-phrase
// pronunciation probabilities.

use crate::matrix::PhoneticKeyMatrix;
use crate::phonetic_index::{PhoneticIndex, PhraseIndexRanges, SearchResult};
use crate::phrase::{PhraseItem, MAX_PHRASE_LENGTH};
use crate::syllable::SyllableKey;

/// Probe every syllable path of the span `[start, end)`.
///
/// Ranges accumulate across paths. The result carries `CONTINUED` when the
/// index can still match a wider span: either the index said so for some
/// path, or a key in the span reaches past `end`, or `end` lands on an
/// empty (mid-syllable) column.
pub fn search_matrix(
    index: &PhoneticIndex,
    matrix: &PhoneticKeyMatrix,
    start: usize,
    end: usize,
    ranges: &mut PhraseIndexRanges,
) -> SearchResult {
    assert!(end < matrix.size());

    if matrix.column_size(start) == 0 {
        return SearchResult::NONE;
    }
    if matrix.column_size(end) == 0 {
        return SearchResult::CONTINUED;
    }

    let mut cached_keys = Vec::new();
    let mut longest = 0usize;
    let mut result = search_matrix_recur(
        &mut cached_keys,
        index,
        matrix,
        start,
        end,
        ranges,
        &mut longest,
    );

    if longest > end {
        result |= SearchResult::CONTINUED;
    }
    result
}

fn search_matrix_recur(
    cached_keys: &mut Vec<SyllableKey>,
    index: &PhoneticIndex,
    matrix: &PhoneticKeyMatrix,
    start: usize,
    end: usize,
    ranges: &mut PhraseIndexRanges,
    longest: &mut usize,
) -> SearchResult {
    if start > end {
        return SearchResult::NONE;
    }

    if start == end {
        if cached_keys.len() > MAX_PHRASE_LENGTH {
            return SearchResult::NONE;
        }
        // a pure separator path
        if cached_keys.is_empty() {
            return SearchResult::CONTINUED;
        }
        return index.search(cached_keys, ranges);
    }

    let size = matrix.column_size(start);
    let mut result = SearchResult::NONE;

    for nth in 0..size {
        let (key, key_rest) = matrix.get(start, nth);
        let newstart = key_rest.raw_end as usize;

        if key.is_zero() {
            // separators and the terminal slot are always alone in a column
            debug_assert_eq!(size, 1);
            return search_matrix_recur(cached_keys, index, matrix, newstart, end, ranges, longest);
        }

        cached_keys.push(key);
        *longest = (*longest).max(newstart);

        result = result
            | search_matrix_recur(cached_keys, index, matrix, newstart, end, ranges, longest);

        cached_keys.pop();
    }

    result
}

/// P(span pronounced as `item`): sum of the item's pronunciation
/// probabilities over every syllable path of `[start, end)` whose length
/// matches the item's phrase length.
pub fn compute_pronunciation_possibility(
    matrix: &PhoneticKeyMatrix,
    start: usize,
    end: usize,
    item: &PhraseItem,
) -> f32 {
    debug_assert!(end < matrix.size());

    if matrix.column_size(start) == 0 || matrix.column_size(end) == 0 {
        return 0.0;
    }

    let mut cached_keys = Vec::new();
    compute_possibility_recur(matrix, start, end, &mut cached_keys, item)
}

fn compute_possibility_recur(
    matrix: &PhoneticKeyMatrix,
    start: usize,
    end: usize,
    cached_keys: &mut Vec<SyllableKey>,
    item: &PhraseItem,
) -> f32 {
    if start > end {
        return 0.0;
    }

    let phrase_length = item.phrase_length();
    if phrase_length < cached_keys.len() {
        return 0.0;
    }

    if start == end {
        if phrase_length != cached_keys.len() {
            return 0.0;
        }
        return item.get_pronunciation_possibility(cached_keys);
    }

    let size = matrix.column_size(start);
    if size == 0 {
        return 0.0;
    }

    let mut result = 0.0;
    for nth in 0..size {
        let (key, key_rest) = matrix.get(start, nth);
        let newstart = key_rest.raw_end as usize;

        if key.is_zero() {
            debug_assert_eq!(size, 1);
            return compute_possibility_recur(matrix, newstart, end, cached_keys, item);
        }

        cached_keys.push(key);
        result += compute_possibility_recur(matrix, newstart, end, cached_keys, item);
        cached_keys.pop();
    }

    result
}

/// Reinforce the item's pronunciation by `delta` along every matching
/// syllable path of `[start, end)`. Returns whether anything was updated.
pub fn increase_pronunciation_possibility(
    matrix: &PhoneticKeyMatrix,
    start: usize,
    end: usize,
    item: &mut PhraseItem,
    delta: u32,
) -> bool {
    debug_assert!(end < matrix.size());

    if matrix.column_size(start) == 0 || matrix.column_size(end) == 0 {
        return false;
    }

    let mut cached_keys = Vec::new();
    increase_possibility_recur(matrix, start, end, &mut cached_keys, item, delta)
}

fn increase_possibility_recur(
    matrix: &PhoneticKeyMatrix,
    start: usize,
    end: usize,
    cached_keys: &mut Vec<SyllableKey>,
    item: &mut PhraseItem,
    delta: u32,
) -> bool {
    if start > end {
        return false;
    }

    let phrase_length = item.phrase_length();
    if phrase_length < cached_keys.len() {
        return false;
    }

    if start == end {
        if phrase_length != cached_keys.len() {
            return false;
        }
        item.increase_pronunciation_possibility(cached_keys, delta);
        return true;
    }

    let size = matrix.column_size(start);
    if size == 0 {
        return false;
    }

    let mut result = false;
    for nth in 0..size {
        let (key, key_rest) = matrix.get(start, nth);
        let newstart = key_rest.raw_end as usize;

        if key.is_zero() {
            debug_assert_eq!(size, 1);
            return increase_possibility_recur(matrix, newstart, end, cached_keys, item, delta);
        }

        cached_keys.push(key);
        result = increase_possibility_recur(matrix, newstart, end, cached_keys, item, delta)
            || result;
        cached_keys.pop();
    }

    result
}
