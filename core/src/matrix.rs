// core/src/matrix.rs
//
// The phonetic key matrix: a column-major lattice of syllable candidates
// over the raw input. Column i holds every (key, key_rest) whose span
// starts at raw offset i.

use crate::syllable::{KeyRest, SyllableKey};

/// Column-major lattice of `(key, key_rest)` candidates.
///
/// Invariants maintained by `fill_matrix` (and expected by the span search):
/// - the matrix has one column per raw input offset plus one terminal slot;
/// - the terminal column holds exactly one zero key spanning `(N-1, N)`;
/// - gaps between parsed keys (separators) are bridged by one-column zero
///   keys, so every column on a reachable path is non-empty;
/// - appending never reorders a column; observation order is the downstream
///   tiebreak.
#[derive(Debug, Clone, Default)]
pub struct PhoneticKeyMatrix {
    columns: Vec<Vec<(SyllableKey, KeyRest)>>,
}

impl PhoneticKeyMatrix {
    pub fn new() -> Self {
        PhoneticKeyMatrix {
            columns: Vec::new(),
        }
    }

    /// Number of columns.
    pub fn size(&self) -> usize {
        self.columns.len()
    }

    /// Number of candidates in one column.
    pub fn column_size(&self, index: usize) -> usize {
        self.columns[index].len()
    }

    /// One candidate of one column.
    pub fn get(&self, index: usize, nth: usize) -> (SyllableKey, KeyRest) {
        self.columns[index][nth]
    }

    /// Borrow a whole column.
    pub fn get_column(&self, index: usize) -> &[(SyllableKey, KeyRest)] {
        &self.columns[index]
    }

    /// Append a candidate to a column. Existing entries keep their order.
    pub fn append(&mut self, index: usize, key: SyllableKey, key_rest: KeyRest) {
        debug_assert_eq!(key_rest.raw_begin as usize, index);
        self.columns[index].push((key, key_rest));
    }

    pub fn clear_all(&mut self) {
        self.columns.clear();
    }

    /// Resize to `size` empty columns, discarding previous content.
    pub fn set_size(&mut self, size: usize) {
        self.columns.clear();
        self.columns.resize(size, Vec::new());
    }
}

/// Build the matrix from a parsed key sequence.
///
/// The parsers hand over one key per recognized syllable together with its
/// raw span; separators ("'") appear as holes between consecutive spans.
/// Returns the matrix size `N`.
pub fn fill_matrix(
    matrix: &mut PhoneticKeyMatrix,
    keys: &[SyllableKey],
    key_rests: &[KeyRest],
) -> usize {
    assert_eq!(keys.len(), key_rests.len());

    if keys.is_empty() {
        matrix.set_size(1);
        matrix.append(0, SyllableKey::ZERO, KeyRest::new(0, 1));
        return 1;
    }

    // one extra slot past the last key
    let length = key_rests[key_rests.len() - 1].raw_end as usize + 1;
    matrix.set_size(length);

    for (key, key_rest) in keys.iter().zip(key_rests.iter()) {
        matrix.append(key_rest.raw_begin as usize, *key, *key_rest);
    }

    // bridge separator gaps with one-column zero keys
    for window in key_rests.windows(2) {
        let (cur, next) = (window[0], window[1]);
        for fill in cur.raw_end..next.raw_begin {
            matrix.append(
                fill as usize,
                SyllableKey::ZERO,
                KeyRest::new(fill, fill + 1),
            );
        }
    }

    // the terminal zero key
    matrix.append(
        length - 1,
        SyllableKey::ZERO,
        KeyRest::new(length as u16 - 1, length as u16),
    );

    length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syllable::{Final, Initial, Middle};

    fn ni() -> SyllableKey {
        SyllableKey::toneless(Initial::N, Middle::I, Final::Zero)
    }

    fn hao() -> SyllableKey {
        SyllableKey::toneless(Initial::H, Middle::Zero, Final::Ao)
    }

    #[test]
    fn fill_simple_two_syllables() {
        // "nihao": ni = [0,2), hao = [2,5)
        let mut matrix = PhoneticKeyMatrix::new();
        let n = fill_matrix(
            &mut matrix,
            &[ni(), hao()],
            &[KeyRest::new(0, 2), KeyRest::new(2, 5)],
        );

        assert_eq!(n, 6);
        assert_eq!(matrix.size(), 6);
        assert_eq!(matrix.column_size(0), 1);
        assert_eq!(matrix.column_size(2), 1);

        // the terminal column holds exactly the zero key
        assert_eq!(matrix.column_size(5), 1);
        let (key, rest) = matrix.get(5, 0);
        assert!(key.is_zero());
        assert_eq!((rest.raw_begin, rest.raw_end), (5, 6));

        // untouched columns inside spans stay empty
        assert_eq!(matrix.column_size(1), 0);
        assert_eq!(matrix.column_size(3), 0);
    }

    #[test]
    fn fill_bridges_separator_gap() {
        // "ni'hao": ni = [0,2), separator at 2, hao = [3,6)
        let mut matrix = PhoneticKeyMatrix::new();
        let n = fill_matrix(
            &mut matrix,
            &[ni(), hao()],
            &[KeyRest::new(0, 2), KeyRest::new(3, 6)],
        );

        assert_eq!(n, 7);
        assert_eq!(matrix.column_size(2), 1);
        let (key, rest) = matrix.get(2, 0);
        assert!(key.is_zero());
        assert_eq!((rest.raw_begin, rest.raw_end), (2, 3));
    }

    #[test]
    fn fill_empty_parse() {
        let mut matrix = PhoneticKeyMatrix::new();
        let n = fill_matrix(&mut matrix, &[], &[]);

        assert_eq!(n, 1);
        assert_eq!(matrix.column_size(0), 1);
        assert!(matrix.get(0, 0).0.is_zero());
    }

    #[test]
    fn append_keeps_order() {
        let mut matrix = PhoneticKeyMatrix::new();
        matrix.set_size(2);
        matrix.append(0, ni(), KeyRest::new(0, 1));
        matrix.append(0, hao(), KeyRest::new(0, 1));

        assert_eq!(matrix.get(0, 0).0, ni());
        assert_eq!(matrix.get(0, 1).0, hao());
    }
}
