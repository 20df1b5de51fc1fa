//! Fuzzy (ambiguous) syllable expansion over the key matrix.
//!
//! Speakers of many Mandarin variants do not distinguish certain initial or
//! final pairs (z/zh, l/n, an/ang, ...). When a pair is enabled, every
//! matching key in the matrix gains a substituted twin over the same raw
//! span, so the span search sees both readings. The originally parsed key is
//! never removed.

use crate::matrix::PhoneticKeyMatrix;
use crate::syllable::{Final, Initial};
use serde::{Deserialize, Serialize};

/// Bit set of enabled ambiguous pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyOptions(pub u32);

impl FuzzyOptions {
    pub const NONE: FuzzyOptions = FuzzyOptions(0);
    pub const C_CH: FuzzyOptions = FuzzyOptions(1 << 0);
    pub const Z_ZH: FuzzyOptions = FuzzyOptions(1 << 1);
    pub const S_SH: FuzzyOptions = FuzzyOptions(1 << 2);
    pub const L_N: FuzzyOptions = FuzzyOptions(1 << 3);
    pub const L_R: FuzzyOptions = FuzzyOptions(1 << 4);
    pub const F_H: FuzzyOptions = FuzzyOptions(1 << 5);
    pub const G_K: FuzzyOptions = FuzzyOptions(1 << 6);
    pub const AN_ANG: FuzzyOptions = FuzzyOptions(1 << 7);
    pub const EN_ENG: FuzzyOptions = FuzzyOptions(1 << 8);
    pub const IN_ING: FuzzyOptions = FuzzyOptions(1 << 9);

    pub const ALL: FuzzyOptions = FuzzyOptions((1 << 10) - 1);

    pub fn contains(self, other: FuzzyOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for FuzzyOptions {
    type Output = FuzzyOptions;

    fn bitor(self, rhs: FuzzyOptions) -> FuzzyOptions {
        FuzzyOptions(self.0 | rhs.0)
    }
}

/// Each pair appears in both directions; the matching key's initial is
/// replaced and the result is kept only if it is a real syllable.
const INITIAL_AMBIGUITIES: &[(FuzzyOptions, Initial, Initial)] = &[
    (FuzzyOptions::C_CH, Initial::C, Initial::Ch),
    (FuzzyOptions::C_CH, Initial::Ch, Initial::C),
    (FuzzyOptions::Z_ZH, Initial::Z, Initial::Zh),
    (FuzzyOptions::Z_ZH, Initial::Zh, Initial::Z),
    (FuzzyOptions::S_SH, Initial::S, Initial::Sh),
    (FuzzyOptions::S_SH, Initial::Sh, Initial::S),
    (FuzzyOptions::L_N, Initial::L, Initial::N),
    (FuzzyOptions::L_N, Initial::N, Initial::L),
    (FuzzyOptions::L_R, Initial::L, Initial::R),
    (FuzzyOptions::L_R, Initial::R, Initial::L),
    (FuzzyOptions::F_H, Initial::F, Initial::H),
    (FuzzyOptions::F_H, Initial::H, Initial::F),
    (FuzzyOptions::G_K, Initial::G, Initial::K),
    (FuzzyOptions::G_K, Initial::K, Initial::G),
];

const FINAL_AMBIGUITIES: &[(FuzzyOptions, Final, Final)] = &[
    (FuzzyOptions::AN_ANG, Final::An, Final::Ang),
    (FuzzyOptions::AN_ANG, Final::Ang, Final::An),
    (FuzzyOptions::EN_ENG, Final::En, Final::Eng),
    (FuzzyOptions::EN_ENG, Final::Eng, Final::En),
    (FuzzyOptions::IN_ING, Final::In, Final::Ing),
    (FuzzyOptions::IN_ING, Final::Ing, Final::In),
];

/// Expand every column of the matrix with the enabled ambiguous pairs.
///
/// The finals pass runs over the refreshed columns, so an initial
/// substitution can combine with a final substitution (c+an yields ch+ang
/// when both pairs are on).
pub fn fuzzy_matrix_step(options: FuzzyOptions, matrix: &mut PhoneticKeyMatrix) {
    if options.is_empty() {
        return;
    }

    for index in 0..matrix.size() {
        let column: Vec<_> = matrix.get_column(index).to_vec();
        for (key, key_rest) in column {
            if key.is_zero() {
                continue;
            }
            for &(flag, from, to) in INITIAL_AMBIGUITIES {
                if options.contains(flag) && key.initial == from {
                    let mut newkey = key;
                    newkey.initial = to;
                    if newkey.is_valid() {
                        matrix.append(index, newkey, key_rest);
                    }
                }
            }
        }

        let column: Vec<_> = matrix.get_column(index).to_vec();
        for (key, key_rest) in column {
            if key.is_zero() {
                continue;
            }
            for &(flag, from, to) in FINAL_AMBIGUITIES {
                if options.contains(flag) && key.final_ == from {
                    let mut newkey = key;
                    newkey.final_ = to;
                    if newkey.is_valid() {
                        matrix.append(index, newkey, key_rest);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::fill_matrix;
    use crate::syllable::{KeyRest, Middle, SyllableKey};

    #[test]
    fn options_bit_set() {
        let opts = FuzzyOptions::C_CH | FuzzyOptions::AN_ANG;
        assert!(opts.contains(FuzzyOptions::C_CH));
        assert!(opts.contains(FuzzyOptions::AN_ANG));
        assert!(!opts.contains(FuzzyOptions::L_N));
        assert!(FuzzyOptions::ALL.contains(opts));
    }

    #[test]
    fn expands_initial_pair_both_directions() {
        // "zan"
        let zan = SyllableKey::toneless(Initial::Z, Middle::Zero, Final::An);
        let mut matrix = PhoneticKeyMatrix::new();
        fill_matrix(&mut matrix, &[zan], &[KeyRest::new(0, 3)]);

        fuzzy_matrix_step(FuzzyOptions::Z_ZH, &mut matrix);

        assert_eq!(matrix.column_size(0), 2);
        let (added, rest) = matrix.get(0, 1);
        assert_eq!(added.initial, Initial::Zh);
        assert_eq!(added.final_, Final::An);
        assert_eq!((rest.raw_begin, rest.raw_end), (0, 3));
    }

    #[test]
    fn initial_and_final_pairs_combine() {
        let zan = SyllableKey::toneless(Initial::Z, Middle::Zero, Final::An);
        let mut matrix = PhoneticKeyMatrix::new();
        fill_matrix(&mut matrix, &[zan], &[KeyRest::new(0, 3)]);

        fuzzy_matrix_step(FuzzyOptions::Z_ZH | FuzzyOptions::AN_ANG, &mut matrix);

        // zan, zhan, zang, zhang
        assert_eq!(matrix.column_size(0), 4);
        let keys: Vec<_> = matrix
            .get_column(0)
            .iter()
            .map(|(k, _)| (k.initial, k.final_))
            .collect();
        assert!(keys.contains(&(Initial::Zh, Final::Ang)));
    }

    #[test]
    fn invalid_substitution_is_skipped() {
        // li -> ri is not a syllable, so L_R adds nothing here
        let li = SyllableKey::toneless(Initial::L, Middle::I, Final::Zero);
        let mut matrix = PhoneticKeyMatrix::new();
        fill_matrix(&mut matrix, &[li], &[KeyRest::new(0, 2)]);

        fuzzy_matrix_step(FuzzyOptions::L_R, &mut matrix);
        assert_eq!(matrix.column_size(0), 1);

        // li -> ni is, so L_N adds one
        fuzzy_matrix_step(FuzzyOptions::L_N, &mut matrix);
        assert_eq!(matrix.column_size(0), 2);
        assert_eq!(matrix.get(0, 1).0.initial, Initial::N);
    }

    #[test]
    fn zero_keys_are_untouched() {
        let mut matrix = PhoneticKeyMatrix::new();
        fill_matrix(&mut matrix, &[], &[]);

        fuzzy_matrix_step(FuzzyOptions::ALL, &mut matrix);
        assert_eq!(matrix.column_size(0), 1);
    }
}
