//! Syllable keys and key-rests.
//!
//! A `SyllableKey` is the atomic phonetic unit produced by the pinyin/zhuyin
//! parsers and consumed by the phonetic index: a packed
//! (initial, middle, final, tone) tuple. A `KeyRest` remembers which span of
//! the raw keystroke buffer produced the key.

use serde::{Deserialize, Serialize};

/// Initial (consonant onset) codes of the chewing phonetic scheme.
///
/// `W` and `Y` only occur in pinyin spellings; they have no zhuyin symbol
/// but keep their own codes so pinyin parses stay distinguishable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u16)]
pub enum Initial {
    #[default]
    Zero = 0,
    B = 1,
    C = 2,
    Ch = 3,
    D = 4,
    F = 5,
    H = 6,
    G = 7,
    K = 8,
    J = 9,
    M = 10,
    N = 11,
    L = 12,
    R = 13,
    P = 14,
    Q = 15,
    S = 16,
    Sh = 17,
    T = 18,
    W = 19,
    X = 20,
    Y = 21,
    Z = 22,
    Zh = 23,
}

/// Middle (medial glide) codes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u16)]
pub enum Middle {
    #[default]
    Zero = 0,
    I = 1,
    U = 2,
    V = 3,
}

/// Final (rhyme) codes. `Ong`, `In` and `Ing` are pinyin-only contractions
/// of middle+final pairs (`ueng`, `ien`, `ieng`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u16)]
pub enum Final {
    #[default]
    Zero = 0,
    A = 1,
    Ai = 2,
    An = 3,
    Ang = 4,
    Ao = 5,
    E = 6,
    Ea = 7,
    Ei = 8,
    En = 9,
    Eng = 10,
    Er = 11,
    Ng = 12,
    O = 13,
    Ong = 14,
    Ou = 15,
    In = 16,
    Ing = 17,
}

/// Tone codes; `Zero` means the tone was not typed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u16)]
pub enum Tone {
    #[default]
    Zero = 0,
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
}

/// A packed phonetic syllable.
///
/// The all-zero value is the *zero key*: a separator (apostrophe) or the
/// terminal slot of a key matrix. It carries no phonetic content and never
/// reaches the phonetic index.
///
/// The derived `Ord` compares component-wise in declaration order, which is
/// the canonical index ordering; `pack()` produces a `u16` whose big-endian
/// bytes sort the same way.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SyllableKey {
    pub initial: Initial,
    pub middle: Middle,
    pub final_: Final,
    pub tone: Tone,
}

impl SyllableKey {
    /// The separator / terminal placeholder.
    pub const ZERO: SyllableKey = SyllableKey {
        initial: Initial::Zero,
        middle: Middle::Zero,
        final_: Final::Zero,
        tone: Tone::Zero,
    };

    pub fn new(initial: Initial, middle: Middle, final_: Final, tone: Tone) -> Self {
        SyllableKey {
            initial,
            middle,
            final_,
            tone,
        }
    }

    /// Toneless constructor, the common case for untoned pinyin input.
    pub fn toneless(initial: Initial, middle: Middle, final_: Final) -> Self {
        SyllableKey::new(initial, middle, final_, Tone::Zero)
    }

    pub fn is_zero(&self) -> bool {
        *self == SyllableKey::ZERO
    }

    /// Pack into 15 bits: `initial:5 | middle:2 | final:5 | tone:3` from the
    /// high bits down, so numeric (and big-endian byte) order equals
    /// component order.
    pub fn pack(&self) -> u16 {
        ((self.initial as u16) << 10)
            | ((self.middle as u16) << 8)
            | ((self.final_ as u16) << 3)
            | self.tone as u16
    }

    /// Whether this combination can occur in any real syllable.
    ///
    /// The parsers only ever emit real syllables; this gate exists for the
    /// fuzzy expansion pass, which blindly substitutes initials/finals and
    /// must drop results no syllable table contains. The rules cover every
    /// combination reachable by substitution:
    /// palatals (j/q/x) demand a front medial, the sibilant and retroflex
    /// rows plus the velars reject front medials, and f pairs with a
    /// restricted final set.
    pub fn is_valid(&self) -> bool {
        use Initial::*;

        if self.is_zero() {
            return false;
        }

        match self.initial {
            J | Q | X => matches!(self.middle, Middle::I | Middle::V),
            Zh | Ch | Sh | R | Z | C | S | G | K | H => {
                !matches!(self.middle, Middle::I | Middle::V)
            }
            F => match (self.middle, self.final_) {
                (Middle::U, Final::Zero) => true,
                (Middle::Zero, f) => matches!(
                    f,
                    Final::A
                        | Final::An
                        | Final::Ang
                        | Final::Ei
                        | Final::En
                        | Final::Eng
                        | Final::O
                        | Final::Ou
                ),
                _ => false,
            },
            _ => true,
        }
    }
}

/// Half-open span `[raw_begin, raw_end)` of the raw input characters a key
/// was parsed from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct KeyRest {
    pub raw_begin: u16,
    pub raw_end: u16,
}

impl KeyRest {
    pub fn new(raw_begin: u16, raw_end: u16) -> Self {
        KeyRest { raw_begin, raw_end }
    }

    pub fn length(&self) -> u16 {
        self.raw_end - self.raw_begin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_order_matches_component_order() {
        let a = SyllableKey::toneless(Initial::B, Middle::Zero, Final::A);
        let b = SyllableKey::toneless(Initial::B, Middle::Zero, Final::Ai);
        let c = SyllableKey::toneless(Initial::C, Middle::Zero, Final::A);

        assert!(a < b && b < c);
        assert!(a.pack() < b.pack() && b.pack() < c.pack());

        // big-endian bytes keep the ordering
        assert!(a.pack().to_be_bytes() < b.pack().to_be_bytes());
        assert!(b.pack().to_be_bytes() < c.pack().to_be_bytes());
    }

    #[test]
    fn zero_key_is_default_and_invalid() {
        assert_eq!(SyllableKey::default(), SyllableKey::ZERO);
        assert!(SyllableKey::ZERO.is_zero());
        assert!(!SyllableKey::ZERO.is_valid());
        assert_eq!(SyllableKey::ZERO.pack(), 0);
    }

    #[test]
    fn validity_rules() {
        // ni is fine, ri is not (retroflex row rejects the i medial)
        let ni = SyllableKey::toneless(Initial::N, Middle::I, Final::Zero);
        let ri = SyllableKey::toneless(Initial::R, Middle::I, Final::Zero);
        assert!(ni.is_valid());
        assert!(!ri.is_valid());

        // xi demands the medial, xa does not exist
        let xi = SyllableKey::toneless(Initial::X, Middle::I, Final::Zero);
        let xa = SyllableKey::toneless(Initial::X, Middle::Zero, Final::A);
        assert!(xi.is_valid());
        assert!(!xa.is_valid());

        // fu exists, fua does not
        let fu = SyllableKey::toneless(Initial::F, Middle::U, Final::Zero);
        let fua = SyllableKey::toneless(Initial::F, Middle::U, Final::A);
        assert!(fu.is_valid());
        assert!(!fua.is_valid());
    }
}
