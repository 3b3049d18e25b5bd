//! Fixed-width bitsets over label nodes.
//!
//! [`LabelState`] is the binary assignment used everywhere in the engine:
//! consistent states, ancestor and exclusion masks, and clique-local states
//! all share it. Up to 128 labels are stored inline without allocation.

use std::fmt;

use smallvec::{smallvec, SmallVec};

const WORD_BITS: usize = 64;

/// Words kept inline before spilling to the heap.
const INLINE_WORDS: usize = 2;

/// A binary assignment over `len` labels; bit `i` set means label `i` is true.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelState {
    len: usize,
    words: SmallVec<[u64; INLINE_WORDS]>,
}

#[inline]
fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_BITS)
}

impl LabelState {
    /// The all-false assignment over `len` labels.
    pub fn all_false(len: usize) -> Self {
        Self {
            len,
            words: smallvec![0; words_for(len)],
        }
    }

    /// Builds a state with the given labels set. Returns `None` if any index
    /// is out of range.
    pub fn from_true_labels(len: usize, labels: impl IntoIterator<Item = usize>) -> Option<Self> {
        let mut state = Self::all_false(len);
        for label in labels {
            if label >= len {
                return None;
            }
            state.insert(label);
        }
        Some(state)
    }

    /// Parses a string such as `"110"`, where character `i` is label `i`.
    pub fn from_bit_str(bits: &str) -> Option<Self> {
        let chars: Vec<char> = bits.chars().filter(|c| !c.is_whitespace()).collect();
        let mut state = Self::all_false(chars.len());
        for (i, c) in chars.into_iter().enumerate() {
            match c {
                '1' => state.insert(i),
                '0' => {}
                _ => return None,
            }
        }
        Some(state)
    }

    /// Number of labels this state covers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether label `i` is true. Out-of-range indices read as false.
    #[inline]
    pub fn contains(&self, i: usize) -> bool {
        i < self.len && (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    #[inline]
    pub fn insert(&mut self, i: usize) {
        debug_assert!(i < self.len, "label {} out of range {}", i, self.len);
        self.words[i / WORD_BITS] |= 1_u64 << (i % WORD_BITS);
    }

    #[inline]
    pub fn remove(&mut self, i: usize) {
        debug_assert!(i < self.len, "label {} out of range {}", i, self.len);
        self.words[i / WORD_BITS] &= !(1_u64 << (i % WORD_BITS));
    }

    pub fn count_true(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_all_false(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Indices of true labels in ascending order.
    pub fn iter_true(&self) -> TrueLabels<'_> {
        TrueLabels {
            words: &self.words,
            word_index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    /// In-place union. Both states must cover the same labels.
    pub fn union_with(&mut self, other: &LabelState) {
        debug_assert_eq!(self.len, other.len);
        for (lhs, rhs) in self.words.iter_mut().zip(other.words.iter()) {
            *lhs |= rhs;
        }
    }

    /// Whether any label is true in both states.
    #[inline]
    pub fn intersects(&self, other: &LabelState) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(lhs, rhs)| lhs & rhs != 0)
    }

    /// Whether every true label of `self` is also true in `other`.
    pub fn is_subset(&self, other: &LabelState) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(lhs, rhs)| lhs & !rhs == 0)
    }

    /// Labels true in `self` but not in `other`.
    pub fn difference(&self, other: &LabelState) -> LabelState {
        let mut out = self.clone();
        for (lhs, rhs) in out.words.iter_mut().zip(other.words.iter()) {
            *lhs &= !rhs;
        }
        out
    }

    /// Restricts this state to `positions`: bit `k` of the result is bit
    /// `positions[k]` of `self`.
    pub fn project(&self, positions: &[usize]) -> LabelState {
        let mut out = LabelState::all_false(positions.len());
        for (k, &pos) in positions.iter().enumerate() {
            if self.contains(pos) {
                out.insert(k);
            }
        }
        out
    }
}

impl fmt::Display for LabelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            f.write_str(if self.contains(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for LabelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabelState({})", self)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for LabelState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter_true())
    }
}

/// Iterator over the true labels of a [`LabelState`].
pub struct TrueLabels<'a> {
    words: &'a [u64],
    word_index: usize,
    current: u64,
}

impl Iterator for TrueLabels<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_index * WORD_BITS + bit);
            }
            self.word_index += 1;
            if self.word_index >= self.words.len() {
                return None;
            }
            self.current = self.words[self.word_index];
        }
    }
}
