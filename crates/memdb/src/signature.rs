//! Table signatures, one bit per property a table carries.
//!
//! Signatures identify table schemas and act as query masks. The bitset is
//! kept canonical (no trailing zero words), so equality is plain word-wise
//! comparison and two signatures built from the same property set compare
//! equal regardless of the order the ids were supplied in.

use memdb_property::PropertyId;

const WORD_BITS: u32 = 64;

/// Bitset over the property-id space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TableSignature {
    words: Vec<u64>,
}

impl TableSignature {
    /// Creates an empty signature.
    #[must_use]
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Builds a signature with one bit set per property id.
    #[must_use]
    pub fn from_properties(properties: &[PropertyId]) -> Self {
        let mut signature = Self::new();
        for &property in properties {
            signature.set(property);
        }
        signature
    }

    fn locate(property: PropertyId) -> (usize, u64) {
        assert!(property.is_valid(), "invalid property id in signature");
        let word = (property.0 / WORD_BITS) as usize;
        let mask = 1u64 << (property.0 % WORD_BITS);
        (word, mask)
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    /// Sets the bit for `property`.
    pub fn set(&mut self, property: PropertyId) {
        let (word, mask) = Self::locate(property);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= mask;
    }

    /// Toggles the bit for `property`.
    pub fn flip_bit(&mut self, property: PropertyId) {
        let (word, mask) = Self::locate(property);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] ^= mask;
        self.trim();
    }

    /// Returns `true` if the bit for `property` is set.
    #[must_use]
    pub fn is_set(&self, property: PropertyId) -> bool {
        if !property.is_valid() {
            return false;
        }
        let (word, mask) = Self::locate(property);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Returns `true` if at least one bit is set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.words.is_empty()
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns the set property ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| PropertyId(i as u32 * WORD_BITS + bit))
        })
    }

    /// `(candidate & required) == required`.
    ///
    /// An empty signature on either side never matches, so a query has to
    /// name at least one property.
    #[must_use]
    pub fn check_bits(candidate: &TableSignature, required: &TableSignature) -> bool {
        if !candidate.is_valid() || !required.is_valid() {
            return false;
        }
        if required.words.len() > candidate.words.len() {
            return false;
        }
        required
            .words
            .iter()
            .zip(&candidate.words)
            .all(|(&r, &c)| c & r == r)
    }

    /// `(candidate & mask) != 0`.
    #[must_use]
    pub fn has_any(candidate: &TableSignature, mask: &TableSignature) -> bool {
        candidate
            .words
            .iter()
            .zip(&mask.words)
            .any(|(&c, &m)| c & m != 0)
    }
}

impl FromIterator<PropertyId> for TableSignature {
    fn from_iter<I: IntoIterator<Item = PropertyId>>(iter: I) -> Self {
        let mut signature = Self::new();
        for property in iter {
            signature.set(property);
        }
        signature
    }
}
