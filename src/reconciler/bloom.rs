//! Bloom filter over rebuilt artifact coordinates
//!
//! The bit layout is shared with consumers that test membership on their own,
//! so the hash is kept exactly as published: ten rounds where round `r` folds
//! the coordinate's characters with multiplier `7 * r` in wrapping 32-bit
//! arithmetic, reduced modulo the filter's bit count.

/// Hash rounds per coordinate
pub const HASH_ROUNDS: i32 = 10;

/// Per-round multiplier step
pub const HASH_MULTIPLIER: i32 = 7;

pub const MIN_FILTER_BYTES: usize = 100;

/// Upper bound keeping the blob small enough for a config-map style record
pub const MAX_FILTER_BYTES: usize = 1024 * 1000;

/// Key of the filter bytes inside the blob
pub const FILTER_KEY: &str = "filter";

/// Filter size in bytes for `count` items: two bytes (16 bits) per item, clamped
pub fn filter_size(count: usize) -> usize {
    count
        .saturating_mul(2)
        .clamp(MIN_FILTER_BYTES, MAX_FILTER_BYTES)
}

/// Hash of `gav` for the given round (1-based)
pub fn do_hash(round: i32, gav: &str) -> i32 {
    let multiplier = round.wrapping_mul(HASH_MULTIPLIER);
    gav.chars().fold(0i32, |hash, c| {
        multiplier.wrapping_mul(hash).wrapping_add(c as i32)
    })
}

fn bit_index(hash: i32, total_bits: i32) -> usize {
    let reduced = hash % total_bits;
    reduced.unsigned_abs() as usize
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Empty filter sized for `count` items
    pub fn with_capacity(count: usize) -> Self {
        Self {
            bits: vec![0; filter_size(count)],
        }
    }

    /// Filter containing every coordinate in `gavs`
    pub fn build<'a>(gavs: impl IntoIterator<Item = &'a str>) -> Self {
        let gavs: Vec<&str> = gavs.into_iter().collect();
        let mut filter = Self::with_capacity(gavs.len());
        for gav in gavs {
            filter.insert(gav);
        }
        filter
    }

    /// Wrap bytes read back from a persisted blob
    pub fn from_bytes(bits: Vec<u8>) -> Self {
        Self { bits }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bits
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    fn total_bits(&self) -> Option<i32> {
        i32::try_from(self.bits.len() * 8).ok().filter(|b| *b > 0)
    }

    pub fn insert(&mut self, gav: &str) {
        let Some(total_bits) = self.total_bits() else {
            return;
        };
        for round in 1..=HASH_ROUNDS {
            let index = bit_index(do_hash(round, gav), total_bits);
            self.bits[index / 8] |= 1 << (index % 8);
        }
    }

    /// Consumer-side membership test: false means definitely not present
    pub fn contains(&self, gav: &str) -> bool {
        let Some(total_bits) = self.total_bits() else {
            return false;
        };
        (1..=HASH_ROUNDS).all(|round| {
            let index = bit_index(do_hash(round, gav), total_bits);
            self.bits[index / 8] & (1 << (index % 8)) != 0
        })
    }
}
