//! Sets of admissible values for a variable of width w.
//!
//! A [`ViableSet`] represents a subset of `[0, 2^w)`. Narrow variables
//! use an exact bit-set, so predicate refinement can enumerate the
//! surviving members. Wide variables start as the complement of a finite
//! removed-set; predicate refinement is then skipped (the set stays an
//! over-approximation of the admissible values, which is all the search
//! needs), while singleton removal and intersection with a computed
//! value remain exact.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// A subset of `[0, 2^w)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViableSet {
    /// Exact bit-set: bit `k` is set iff `k` is in the set.
    Bits {
        /// Bit-width of the domain.
        width: u32,
        /// `2^width` bits in 64-bit blocks; bits past the domain are zero.
        blocks: SmallVec<[u64; 4]>,
    },
    /// The full domain minus a finite set of removed values.
    Except {
        /// Bit-width of the domain.
        width: u32,
        /// Values excluded from the domain.
        removed: BTreeSet<BigUint>,
    },
    /// An explicit finite set of values.
    Values {
        /// Bit-width of the domain.
        width: u32,
        /// The members of the set.
        values: BTreeSet<BigUint>,
    },
}

impl ViableSet {
    /// The full domain `[0, 2^width)`.
    ///
    /// Widths up to `dense_limit` get the exact bit-set representation.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero.
    #[must_use]
    pub fn full(width: u32, dense_limit: u32) -> Self {
        assert!(width >= 1, "domain width must be at least 1");
        if width <= dense_limit.min(24) {
            let bits = 1usize << width;
            let nblocks = bits.div_ceil(64);
            let mut blocks: SmallVec<[u64; 4]> = SmallVec::with_capacity(nblocks);
            if bits < 64 {
                blocks.push((1u64 << bits) - 1);
            } else {
                for _ in 0..nblocks {
                    blocks.push(u64::MAX);
                }
            }
            ViableSet::Bits { width, blocks }
        } else {
            ViableSet::Except {
                width,
                removed: BTreeSet::new(),
            }
        }
    }

    /// Bit-width of the domain.
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            ViableSet::Bits { width, .. }
            | ViableSet::Except { width, .. }
            | ViableSet::Values { width, .. } => *width,
        }
    }

    fn in_domain(&self, value: &BigUint) -> bool {
        value.bits() <= u64::from(self.width())
    }

    /// Whether `value` is in the set.
    #[must_use]
    pub fn contains(&self, value: &BigUint) -> bool {
        if !self.in_domain(value) {
            return false;
        }
        match self {
            ViableSet::Bits { blocks, .. } => {
                let v = value.to_u64().expect("dense domain value fits in u64") as usize;
                blocks[v / 64] & (1u64 << (v % 64)) != 0
            }
            ViableSet::Except { removed, .. } => !removed.contains(value),
            ViableSet::Values { values, .. } => values.contains(value),
        }
    }

    /// Remove a single value. Returns whether the set changed.
    pub fn remove(&mut self, value: &BigUint) -> bool {
        if !self.contains(value) {
            return false;
        }
        match self {
            ViableSet::Bits { blocks, .. } => {
                let v = value.to_u64().expect("dense domain value fits in u64") as usize;
                blocks[v / 64] &= !(1u64 << (v % 64));
            }
            ViableSet::Except { removed, .. } => {
                removed.insert(value.clone());
            }
            ViableSet::Values { values, .. } => {
                values.remove(value);
            }
        }
        true
    }

    /// Whether the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            ViableSet::Bits { blocks, .. } => blocks.iter().all(|&b| b == 0),
            ViableSet::Except { width, removed } => {
                BigUint::from(removed.len()) == (BigUint::one() << (*width as usize))
            }
            ViableSet::Values { values, .. } => values.is_empty(),
        }
    }

    /// The sole member, when the set has exactly one.
    #[must_use]
    pub fn is_singleton(&self) -> Option<BigUint> {
        match self {
            ViableSet::Bits { blocks, .. } => {
                let mut found: Option<u64> = None;
                for (i, &b) in blocks.iter().enumerate() {
                    if b == 0 {
                        continue;
                    }
                    if found.is_some() || b.count_ones() != 1 {
                        return None;
                    }
                    found = Some(64 * i as u64 + u64::from(b.trailing_zeros()));
                }
                found.map(BigUint::from)
            }
            ViableSet::Except { width, removed } => {
                let size = BigUint::one() << (*width as usize);
                if BigUint::from(removed.len()) + BigUint::one() != size {
                    return None;
                }
                self.pick()
            }
            ViableSet::Values { values, .. } => {
                if values.len() == 1 {
                    values.first().cloned()
                } else {
                    None
                }
            }
        }
    }

    /// The minimum member, or `None` when the set is empty.
    #[must_use]
    pub fn pick(&self) -> Option<BigUint> {
        match self {
            ViableSet::Bits { blocks, .. } => {
                for (i, &b) in blocks.iter().enumerate() {
                    if b != 0 {
                        return Some(BigUint::from(
                            64 * i as u64 + u64::from(b.trailing_zeros()),
                        ));
                    }
                }
                None
            }
            ViableSet::Except { removed, .. } => {
                let mut candidate = BigUint::zero();
                let limit = BigUint::one() << (self.width() as usize);
                while candidate < limit {
                    if !removed.contains(&candidate) {
                        return Some(candidate);
                    }
                    candidate += BigUint::one();
                }
                None
            }
            ViableSet::Values { values, .. } => values.first().cloned(),
        }
    }

    /// Keep only members satisfying `predicate`.
    ///
    /// Returns whether the refinement was applied exactly. The
    /// non-enumerable [`ViableSet::Except`] representation reports
    /// `false` and leaves the set unchanged, keeping it a sound
    /// over-approximation.
    pub fn retain<F>(&mut self, mut predicate: F) -> bool
    where
        F: FnMut(&BigUint) -> bool,
    {
        match self {
            ViableSet::Bits { blocks, .. } => {
                for (i, block) in blocks.iter_mut().enumerate() {
                    let mut b = *block;
                    while b != 0 {
                        let bit = b.trailing_zeros();
                        let value = BigUint::from(64 * i as u64 + u64::from(bit));
                        if !predicate(&value) {
                            *block &= !(1u64 << bit);
                        }
                        b &= b - 1;
                    }
                }
                true
            }
            ViableSet::Except { .. } => false,
            ViableSet::Values { values, .. } => {
                values.retain(|v| predicate(v));
                true
            }
        }
    }

    /// Intersect with the singleton `{value}`.
    pub fn intersect_value(&mut self, value: &BigUint) {
        let width = self.width();
        let mut values = BTreeSet::new();
        if self.contains(value) {
            values.insert(value.clone());
        }
        match self {
            ViableSet::Bits { blocks, .. } => {
                for block in blocks.iter_mut() {
                    *block = 0;
                }
                if let Some(v) = values.first() {
                    let v = v.to_u64().expect("dense domain value fits in u64") as usize;
                    blocks[v / 64] |= 1u64 << (v % 64);
                }
            }
            _ => *self = ViableSet::Values { width, values },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn test_full_dense() {
        let set = ViableSet::full(3, 16);
        for k in 0..8 {
            assert!(set.contains(&big(k)));
        }
        assert!(!set.contains(&big(8)));
        assert!(!set.is_empty());
        assert!(set.is_singleton().is_none());
    }

    #[test]
    fn test_remove_and_pick() {
        let mut set = ViableSet::full(3, 16);
        assert!(set.remove(&big(0)));
        assert!(!set.remove(&big(0)));
        assert_eq!(set.pick(), Some(big(1)));
    }

    #[test]
    fn test_retain_to_singleton() {
        let mut set = ViableSet::full(4, 16);
        assert!(set.retain(|v| *v == big(5)));
        assert_eq!(set.is_singleton(), Some(big(5)));
        assert!(set.remove(&big(5)));
        assert!(set.is_empty());
        assert_eq!(set.pick(), None);
    }

    #[test]
    fn test_wide_domain() {
        let mut set = ViableSet::full(64, 16);
        assert!(matches!(set, ViableSet::Except { .. }));
        assert!(set.contains(&big(u64::MAX)));
        // predicate refinement is not applied on the wide representation
        assert!(!set.retain(|_| false));
        assert!(!set.is_empty());
        set.remove(&big(0));
        set.remove(&big(1));
        assert_eq!(set.pick(), Some(big(2)));
    }

    #[test]
    fn test_intersect_value() {
        let mut wide = ViableSet::full(64, 16);
        wide.remove(&big(7));
        wide.intersect_value(&big(9));
        assert_eq!(wide.is_singleton(), Some(big(9)));
        wide.intersect_value(&big(7));
        assert!(wide.is_empty());

        let mut dense = ViableSet::full(4, 16);
        dense.intersect_value(&big(3));
        assert_eq!(dense.is_singleton(), Some(big(3)));
    }

    #[test]
    fn test_dense_multi_block() {
        let mut set = ViableSet::full(8, 16);
        assert!(set.retain(|v| v.to_u64().unwrap() % 2 == 0));
        assert!(set.contains(&big(128)));
        assert!(!set.contains(&big(129)));
        assert_eq!(set.pick(), Some(big(0)));
    }
}
