//! Set laws for the viable-set representations.

use num_bigint::BigUint;
use polyz_math::viable::ViableSet;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_remove_then_absent(w in 1u32..9, raw in 0u64..256) {
        let value = BigUint::from(raw % (1 << w));
        let mut set = ViableSet::full(w, 16);
        prop_assert!(set.contains(&value));
        prop_assert!(set.remove(&value));
        prop_assert!(!set.contains(&value));
        prop_assert!(!set.remove(&value));
    }

    #[test]
    fn prop_retain_is_monotone(w in 1u32..9, keep_odd in any::<bool>()) {
        let mut set = ViableSet::full(w, 16);
        let before: Vec<u64> = (0..(1u64 << w)).collect();
        prop_assert!(set.retain(|v| {
            let v = u64::try_from(v.clone()).unwrap();
            (v % 2 == 1) == keep_odd
        }));
        for v in before {
            let value = BigUint::from(v);
            let expected = (v % 2 == 1) == keep_odd;
            prop_assert_eq!(set.contains(&value), expected);
        }
    }

    #[test]
    fn prop_pick_is_member_and_minimal(w in 1u32..9, removals in prop::collection::vec(0u64..256, 0..8)) {
        let mut set = ViableSet::full(w, 16);
        for r in removals {
            set.remove(&BigUint::from(r % (1 << w)));
        }
        match set.pick() {
            Some(min) => {
                prop_assert!(set.contains(&min));
                let mut below = BigUint::from(0u32);
                while below < min {
                    prop_assert!(!set.contains(&below));
                    below += 1u32;
                }
            }
            None => prop_assert!(set.is_empty()),
        }
    }

    #[test]
    fn prop_singleton_detection(w in 1u32..6, keep in 0u64..32) {
        let keep = keep % (1 << w);
        let mut set = ViableSet::full(w, 16);
        set.retain(|v| *v == BigUint::from(keep));
        prop_assert_eq!(set.is_singleton(), Some(BigUint::from(keep)));
        set.remove(&BigUint::from(keep));
        prop_assert!(set.is_empty());
        prop_assert_eq!(set.is_singleton(), None);
    }

    #[test]
    fn prop_wide_removals_stay_exact(removals in prop::collection::vec(0u64..64, 0..12)) {
        let mut set = ViableSet::full(40, 16);
        let mut removed = std::collections::BTreeSet::new();
        for r in &removals {
            set.remove(&BigUint::from(*r));
            removed.insert(*r);
        }
        for v in 0..64u64 {
            prop_assert_eq!(set.contains(&BigUint::from(v)), !removed.contains(&v));
        }
        let expected_min = (0..).find(|v| !removed.contains(v)).unwrap();
        prop_assert_eq!(set.pick(), Some(BigUint::from(expected_min)));
    }
}
