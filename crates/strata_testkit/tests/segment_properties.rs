//! Property tests: build-then-open round trips, seek consistency against
//! a linear-scan oracle, and merge invariants.

use proptest::prelude::*;
use strata_core::{Cursor, Entry, LivingCursor, MultiCursor, SeekOp};
use strata_testkit::prelude::*;

/// Linear-scan oracle for a single sorted entry sequence.
fn oracle_seek<'a>(entries: &'a [Entry], key: &[u8], op: SeekOp) -> Option<&'a Entry> {
    match op {
        SeekOp::Eq => entries.iter().find(|e| e.key.as_ref() == key),
        SeekOp::Le => entries.iter().rev().find(|e| e.key.as_ref() <= key),
        SeekOp::Ge => entries.iter().find(|e| e.key.as_ref() >= key),
    }
}

/// The merged view two prioritized entry lists should produce.
fn oracle_merge(high: &[Entry], low: &[Entry]) -> Vec<Entry> {
    let mut map = std::collections::BTreeMap::new();
    for e in low.iter().chain(high.iter()) {
        map.insert(e.key.clone(), e.value.clone());
    }
    map.into_iter()
        .map(|(key, value)| Entry { key, value })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_trip_preserves_entries(
        entries in sorted_entries_strategy(60),
        page_size in prop::sample::select(vec![128u32, 512, 4096]),
    ) {
        let source = memory_segment(&entries);
        let (store, len) = build_memory_store(&source, page_size);

        let mut csr = strata_core::open_segment_cursor(store, len).unwrap();
        let forward = entries_forward(&mut csr);
        prop_assert_eq!(&forward, &entries);

        let mut backward = entries_backward(&mut csr);
        backward.reverse();
        prop_assert_eq!(&backward, &entries);
    }

    #[test]
    fn seek_matches_linear_scan(
        entries in sorted_entries_strategy(40),
        probes in prop::collection::vec(probe_key_strategy(), 1..20),
    ) {
        let source = memory_segment(&entries);
        let (store, len) = build_memory_store(&source, 256);
        let mut csr = strata_core::open_segment_cursor(store, len).unwrap();

        for probe in &probes {
            for op in [SeekOp::Eq, SeekOp::Le, SeekOp::Ge] {
                csr.seek(probe, op).unwrap();
                match oracle_seek(&entries, probe, op) {
                    Some(expected) => {
                        prop_assert!(csr.is_valid());
                        prop_assert_eq!(csr.key().unwrap(), &expected.key);
                        prop_assert_eq!(csr.value().unwrap(), expected.value.clone());
                    }
                    None => prop_assert!(!csr.is_valid()),
                }
            }
        }
    }

    #[test]
    fn memory_cursor_seek_matches_linear_scan(
        entries in sorted_entries_strategy(40),
        probes in prop::collection::vec(probe_key_strategy(), 1..20),
    ) {
        let source = memory_segment(&entries);
        let mut csr = source.open_cursor();

        for probe in &probes {
            for op in [SeekOp::Eq, SeekOp::Le, SeekOp::Ge] {
                csr.seek(probe, op).unwrap();
                match oracle_seek(&entries, probe, op) {
                    Some(expected) => {
                        prop_assert!(csr.is_valid());
                        prop_assert_eq!(csr.key().unwrap(), &expected.key);
                    }
                    None => prop_assert!(!csr.is_valid()),
                }
            }
        }
    }

    #[test]
    fn merge_emits_each_key_once_with_precedence(
        high in sorted_entries_strategy(30),
        low in sorted_entries_strategy(30),
    ) {
        let expected = oracle_merge(&high, &low);

        let high_seg = memory_segment(&high);
        let (high_store, high_len) = build_memory_store(&high_seg, 256);
        let low_seg = memory_segment(&low);
        let (low_store, low_len) = build_memory_store(&low_seg, 512);

        let mut mc = MultiCursor::new(vec![
            Box::new(strata_core::open_segment_cursor(high_store, high_len).unwrap()),
            Box::new(strata_core::open_segment_cursor(low_store, low_len).unwrap()),
        ]);

        let forward = entries_forward(&mut mc);
        prop_assert_eq!(&forward, &expected);

        // Strictly monotonic, no key emitted twice
        for pair in forward.windows(2) {
            prop_assert!(pair[0].key < pair[1].key);
        }

        let mut backward = entries_backward(&mut mc);
        backward.reverse();
        prop_assert_eq!(&backward, &expected);
    }

    #[test]
    fn living_cursor_masks_tombstones(
        high in sorted_entries_strategy(30),
        low in sorted_entries_strategy(30),
    ) {
        let expected: Vec<Entry> = oracle_merge(&high, &low)
            .into_iter()
            .filter(|e| e.value.is_some())
            .collect();

        let high_seg = memory_segment(&high);
        let low_seg = memory_segment(&low);
        let (high_store, high_len) = build_memory_store(&high_seg, 256);
        let (low_store, low_len) = build_memory_store(&low_seg, 256);

        let mc = MultiCursor::new(vec![
            Box::new(strata_core::open_segment_cursor(high_store, high_len).unwrap()),
            Box::new(strata_core::open_segment_cursor(low_store, low_len).unwrap()),
        ]);
        let mut lc = LivingCursor::new(mc);

        let forward = entries_forward(&mut lc);
        prop_assert_eq!(&forward, &expected);
        for e in &forward {
            prop_assert!(e.value.is_some());
        }

        let mut backward = entries_backward(&mut lc);
        backward.reverse();
        prop_assert_eq!(&backward, &expected);
    }

    #[test]
    fn seek_then_step_matches_pure_traversal(
        high in sorted_entries_strategy(25),
        low in sorted_entries_strategy(25),
        probe in probe_key_strategy(),
    ) {
        let merged = oracle_merge(&high, &low);
        let keys: Vec<_> = merged.iter().map(|e| e.key.clone()).collect();

        let high_seg = memory_segment(&high);
        let low_seg = memory_segment(&low);

        let mut mc = MultiCursor::new(vec![
            Box::new(high_seg.open_cursor()),
            Box::new(low_seg.open_cursor()),
        ]);

        // Ge landing, then the successor must be the next merged key.
        mc.seek(&probe, SeekOp::Ge).unwrap();
        let landing = keys.iter().position(|k| k.as_ref() >= probe.as_slice());
        match landing {
            Some(i) => {
                prop_assert_eq!(mc.key().unwrap(), &keys[i]);
                mc.next().unwrap();
                if i + 1 < keys.len() {
                    prop_assert_eq!(mc.key().unwrap(), &keys[i + 1]);
                    mc.prev().unwrap();
                    prop_assert_eq!(mc.key().unwrap(), &keys[i]);
                } else {
                    prop_assert!(!mc.is_valid());
                }
            }
            None => prop_assert!(!mc.is_valid()),
        }

        // Le landing, then the predecessor must be the previous merged key.
        mc.seek(&probe, SeekOp::Le).unwrap();
        let landing = keys.iter().rposition(|k| k.as_ref() <= probe.as_slice());
        match landing {
            Some(i) => {
                prop_assert_eq!(mc.key().unwrap(), &keys[i]);
                mc.prev().unwrap();
                if i > 0 {
                    prop_assert_eq!(mc.key().unwrap(), &keys[i - 1]);
                    mc.next().unwrap();
                    prop_assert_eq!(mc.key().unwrap(), &keys[i]);
                } else {
                    prop_assert!(!mc.is_valid());
                }
            }
            None => prop_assert!(!mc.is_valid()),
        }
    }
}
