//! Property-based test generators using proptest.
//!
//! Strategies produce sorted, duplicate-free entry sequences - the
//! precondition every segment build expects - with tombstones and
//! occasional overflow-sized payloads mixed in.

use proptest::prelude::*;
use strata_core::Entry;

/// Strategy for arbitrary keys, empty key included.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
}

/// Strategy for payloads: mostly small values, occasionally large enough
/// to spill into overflow chains, with tombstones (`None`) mixed in.
pub fn payload_strategy() -> impl Strategy<Value = Option<Vec<u8>>> {
    prop_oneof![
        1 => Just(None),
        6 => prop::collection::vec(any::<u8>(), 0..48).prop_map(Some),
        1 => prop::collection::vec(any::<u8>(), 1024..2048).prop_map(Some),
    ]
}

/// Strategy for a sorted, duplicate-free entry sequence.
///
/// Generating through a `BTreeMap` guarantees the build precondition by
/// construction.
pub fn sorted_entries_strategy(max_entries: usize) -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::btree_map(key_strategy(), payload_strategy(), 0..max_entries).prop_map(
        |map| {
            map.into_iter()
                .map(|(k, v)| Entry {
                    key: k.into(),
                    value: v.map(Into::into),
                })
                .collect()
        },
    )
}

/// Strategy for short probe keys used in seek-consistency tests.
pub fn probe_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..8)
}
