//! Assertions on planner output.
//!
//! Each function panics with a descriptive message when the property does
//! not hold, so it can be used directly in `#[test]` functions.

use crate::fragment::{Fragment, SourceFile};
use crate::location::Location;
use crate::order::OrderSpec;
use crate::partition::{OutputGroup, OutputPartitioner};
use crate::record::Record;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Assert that `fragments` tile `[0, file.length)` in order, without gaps or
/// overlaps, and only cut at declared boundaries when the file has any.
///
/// # Panics
///
/// Panics if any of the above does not hold.
///
/// ```
/// use directio::fragment::{plan, SourceFile};
/// use directio::testing::assert_fragments_cover;
///
/// let file = SourceFile::new("a.csv", 250);
/// assert_fragments_cover(&file, &plan(&file, 100, 10).unwrap());
/// ```
pub fn assert_fragments_cover(file: &SourceFile, fragments: &[Fragment]) {
    assert!(
        !fragments.is_empty(),
        "No fragments for {} (length {})",
        file.path,
        file.length
    );
    let mut expected_start = 0;
    for (i, f) in fragments.iter().enumerate() {
        assert_eq!(f.path, file.path, "Fragment {i} belongs to another file: {f:?}");
        assert_eq!(
            f.start, expected_start,
            "Fragment {i} does not continue the previous one:\n  Fragments: {fragments:?}"
        );
        assert!(f.start <= f.end, "Fragment {i} is inverted: {f:?}");
        expected_start = f.end;
    }
    assert_eq!(
        expected_start, file.length,
        "Fragments of {} stop at {expected_start}, file length is {}",
        file.path, file.length
    );
    if !file.boundaries.is_empty() {
        for f in fragments {
            for cut in [f.start, f.end] {
                assert!(
                    cut == 0 || cut == file.length || file.boundaries.contains(&cut),
                    "Fragment {f:?} cuts at {cut}, which is not a declared boundary of {}",
                    file.path
                );
            }
        }
    }
}

/// Assert that `groups`, as routed by `partitioner`, are a partition of
/// `records` by placeholder values: every record sits in a group whose key
/// agrees with the record's own values, no two groups share a key, and the
/// groups together hold exactly `records`.
///
/// # Panics
///
/// Panics if a record is misplaced, duplicated or missing, or if two groups
/// carry the same key.
pub fn assert_grouping_partition(
    partitioner: &OutputPartitioner,
    records: &[Record],
    groups: &BTreeMap<Location, OutputGroup>,
) {
    let pattern = partitioner.pattern();
    let mut owners: BTreeMap<&BTreeMap<String, String>, &Location> = BTreeMap::new();
    let mut total = 0;
    for (location, group) in groups {
        assert_eq!(
            location, &group.location,
            "Group stored under {location} reports location {}",
            group.location
        );
        if let Some(other) = owners.insert(&group.key, location) {
            panic!("Groups {other} and {location} share the key {:?}", group.key);
        }
        let rendered = pattern
            .bind(&group.key)
            .map(|p| Location::from_pattern(&p))
            .unwrap_or_else(|e| panic!("Key {:?} of group {location} does not bind: {e}", group.key));
        assert_eq!(&rendered, location, "Key {:?} renders elsewhere", group.key);
        for record in &group.records {
            let values = partitioner
                .group_key_of(record)
                .unwrap_or_else(|e| panic!("Record {record:?} has no group key: {e}"));
            for (name, value) in &values {
                assert_eq!(
                    group.key.get(name),
                    Some(value),
                    "Record {record:?} of pattern \"{pattern}\" was routed to the wrong group"
                );
            }
            if !pattern.has_random_numbers() {
                assert_eq!(
                    partitioner.location_of(record).ok().as_ref(),
                    Some(location),
                    "Record {record:?} of pattern \"{pattern}\" renders to another location"
                );
            }
        }
        total += group.records.len();
    }
    assert_eq!(
        total,
        records.len(),
        "Groups hold {total} record(s), {} were routed",
        records.len()
    );
    for record in records {
        let expected = records.iter().filter(|r| *r == record).count();
        let found = groups
            .values()
            .flat_map(|g| &g.records)
            .filter(|r| *r == record)
            .count();
        assert_eq!(found, expected, "Record {record:?} was dropped or duplicated");
    }
}

/// Assert that `records` are ordered by `order`.
///
/// # Panics
///
/// Panics at the first adjacent pair that is out of order.
pub fn assert_sorted_by(records: &[Record], order: &OrderSpec) {
    for (i, pair) in records.windows(2).enumerate() {
        assert_ne!(
            order.compare(&pair[0], &pair[1]),
            Ordering::Greater,
            "Records {i} and {} are out of order for {order}:\n  {:?}\n  {:?}",
            i + 1,
            pair[0],
            pair[1]
        );
    }
}
