#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::AppendChars;
use lineage_core::analysis::{EditKey, EditStats};
use lineage_core::diff::EditTag;
use lineage_core::{apply, RecordArena, WordTokenizer};

#[test]
fn test_edit_stats_count_edits_per_derived_record() {
    // GIVEN three records each extended by the same suffix
    let mut arena = RecordArena::new();
    let roots: Vec<_> = ["alpha", "beta", "gamma"]
        .iter()
        .map(|t| arena.insert_raw(*t, None, &WordTokenizer))
        .collect();
    let mut t = AppendChars::new("!");
    let derived = apply(&mut arena, &roots, &mut t, &AppendChars::call(1), &WordTokenizer, None).unwrap();

    // WHEN statistics are collected over raw and derived records
    let all: Vec<_> = roots.iter().chain(&derived).copied().collect();
    let stats = EditStats::from_records(&arena, &all).unwrap();

    // THEN only the derived records contribute
    assert_eq!(stats.op_count(EditTag::Insert), 3);
    assert_eq!(stats.op_count(EditTag::Delete), 0);
    let key = EditKey {
        tag: EditTag::Insert,
        from: String::new(),
        to: "!".to_string(),
    };
    assert_eq!(stats.edit_count(&key), 3);
    assert_eq!(stats.most_common(1), vec![(key, 3)]);
}
