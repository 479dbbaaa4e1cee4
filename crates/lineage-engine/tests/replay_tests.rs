//! Replay Engine Tests
//!
//! ## Scenarios Covered
//!
//! 1. Replay reproduces a four-step session exactly on both backends
//! 2. Stochastic steps replay from the recorded RNG state, not the factory seed
//! 3. Batches replay in batch id order, including a batch whose close failed
//!    and was retried
//! 4. Missing factories and broken logs fail with located errors
//! 5. `replay_into` rebuilds traceable lineage

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{inputs, registry, run_append_session, AppendChars, RandomDigit};
use lineage_core::errors::{LineageError, Result};
use lineage_core::{
    Batch, BatchSession, FnTransformation, Invocation, Label, ProvenanceSink, RecordArena,
    TransformIdentity, Transformation, WordTokenizer,
};
use lineage_core_types::{BatchId, TransformId};
use lineage_engine::{ReplayEngine, TransformRegistry};
use lineage_store::{open_store, FlatFileStore, ProvenanceStore, StoreConfig};
use std::fs;
use tempfile::TempDir;

fn expected_four_steps() -> Vec<(String, Option<Label>)> {
    vec![
        ("mytest1??????????".to_string(), Some(Label::Class(4))),
        ("mytest2??????????".to_string(), Some(Label::Class(5))),
    ]
}

fn flat_store(dir: &TempDir) -> Box<dyn ProvenanceStore> {
    open_store(&StoreConfig::flat_file(dir.path())).unwrap()
}

fn sqlite_store(dir: &TempDir) -> Box<dyn ProvenanceStore> {
    open_store(&StoreConfig::sqlite(dir.path().join("lineage.db"))).unwrap()
}

#[test]
fn test_flat_file_replay_matches_session_output() {
    // GIVEN a flat-file store holding one four-step session
    let dir = TempDir::new().unwrap();
    let mut store = flat_store(&dir);
    let produced = run_append_session(
        store.as_mut(),
        &[("mytest1", 0), ("mytest2", 1)],
        &[1, 2, 3, 4],
    );
    assert_eq!(produced, expected_four_steps());

    // WHEN replaying from a freshly opened store
    let reopened = flat_store(&dir);
    let registry = registry(0);
    let replayed = ReplayEngine::new(reopened.as_ref(), &registry)
        .replay_all()
        .unwrap();

    // THEN the outputs are identical
    assert_eq!(replayed, expected_four_steps());
}

#[test]
fn test_sqlite_replay_matches_session_output() {
    let dir = TempDir::new().unwrap();
    let mut store = sqlite_store(&dir);
    run_append_session(
        store.as_mut(),
        &[("mytest1", 0), ("mytest2", 1)],
        &[1, 2, 3, 4],
    );
    drop(store);

    let reopened = sqlite_store(&dir);
    let registry = registry(0);
    let replayed = ReplayEngine::new(reopened.as_ref(), &registry)
        .replay_all()
        .unwrap();

    assert_eq!(replayed, expected_four_steps());
}

#[test]
fn test_stochastic_steps_replay_from_recorded_state() {
    for sqlite in [false, true] {
        // GIVEN a session applying a seeded stochastic transformation twice
        let dir = TempDir::new().unwrap();
        let mut store = if sqlite {
            sqlite_store(&dir)
        } else {
            flat_store(&dir)
        };
        let mut random = RandomDigit::new(11);
        let mut append = AppendChars::new("!");
        let mut arena = RecordArena::new();
        let ids = {
            let mut session = BatchSession::open(
                &mut arena,
                store.as_sink(),
                &WordTokenizer,
                inputs(&[("a", 0), ("b", 1), ("c", 2)]),
            )
            .unwrap();
            session
                .apply(&mut random, &Invocation::new("transform"))
                .unwrap();
            session.apply(&mut append, &AppendChars::call(1)).unwrap();
            session
                .apply(&mut random, &Invocation::new("transform"))
                .unwrap();
            session.close().unwrap()
        };
        let produced: Vec<(String, Option<Label>)> = ids
            .iter()
            .map(|&id| {
                let r = arena.get(id).unwrap();
                (r.text().text().to_string(), r.target().cloned())
            })
            .collect();

        // WHEN replaying with factories seeded differently
        let registry = registry(999);
        let replayed = ReplayEngine::new(store.as_ref(), &registry)
            .replay_all()
            .unwrap();

        // THEN the recorded RNG states reproduce the same digits
        assert_eq!(replayed, produced, "sqlite backend: {}", sqlite);
    }
}

#[test]
fn test_batches_replay_in_order() {
    let dir = TempDir::new().unwrap();
    let mut store = flat_store(&dir);
    run_append_session(store.as_mut(), &[("first", 0)], &[1]);
    run_append_session(store.as_mut(), &[("second", 1), ("third", 2)], &[2]);
    run_append_session(store.as_mut(), &[("raw", 7)], &[]);

    let registry = registry(0);
    let replayed = ReplayEngine::new(store.as_ref(), &registry)
        .replay_all()
        .unwrap();

    assert_eq!(
        replayed,
        vec![
            ("first?".to_string(), Some(Label::Class(1))),
            ("second??".to_string(), Some(Label::Class(2))),
            ("third??".to_string(), Some(Label::Class(3))),
            ("raw".to_string(), Some(Label::Class(7))),
        ]
    );
}

#[test]
fn test_retried_close_replays_alongside_later_session() {
    // GIVEN a flat-file store flushing every row, with records blocked
    let dir = TempDir::new().unwrap();
    let mut store =
        FlatFileStore::open(&StoreConfig::flat_file(dir.path()).flush_after(1)).unwrap();
    fs::create_dir(store.records_path()).unwrap();

    // WHEN a two-record session fails to close
    let mut arena = RecordArena::new();
    let mut t = AppendChars::new("?");
    let closed = {
        let mut session = BatchSession::open(
            &mut arena,
            store.as_sink(),
            &WordTokenizer,
            inputs(&[("mytest1", 0), ("mytest2", 1)]),
        )
        .unwrap();
        for n in 1..=4u64 {
            session.apply(&mut t, &AppendChars::call(n)).unwrap();
        }
        session.close()
    };
    assert!(matches!(closed, Err(LineageError::FlushFailure { .. })));

    // AND the flush is retried before another session runs
    fs::remove_dir(store.records_path()).unwrap();
    store.flush(true).unwrap();
    run_append_session(&mut store, &[("later", 9)], &[2]);

    // THEN both batches replay with their own originals
    let registry = registry(0);
    let replayed = ReplayEngine::new(&store, &registry).replay_all().unwrap();
    let mut expected = expected_four_steps();
    expected.push(("later??".to_string(), Some(Label::Class(10))));
    assert_eq!(replayed, expected);
}

#[test]
fn test_unregistered_transform_is_not_found_with_location() {
    // GIVEN a persisted session and a registry that knows nothing
    let dir = TempDir::new().unwrap();
    let mut store = flat_store(&dir);
    run_append_session(store.as_mut(), &[("x", 0)], &[1]);
    let empty = TransformRegistry::new();

    // WHEN replaying
    let err = ReplayEngine::new(store.as_ref(), &empty)
        .replay_all()
        .unwrap_err();

    // THEN the error names the key and the failing step
    assert_eq!(
        err,
        LineageError::TransformNotFound {
            key: "tests::AppendChars".to_string(),
            transform_id: Some(TransformId(0)),
            batch_id: Some(BatchId(0)),
        }
    );
}

#[test]
fn test_unknown_transform_id_is_corrupt_provenance() {
    // GIVEN a records file referring to a transform id that was never written
    let dir = TempDir::new().unwrap();
    let store = FlatFileStore::open(&StoreConfig::flat_file(dir.path())).unwrap();
    fs::write(store.records_path(), "0,mytest,0,[9],[null]\n").unwrap();

    let registry = registry(0);
    let err = ReplayEngine::new(&store, &registry)
        .replay_all()
        .unwrap_err();

    assert!(matches!(
        err,
        LineageError::CorruptProvenance {
            transform_id: Some(TransformId(9)),
            batch_id: Some(BatchId(0)),
            ..
        }
    ));
}

#[test]
fn test_stochastic_step_without_generator_is_corrupt() {
    // GIVEN a stochastic step on disk
    let dir = TempDir::new().unwrap();
    let mut store = flat_store(&dir);
    let mut random = RandomDigit::new(1);
    let mut arena = RecordArena::new();
    {
        let mut session = BatchSession::open(
            &mut arena,
            store.as_sink(),
            &WordTokenizer,
            inputs(&[("x", 0)]),
        )
        .unwrap();
        session
            .apply(&mut random, &Invocation::new("transform"))
            .unwrap();
        session.close().unwrap();
    }

    // AND a registry that rebuilds it as something without an RNG
    let mut registry = TransformRegistry::new();
    registry.register("tests::RandomDigit", |_: &TransformIdentity| {
        let t: Box<dyn Transformation> = Box::new(AppendChars::new("?"));
        Ok(t)
    });

    // WHEN/THEN replay refuses to run it unseeded
    let err = ReplayEngine::new(store.as_ref(), &registry)
        .replay_all()
        .unwrap_err();
    assert!(matches!(err, LineageError::CorruptProvenance { .. }));
}

#[test]
fn test_shape_change_on_replay_is_shape_mismatch() {
    let dir = TempDir::new().unwrap();
    let mut store = flat_store(&dir);
    run_append_session(store.as_mut(), &[("a", 0), ("b", 0)], &[1]);

    let mut registry = TransformRegistry::new();
    registry.register("tests::AppendChars", |_: &TransformIdentity| {
        let t: Box<dyn Transformation> = Box::new(FnTransformation::anonymous(
            "transform_batch",
            |batch: Batch, _: &Invocation| -> Result<Batch> {
                Ok(batch.into_pairs().into_iter().take(1).collect())
            },
        ));
        Ok(t)
    });

    let err = ReplayEngine::new(store.as_ref(), &registry)
        .replay_all()
        .unwrap_err();
    assert_eq!(
        err,
        LineageError::ShapeMismatch {
            callable: "transform_batch".to_string(),
            expected: 2,
            actual: 1,
        }
    );
}

#[test]
fn test_replay_into_rebuilds_traceable_lineage() {
    // GIVEN a persisted four-step session
    let dir = TempDir::new().unwrap();
    let mut store = sqlite_store(&dir);
    run_append_session(
        store.as_mut(),
        &[("mytest1", 0), ("mytest2", 1)],
        &[1, 2, 3, 4],
    );

    // WHEN replaying into a fresh arena
    let registry = registry(0);
    let mut arena = RecordArena::new();
    let ids = ReplayEngine::new(store.as_ref(), &registry)
        .replay_into(&mut arena, &WordTokenizer)
        .unwrap();

    // THEN the final records match and carry the full history
    assert_eq!(ids.len(), 2);
    let last = arena.get(ids[1]).unwrap();
    assert_eq!(last.text().text(), "mytest2??????????");
    assert_eq!(last.target(), Some(&Label::Class(5)));
    assert_eq!(last.transformation_provenance().len(), 4);

    let trace = arena.trace(ids[0]).unwrap();
    let names: Vec<Option<&str>> = trace.iter().map(|s| s.transform.as_deref()).collect();
    assert_eq!(
        names,
        vec![
            None,
            Some("AppendChars.transform_batch"),
            Some("AppendChars.transform_batch"),
            Some("AppendChars.transform_batch"),
            Some("AppendChars.transform_batch"),
        ]
    );
    assert_eq!(trace[0].text, "mytest1");
}

#[test]
fn test_empty_store_replays_nothing() {
    let dir = TempDir::new().unwrap();
    let store = flat_store(&dir);
    let registry = registry(0);
    assert!(ReplayEngine::new(store.as_ref(), &registry)
        .replay_all()
        .unwrap()
        .is_empty());
}
