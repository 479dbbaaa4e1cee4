//! Batch Session Tests
//!
//! ## Scenarios Covered
//!
//! 1. Opening a session logs every original
//! 2. Closing logs one ordered history per final record, then forces a flush
//! 3. Dropping an unclosed session performs the same close
//! 4. A failing close flush surfaces as FlushFailure
//! 5. A refused history does not stop the remaining histories or the flush
//! 6. A sink failure after apply still advances the session
//! 7. Targets with no JSON encoding are refused before anything is logged

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{AppendChars, RecordingSink};
use lineage_core::errors::{LineageError, Result};
use lineage_core::{Batch, BatchSession, FnTransformation, Invocation, Label, RecordArena, WordTokenizer};

fn inputs() -> Vec<(String, Option<Label>)> {
    vec![
        ("mytest1".to_string(), Some(Label::Class(0))),
        ("mytest2".to_string(), Some(Label::Class(1))),
    ]
}

#[test]
fn test_session_logs_originals_and_histories() {
    // GIVEN a session over two raw inputs
    let mut arena = RecordArena::new();
    let mut sink = RecordingSink::default();
    let mut t = AppendChars::new("?");

    let final_ids = {
        let mut session = BatchSession::open(&mut arena, &mut sink, &WordTokenizer, inputs()).unwrap();

        // WHEN four applications run
        for n in 1..=4u64 {
            session.apply(&mut t, &AppendChars::call(n)).unwrap();
        }
        session.close().unwrap()
    };

    // THEN the final texts carry ten appended characters
    let last = arena.get(final_ids[0]).unwrap();
    assert_eq!(last.text().text(), "mytest1??????????");
    assert_eq!(last.target(), Some(&Label::Class(4)));

    // AND the sink saw both originals, both histories and one forced flush
    assert_eq!(sink.originals, inputs());
    assert_eq!(sink.histories.len(), 2);
    let multipliers: Vec<u64> = sink.histories[1]
        .iter()
        .map(|d| d.callable_kwargs["char_multiplier"].as_u64().unwrap())
        .collect();
    assert_eq!(multipliers, vec![1, 2, 3, 4]);
    assert_eq!(sink.flushes, vec![true]);
    assert_eq!(sink.logged.len(), 8);
}

#[test]
fn test_dropped_session_still_flushes() {
    let mut arena = RecordArena::new();
    let mut sink = RecordingSink::default();
    let mut t = AppendChars::new("?");

    {
        let mut session = BatchSession::open(&mut arena, &mut sink, &WordTokenizer, inputs()).unwrap();
        session.apply(&mut t, &AppendChars::call(1)).unwrap();
        // session leaves scope without close()
    }

    assert_eq!(sink.histories.len(), 2);
    assert_eq!(sink.flushes, vec![true]);
}

#[test]
fn test_session_without_applications_logs_empty_histories() {
    let mut arena = RecordArena::new();
    let mut sink = RecordingSink::default();

    let ids = BatchSession::open(&mut arena, &mut sink, &WordTokenizer, inputs())
        .unwrap()
        .close()
        .unwrap();

    assert_eq!(ids.len(), 2);
    assert!(sink.histories.iter().all(Vec::is_empty));
}

#[test]
fn test_close_reports_flush_failure() {
    let mut arena = RecordArena::new();
    let mut sink = RecordingSink {
        fail_flush: true,
        ..RecordingSink::default()
    };

    let session = BatchSession::open(&mut arena, &mut sink, &WordTokenizer, inputs()).unwrap();
    let result = session.close();

    assert!(matches!(result, Err(LineageError::FlushFailure { .. })));
    // close is not attempted a second time on drop
    assert_eq!(sink.flushes.len(), 1);
}

#[test]
fn test_refused_history_still_offers_the_rest_and_flushes() {
    // GIVEN a sink that refuses every history
    let mut arena = RecordArena::new();
    let mut sink = RecordingSink {
        fail_history: true,
        ..RecordingSink::default()
    };

    // WHEN the session closes
    let session = BatchSession::open(&mut arena, &mut sink, &WordTokenizer, inputs()).unwrap();
    let result = session.close();

    // THEN the first refusal is reported
    assert!(matches!(result, Err(LineageError::InvalidInput { .. })));
    // AND every history was offered and the flush still ran
    assert_eq!(sink.histories.len(), 2);
    assert_eq!(sink.flushes, vec![true]);
}

#[test]
fn test_sink_failure_after_apply_advances_session() {
    // GIVEN a sink whose audit log fails
    let mut arena = RecordArena::new();
    let mut sink = RecordingSink {
        fail_log: true,
        ..RecordingSink::default()
    };
    let mut t = AppendChars::new("?");

    let final_ids = {
        let mut session =
            BatchSession::open(&mut arena, &mut sink, &WordTokenizer, inputs()).unwrap();
        let raw = session.records().to_vec();

        // WHEN apply commits children and then the sink fails
        let err = session.apply(&mut t, &AppendChars::call(1)).unwrap_err();

        // THEN the error is the sink's and the session moved on to the children
        assert!(matches!(err, LineageError::FlushFailure { .. }));
        assert_ne!(session.records(), raw.as_slice());
        session.close().unwrap()
    };

    assert_eq!(arena.get(final_ids[0]).unwrap().text().text(), "mytest1?");
    // AND the logged histories match the committed generation
    assert_eq!(sink.histories.len(), 2);
    assert!(sink.histories.iter().all(|h| h.len() == 1));
}

#[test]
fn test_non_finite_score_is_refused_on_open() {
    let mut arena = RecordArena::new();
    let mut sink = RecordingSink::default();

    let refused = matches!(
        BatchSession::open(
            &mut arena,
            &mut sink,
            &WordTokenizer,
            vec![
                ("fine".to_string(), Some(Label::Score(0.5))),
                ("broken".to_string(), Some(Label::Score(f64::NAN))),
            ],
        ),
        Err(LineageError::InvalidInput { .. })
    );

    assert!(refused);
    assert!(sink.originals.is_empty());
    assert!(arena.is_empty());
}

#[test]
fn test_non_finite_score_output_is_refused_before_commit() {
    // GIVEN a session over score-labelled records
    let mut arena = RecordArena::new();
    let mut sink = RecordingSink::default();
    let mut to_infinity = FnTransformation::new("tests", "to_infinity", |batch: Batch, _: &Invocation| -> Result<Batch> {
        Ok(Batch {
            targets: vec![Some(Label::Score(f64::INFINITY)); batch.targets.len()],
            texts: batch.texts,
        })
    });

    {
        let mut session = BatchSession::open(
            &mut arena,
            &mut sink,
            &WordTokenizer,
            vec![("x".to_string(), Some(Label::Score(1.0)))],
        )
        .unwrap();
        let raw = session.records().to_vec();

        // WHEN a transformation produces an infinite score
        let err = session
            .apply(&mut to_infinity, &Invocation::new("to_infinity"))
            .unwrap_err();

        // THEN nothing is committed or logged and the session stays put
        assert!(matches!(err, LineageError::InvalidInput { .. }));
        assert_eq!(session.records(), raw.as_slice());
        assert_eq!(session.arena().len(), 1);
    }
    assert!(sink.logged.is_empty());
}
