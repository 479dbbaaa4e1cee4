//! SQLite provenance store
//!
//! Rows are written in one transaction per flush. `transform` holds each
//! definition once (unique on its digest); `transform_applied` holds one row
//! per application with that application's RNG snapshot.

use crate::buffer::{ApplicationRow, HistoryRow, WriteBuffer};
use crate::config::StoreConfig;
use crate::db;
use crate::errors::{corrupt_row, flush_failure, from_rusqlite, Result};
use crate::migrations::apply_migrations;
use crate::store::{PersistedBatch, PersistedRecord, PersistedStep, ProvenanceStore};
use lineage_core::errors::ExError;
use lineage_core::rng::RngState;
use lineage_core::sink::DIFF_GRANULARITY;
use lineage_core::{
    log_op_end, log_op_error, log_op_start, Label, LineageRecord, ProvenanceSink,
    TransformationDescriptor,
};
use lineage_core_types::{BatchId, RunName, TransformId};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::Path;

pub struct SqliteStore {
    conn: Connection,
    run_id: i64,
    run_name: RunName,
    buffer: WriteBuffer,
}

impl SqliteStore {
    /// Open (or create) a database file and register this run
    ///
    /// # Errors
    ///
    /// `Persistence` for SQLite failures, `ChecksumMismatch` if an applied
    /// migration was edited.
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        Self::from_connection(db::open(path)?, config)
    }

    /// # Errors
    ///
    /// As [`open`](Self::open).
    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        Self::from_connection(db::open_in_memory()?, config)
    }

    fn from_connection(mut conn: Connection, config: &StoreConfig) -> Result<Self> {
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;

        let run_name = config
            .run_name
            .clone()
            .map_or_else(RunName::new, RunName::from_string);
        conn.execute(
            "INSERT OR IGNORE INTO run (name) VALUES (?1)",
            [run_name.as_str()],
        )
        .map_err(from_rusqlite)?;
        let run_id: i64 = conn
            .query_row(
                "SELECT id FROM run WHERE name = ?1",
                [run_name.as_str()],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;

        let last_batch: Option<i64> = conn
            .query_row(
                "SELECT MAX(b) FROM (
                    SELECT MAX(batch_id) AS b FROM record
                    UNION ALL
                    SELECT MAX(batch_id) AS b FROM transform_applied
                 )",
                [],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        let next_batch = last_batch.map_or(BatchId(0), |b| BatchId(b as u64).next());

        tracing::debug!(
            component = module_path!(),
            run_name = run_name.as_str(),
            batch_id = next_batch.get(),
            "sqlite store opened"
        );

        Ok(Self {
            conn,
            run_id,
            run_name,
            buffer: WriteBuffer::new(config, next_batch),
        })
    }

    pub fn run_name(&self) -> &RunName {
        &self.run_name
    }

    /// Batch id stamped on rows logged from now on
    pub fn current_batch_id(&self) -> BatchId {
        self.buffer.batch_id()
    }

    /// Read access for inspection and ad-hoc queries
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn write_buffered(conn: &mut Connection, run_id: i64, buffer: &WriteBuffer) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;
    for row in buffer.histories() {
        write_history(&tx, run_id, row)?;
    }
    for row in buffer.applications() {
        write_application(&tx, run_id, row)?;
    }
    tx.commit().map_err(from_rusqlite)
}

fn write_history(tx: &Transaction, run_id: i64, row: &HistoryRow) -> Result<()> {
    let batch_id = row.batch_id.get() as i64;
    let record_id = insert_record(tx, &row.text, &row.target, run_id, Some(batch_id))?;
    for (step, descriptor) in row.steps.iter().enumerate() {
        let transform_id = get_or_insert_transform(tx, descriptor)?;
        tx.execute(
            "INSERT INTO transform_applied
                (input_record_id, transform_id, transform_rng_state, run_id, batch_id, step)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record_id,
                transform_id,
                rng_json(&descriptor.rng_state)?,
                run_id,
                batch_id,
                step as i64,
            ],
        )
        .map_err(from_rusqlite)?;
    }
    Ok(())
}

fn write_application(tx: &Transaction, run_id: i64, row: &ApplicationRow) -> Result<()> {
    let step = &row.step;
    let input_id = insert_record(tx, &step.input_text, &step.input_target, run_id, None)?;
    let output_id = insert_record(tx, &step.output_text, &step.output_target, run_id, None)?;
    let transform_id = get_or_insert_transform(tx, &step.descriptor)?;
    tx.execute(
        "INSERT INTO transform_applied
            (input_record_id, output_record_id, diff_json, diff_granularity,
             transform_id, transform_rng_state, run_id, batch_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            input_id,
            output_id,
            serde_json::to_string(&step.diff_tags)?,
            DIFF_GRANULARITY,
            transform_id,
            rng_json(&step.descriptor.rng_state)?,
            run_id,
            row.batch_id.get() as i64,
        ],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

fn insert_record(
    tx: &Transaction,
    text: &str,
    target: &Option<Label>,
    run_id: i64,
    batch_id: Option<i64>,
) -> Result<i64> {
    tx.execute(
        "INSERT INTO record (text, target, run_id, batch_id) VALUES (?1, ?2, ?3, ?4)",
        params![text, serde_json::to_string(target)?, run_id, batch_id],
    )
    .map_err(from_rusqlite)?;
    Ok(tx.last_insert_rowid())
}

fn rng_json(state: &Option<RngState>) -> Result<Option<String>> {
    state
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(ExError::from)
}

/// Id of the definition row for `descriptor`, inserting it if new
fn get_or_insert_transform(tx: &Transaction, descriptor: &TransformationDescriptor) -> Result<i64> {
    let digest = descriptor.definition_digest()?;
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM transform WHERE definition_digest = ?1",
            [&digest],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;
    if let Some(id) = existing {
        return Ok(id);
    }

    tx.execute(
        "INSERT INTO transform
            (definition_digest, module_name, class_name, class_args, class_kwargs,
             class_rng_attr, callable_name, callable_args, callable_kwargs,
             callable_is_stochastic)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            digest,
            descriptor.module_name,
            descriptor.class_name,
            serde_json::to_string(&descriptor.class_args)?,
            serde_json::to_string(&descriptor.class_kwargs)?,
            descriptor.class_rng_attr,
            descriptor.callable_name,
            serde_json::to_string(&descriptor.callable_args)?,
            serde_json::to_string(&descriptor.callable_kwargs)?,
            descriptor.callable_is_stochastic,
        ],
    )
    .map_err(from_rusqlite)?;
    Ok(tx.last_insert_rowid())
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str, table: &str, id: i64) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| corrupt_row(table, id as usize, e))
}

impl SqliteStore {
    /// Threshold flush after buffering a row
    ///
    /// A failure here is logged, not returned: the rows stay buffered and
    /// the next flush retries them, while the caller's row was accepted.
    fn auto_flush(&mut self) {
        if let Err(err) = self.flush(false) {
            tracing::warn!(
                component = module_path!(),
                error = %err,
                pending = self.buffer.pending_rows(),
                "auto flush failed; rows stay buffered"
            );
        }
    }
}

impl ProvenanceSink for SqliteStore {
    fn log(&mut self, input: &LineageRecord, output: &LineageRecord) -> Result<()> {
        self.buffer.push_application(input, output)?;
        self.auto_flush();
        Ok(())
    }

    fn log_original(&mut self, text: &str, target: Option<&Label>) -> Result<()> {
        self.buffer.push_original(text, target);
        Ok(())
    }

    fn log_transform_prov(&mut self, entries: &[TransformationDescriptor]) -> Result<()> {
        self.buffer.push_history(entries)?;
        self.auto_flush();
        Ok(())
    }

    fn flush(&mut self, force: bool) -> Result<()> {
        // rows carry their batch id already, so a forced flush ends the
        // batch whether or not the write below succeeds
        if force {
            self.buffer.close_batch();
        }
        if !self.buffer.should_flush(force) {
            return Ok(());
        }

        let pending = self.buffer.pending_rows();
        log_op_start!("flush", rows = pending, force = force);
        let start = std::time::Instant::now();

        write_buffered(&mut self.conn, self.run_id, &self.buffer).map_err(|e| {
            let err: ExError = flush_failure(pending, e);
            log_op_error!(
                "flush",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            err
        })?;
        self.buffer.commit();

        log_op_end!(
            "flush",
            duration_ms = start.elapsed().as_millis() as u64,
            rows = pending
        );
        Ok(())
    }
}

impl ProvenanceStore for SqliteStore {
    fn clean_data_store(&mut self) -> Result<()> {
        let tx = self.conn.transaction().map_err(from_rusqlite)?;
        tx.execute_batch(
            "DELETE FROM transform_applied;
             DELETE FROM record;
             DELETE FROM transform;",
        )
        .map_err(from_rusqlite)?;
        tx.commit().map_err(from_rusqlite)?;
        self.buffer.reset(BatchId(0));
        Ok(())
    }

    fn load_batches(&self) -> Result<Vec<PersistedBatch>> {
        let mut records_stmt = self
            .conn
            .prepare(
                "SELECT id, text, target, batch_id FROM record
                 WHERE batch_id IS NOT NULL
                 ORDER BY batch_id, id",
            )
            .map_err(from_rusqlite)?;
        let rows: Vec<(i64, String, Option<String>, i64)> = records_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        let mut steps_stmt = self
            .conn
            .prepare(
                "SELECT transform_id, transform_rng_state FROM transform_applied
                 WHERE input_record_id = ?1 AND step IS NOT NULL
                 ORDER BY step",
            )
            .map_err(from_rusqlite)?;

        let mut batches: BTreeMap<BatchId, Vec<PersistedRecord>> = BTreeMap::new();
        for (record_id, text, target, batch_id) in rows {
            let target: Option<Label> = match target {
                Some(raw) => decode(&raw, "record", record_id)?,
                None => None,
            };
            let raw_steps: Vec<(i64, Option<String>)> = steps_stmt
                .query_map([record_id], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(from_rusqlite)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(from_rusqlite)?;

            let mut steps = Vec::with_capacity(raw_steps.len());
            for (transform_id, rng_state) in raw_steps {
                steps.push(PersistedStep {
                    transform_id: TransformId(transform_id as u64),
                    rng_state: match rng_state {
                        Some(raw) => Some(decode(&raw, "transform_applied", record_id)?),
                        None => None,
                    },
                });
            }

            batches
                .entry(BatchId(batch_id as u64))
                .or_default()
                .push(PersistedRecord {
                    text,
                    target,
                    steps,
                });
        }

        Ok(batches
            .into_iter()
            .map(|(batch_id, records)| PersistedBatch { batch_id, records })
            .collect())
    }

    fn transform_definitions(&self) -> Result<BTreeMap<TransformId, TransformationDescriptor>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, module_name, class_name, class_args, class_kwargs, class_rng_attr,
                        callable_name, callable_args, callable_kwargs, callable_is_stochastic
                 FROM transform ORDER BY id",
            )
            .map_err(from_rusqlite)?;

        type Row = (
            i64,
            Option<String>,
            Option<String>,
            String,
            String,
            Option<String>,
            String,
            String,
            String,
            bool,
        );
        let rows: Vec<Row> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                ))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        let mut definitions = BTreeMap::new();
        for (
            id,
            module_name,
            class_name,
            class_args,
            class_kwargs,
            class_rng_attr,
            callable_name,
            callable_args,
            callable_kwargs,
            callable_is_stochastic,
        ) in rows
        {
            definitions.insert(
                TransformId(id as u64),
                TransformationDescriptor {
                    module_name,
                    class_name,
                    class_args: decode(&class_args, "transform", id)?,
                    class_kwargs: decode(&class_kwargs, "transform", id)?,
                    class_rng_attr,
                    rng_state: None,
                    callable_name,
                    callable_args: decode(&callable_args, "transform", id)?,
                    callable_kwargs: decode(&callable_kwargs, "transform", id)?,
                    callable_is_stochastic,
                },
            );
        }
        Ok(definitions)
    }

    fn pending_rows(&self) -> usize {
        self.buffer.pending_rows()
    }

    fn as_sink(&mut self) -> &mut dyn ProvenanceSink {
        self
    }
}
