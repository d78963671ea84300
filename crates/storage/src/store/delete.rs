#![forbid(unsafe_code)]

use super::cascade::walk_tx;
use super::support::{delete_row, now_ms, read_row, with_row_savepoint};
use super::undo::{NewUndoEntry, insert_undo_entry_tx, rewrite_undo_snapshot_tx};
use super::{
    DeleteReport, DeleteRequest, RowFailure, SqliteStore, StoreError, validate_record_id,
};
use std::collections::{BTreeMap, BTreeSet};
use tg_core::{CascadeIntent, Row, Session};

impl SqliteStore {
    /// Deletes a record and everything its cascade reaches, after writing an
    /// undo entry holding all removed rows.
    pub fn delete(
        &mut self,
        session: &mut Session,
        request: DeleteRequest,
    ) -> Result<DeleteReport, StoreError> {
        let table = &request.table;
        let id = validate_record_id(request.id)?;
        let now_ms = now_ms();

        let tx = self.conn.transaction()?;
        let shape = self.engine.shape(table)?;
        if shape.do_not_delete {
            return Err(StoreError::DeleteForbidden(table.to_string()));
        }
        if read_row(&tx, table, id)?.is_none() {
            return Err(StoreError::RecordNotFound {
                table: table.to_string(),
                id,
            });
        }

        let mut targets = vec![(table.clone(), id)];
        targets.extend(
            walk_tx(&tx, &self.engine, table, id, CascadeIntent::Delete, true)?
                .into_iter()
                .map(|node| (node.table, node.id)),
        );

        let mut present = Vec::with_capacity(targets.len());
        for (target_table, target_id) in targets {
            let Some(row) = read_row(&tx, &target_table, target_id)? else {
                continue;
            };
            for observer in &self.engine.observers {
                observer
                    .before_delete(&target_table, target_id, &row)
                    .map_err(StoreError::Observer)?;
            }
            present.push((target_table, target_id, row));
        }

        let mut snapshot: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        for (target_table, _, row) in &present {
            snapshot
                .entry(target_table.to_string())
                .or_default()
                .push(row.clone());
        }
        let undo_id = insert_undo_entry_tx(
            &tx,
            NewUndoEntry {
                actor_id: session.actor_id(),
                created_at_ms: now_ms,
                source_table: table,
                record_id: id,
                description: &format!("DELETE FROM {table} WHERE id={id}"),
                snapshot: &snapshot,
            },
        )?;

        let mut removed: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        let mut deleted = Vec::with_capacity(present.len());
        let mut failures = Vec::new();
        for (target_table, target_id, row) in present {
            match with_row_savepoint(&tx, || delete_row(&tx, &target_table, target_id)) {
                Ok(_) => {
                    removed.entry(target_table.to_string()).or_default().push(row);
                    deleted.push((target_table, target_id));
                }
                Err(err) => {
                    tracing::warn!(
                        table = %target_table,
                        id = target_id,
                        error = %err,
                        "row delete failed"
                    );
                    failures.push(RowFailure {
                        table: target_table,
                        id: target_id,
                        message: err.to_string(),
                    });
                }
            }
        }
        // Rows whose delete rolled back still exist and leave the entry.
        if !failures.is_empty() {
            rewrite_undo_snapshot_tx(&tx, undo_id, &removed)?;
        }
        tx.commit()?;

        let touched = deleted
            .iter()
            .map(|(table, _)| table.clone())
            .collect::<BTreeSet<_>>();
        self.invalidate_tables(&touched);
        session.clear_clipboard(table);
        for observer in &self.engine.observers {
            observer.after_delete(table, id, undo_id);
        }

        tracing::info!(
            table = %table,
            id,
            undo_id,
            rows = deleted.len(),
            failures = failures.len(),
            actor_id = session.actor_id(),
            "record deleted"
        );
        Ok(DeleteReport {
            undo_id,
            deleted,
            failures,
        })
    }
}
