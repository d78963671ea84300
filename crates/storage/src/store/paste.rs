#![forbid(unsafe_code)]

use super::copy::{duplicate_tx, ensure_not_circular};
use super::move_record::move_tx;
use super::support::now_ms;
use super::{
    DuplicateRequest, PasteReport, PasteRequest, PastedRecord, SqliteStore, StoreError,
};
use std::collections::BTreeSet;
use tg_core::{Placement, Session};

impl SqliteStore {
    /// Applies the session's pending clipboard entry for `request.table` at
    /// `request.placement`.
    ///
    /// The entry is consumed before anything is written, so a failed paste
    /// cannot be replayed. Batch modes keep clipboard order: every record
    /// after the first lands right after the previous one.
    pub fn paste(
        &mut self,
        session: &mut Session,
        request: PasteRequest,
    ) -> Result<PasteReport, StoreError> {
        let entry = session
            .consume_clipboard(&request.table)
            .ok_or(StoreError::InvalidInput("clipboard holds nothing for this table"))?;
        let table = entry.table;
        let now_ms = now_ms();

        let tx = self.conn.transaction()?;
        self.engine.shape(&table)?;
        for id in &entry.ids {
            ensure_not_circular(&tx, &self.engine, &table, *id, Some(&request.placement), true)?;
        }

        let mut placed = Vec::with_capacity(entry.ids.len());
        let mut failures = Vec::new();
        let mut touched = BTreeSet::from([table.clone()]);
        let mut placement = request.placement.clone();
        for source_id in entry.ids.iter().copied() {
            let record = if entry.mode.is_cut() {
                let position = move_tx(&tx, &self.engine, &table, source_id, &placement, now_ms)?;
                PastedRecord {
                    source_id,
                    id: source_id,
                    position,
                }
            } else {
                let report = duplicate_tx(
                    &tx,
                    &self.engine,
                    &DuplicateRequest {
                        table: table.clone(),
                        source_id,
                        placement: Some(placement.clone()),
                        batch: entry.mode.is_batch(),
                        include_children: entry.include_children,
                    },
                    now_ms,
                )?;
                touched.extend(report.copied.iter().map(|row| row.table.clone()));
                failures.extend(report.failures);
                PastedRecord {
                    source_id,
                    id: report.new_id,
                    position: report.position,
                }
            };
            placement = Placement::after(record.id);
            placed.push(record);
        }
        tx.commit()?;

        self.invalidate_tables(&touched);
        for record in &placed {
            for observer in &self.engine.observers {
                if entry.mode.is_cut() {
                    observer.after_move(&table, record.id, &record.position);
                } else {
                    observer.after_copy(&table, record.source_id, record.id);
                }
            }
        }

        tracing::info!(
            table = %table,
            mode = entry.mode.as_str(),
            records = placed.len(),
            failures = failures.len(),
            actor_id = session.actor_id(),
            "clipboard pasted"
        );
        Ok(PasteReport {
            table,
            mode: entry.mode,
            placed,
            failures,
        })
    }
}
