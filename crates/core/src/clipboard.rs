#![forbid(unsafe_code)]

//! Session-scoped clipboard for "mark then paste" flows.
//!
//! Each table holds at most one pending entry. Reading an entry for a paste
//! removes it, so a paste can never be replayed from stale state.

use crate::ids::{ActorId, RecordId, TableName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClipboardMode {
    Cut,
    Copy,
    CutAll,
    CopyAll,
}

impl ClipboardMode {
    pub fn is_cut(self) -> bool {
        matches!(self, Self::Cut | Self::CutAll)
    }

    pub fn is_batch(self) -> bool {
        matches!(self, Self::CutAll | Self::CopyAll)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cut => "cut",
            Self::Copy => "copy",
            Self::CutAll => "cutAll",
            Self::CopyAll => "copyAll",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    pub table: TableName,
    pub ids: Vec<RecordId>,
    pub mode: ClipboardMode,
    /// Copy the self-referencing subtree along with each record.
    #[serde(default)]
    pub include_children: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClipboardError {
    EmptySelection,
    SingleModeWithManyIds,
    InvalidId(RecordId),
}

impl ClipboardError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmptySelection => "clipboard selection must not be empty",
            Self::SingleModeWithManyIds => "cut/copy take exactly one id; use cutAll/copyAll",
            Self::InvalidId(_) => "clipboard ids must be positive",
        }
    }
}

impl std::fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl ClipboardEntry {
    pub fn single(table: TableName, id: RecordId, mode: ClipboardMode) -> Self {
        Self {
            table,
            ids: vec![id],
            mode,
            include_children: false,
        }
    }

    pub fn batch(table: TableName, ids: Vec<RecordId>, mode: ClipboardMode) -> Self {
        Self {
            table,
            ids,
            mode,
            include_children: false,
        }
    }

    pub fn with_children(mut self) -> Self {
        self.include_children = true;
        self
    }

    fn validate(&self) -> Result<(), ClipboardError> {
        if self.ids.is_empty() {
            return Err(ClipboardError::EmptySelection);
        }
        if !self.mode.is_batch() && self.ids.len() != 1 {
            return Err(ClipboardError::SingleModeWithManyIds);
        }
        if let Some(id) = self.ids.iter().find(|id| **id <= 0) {
            return Err(ClipboardError::InvalidId(*id));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clipboard {
    entries: BTreeMap<TableName, ClipboardEntry>,
}

impl Clipboard {
    /// Stores `entry`, replacing any pending entry of the same table.
    pub fn mark(&mut self, mut entry: ClipboardEntry) -> Result<(), ClipboardError> {
        entry.validate()?;
        let mut seen = std::collections::BTreeSet::new();
        entry.ids.retain(|id| seen.insert(*id));
        self.entries.insert(entry.table.clone(), entry);
        Ok(())
    }

    pub fn consume(&mut self, table: &TableName) -> Option<ClipboardEntry> {
        self.entries.remove(table)
    }

    pub fn peek(&self, table: &TableName) -> Option<&ClipboardEntry> {
        self.entries.get(table)
    }

    pub fn clear(&mut self, table: &TableName) -> bool {
        self.entries.remove(table).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-user request context passed to every engine call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    actor_id: ActorId,
    #[serde(default)]
    clipboard: Clipboard,
}

impl Session {
    pub fn new(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            clipboard: Clipboard::default(),
        }
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn mark_clipboard(&mut self, entry: ClipboardEntry) -> Result<(), ClipboardError> {
        self.clipboard.mark(entry)
    }

    pub fn consume_clipboard(&mut self, table: &TableName) -> Option<ClipboardEntry> {
        self.clipboard.consume(table)
    }

    pub fn clear_clipboard(&mut self, table: &TableName) -> bool {
        self.clipboard.clear(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> TableName {
        TableName::try_new("tl_page").expect("table name")
    }

    #[test]
    fn consume_returns_entry_once() {
        let mut session = Session::new(1);
        session
            .mark_clipboard(ClipboardEntry::single(pages(), 5, ClipboardMode::Cut))
            .expect("mark");

        let entry = session.consume_clipboard(&pages()).expect("pending entry");
        assert_eq!(entry.ids, vec![5]);
        assert_eq!(entry.mode, ClipboardMode::Cut);
        assert!(session.consume_clipboard(&pages()).is_none());
    }

    #[test]
    fn mark_overwrites_pending_entry_of_same_table() {
        let mut session = Session::new(1);
        session
            .mark_clipboard(ClipboardEntry::single(pages(), 5, ClipboardMode::Cut))
            .expect("mark cut");
        session
            .mark_clipboard(ClipboardEntry::batch(
                pages(),
                vec![7, 8, 7],
                ClipboardMode::CopyAll,
            ))
            .expect("mark copyAll");

        let entry = session.clipboard().peek(&pages()).expect("pending entry");
        assert_eq!(entry.mode, ClipboardMode::CopyAll);
        assert_eq!(entry.ids, vec![7, 8]);
    }

    #[test]
    fn mark_rejects_bad_selection() {
        let mut clipboard = Clipboard::default();
        assert_eq!(
            clipboard.mark(ClipboardEntry::batch(pages(), Vec::new(), ClipboardMode::CutAll)),
            Err(ClipboardError::EmptySelection)
        );
        assert_eq!(
            clipboard.mark(ClipboardEntry::batch(pages(), vec![1, 2], ClipboardMode::Copy)),
            Err(ClipboardError::SingleModeWithManyIds)
        );
        assert_eq!(
            clipboard.mark(ClipboardEntry::single(pages(), 0, ClipboardMode::Copy)),
            Err(ClipboardError::InvalidId(0))
        );
        assert!(clipboard.is_empty());
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = Session::new(42);
        session
            .mark_clipboard(
                ClipboardEntry::batch(pages(), vec![3, 4], ClipboardMode::CopyAll).with_children(),
            )
            .expect("mark");

        let json = serde_json::to_string(&session).expect("serialize session");
        assert!(json.contains(r#""mode":"copyAll""#), "{json}");
        let restored: Session = serde_json::from_str(&json).expect("parse session");
        assert_eq!(restored, session);
    }
}
