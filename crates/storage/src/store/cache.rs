#![forbid(unsafe_code)]

use std::collections::HashMap;
use tg_core::ids::{RecordId, TableName};

/// Memoized per-group child counts used by listings.
#[derive(Debug, Default)]
pub(super) struct ListingCache {
    child_counts: HashMap<(TableName, RecordId, Option<String>), usize>,
}

impl ListingCache {
    pub(super) fn get(
        &self,
        table: &TableName,
        pid: RecordId,
        ptable: Option<&str>,
    ) -> Option<usize> {
        self.child_counts
            .get(&(table.clone(), pid, ptable.map(str::to_string)))
            .copied()
    }

    pub(super) fn put(
        &mut self,
        table: &TableName,
        pid: RecordId,
        ptable: Option<&str>,
        count: usize,
    ) {
        self.child_counts
            .insert((table.clone(), pid, ptable.map(str::to_string)), count);
    }

    pub(super) fn invalidate_table(&mut self, table: &TableName) {
        self.child_counts.retain(|(cached, _, _), _| cached != table);
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.child_counts.len()
    }
}
