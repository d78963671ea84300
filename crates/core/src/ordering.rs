#![forbid(unsafe_code)]

//! Sorting-slot arithmetic.
//!
//! Sibling order is kept with integer `sorting` values spaced by
//! [`SORTING_STEP`]. New slots are taken from the midpoint of the gap around
//! the insertion point; once a gap is exhausted the whole sibling group is
//! renumbered (rebalanced) back onto multiples of the step.

use crate::ids::RecordId;

pub const SORTING_STEP: i64 = 128;

/// Exclusive upper bound of the sorting domain (unsigned 32-bit column).
pub const SORTING_CEILING: i64 = 4_294_967_295;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotDecision {
    Use(i64),
    Rebalance,
}

/// Slot for a new first child, given the current minimum sibling sorting.
pub fn first_slot(current_min: Option<i64>) -> SlotDecision {
    match current_min {
        None => SlotDecision::Use(SORTING_STEP),
        Some(min) if min % 2 != 0 || min < 1 => SlotDecision::Rebalance,
        Some(min) => SlotDecision::Use(min / 2),
    }
}

/// Slot right after `current`, given the smallest sibling sorting above it.
pub fn slot_after(current: i64, next: Option<i64>) -> SlotDecision {
    match next {
        None => match current.checked_add(SORTING_STEP) {
            Some(slot) if slot < SORTING_CEILING => SlotDecision::Use(slot),
            _ => SlotDecision::Rebalance,
        },
        Some(next) => {
            if next >= SORTING_CEILING {
                return SlotDecision::Rebalance;
            }
            let sum = current.saturating_add(next);
            if sum % 2 != 0 {
                SlotDecision::Rebalance
            } else {
                SlotDecision::Use(sum / 2)
            }
        }
    }
}

/// Slot after the current maximum of a group (append).
pub fn append_slot(current_max: Option<i64>) -> SlotDecision {
    match current_max {
        None => SlotDecision::Use(SORTING_STEP),
        Some(max) => slot_after(max, None),
    }
}

/// New sorting values for a sibling group plus the slot reserved for the
/// record being placed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebalancePlan {
    pub assignments: Vec<(RecordId, i64)>,
    pub slot: i64,
}

/// Renumber `siblings` (already in display order) so that the first slot is
/// free for a new first child.
pub fn rebalance_for_first(siblings: &[RecordId]) -> Option<RebalancePlan> {
    let mut assignments = Vec::with_capacity(siblings.len());
    let mut count = 2i64;
    for id in siblings {
        assignments.push((*id, checked_slot(count)?));
        count += 1;
    }
    Some(RebalancePlan {
        assignments,
        slot: SORTING_STEP,
    })
}

/// Renumber `siblings` (already in display order) and reserve the slot
/// directly after `reference`. When `reference` is not part of the group the
/// reserved slot is the one after the last sibling.
pub fn rebalance_after(siblings: &[RecordId], reference: RecordId) -> Option<RebalancePlan> {
    let mut assignments = Vec::with_capacity(siblings.len());
    let mut slot = None;
    let mut count = 1i64;
    for id in siblings {
        assignments.push((*id, checked_slot(count)?));
        count += 1;
        if *id == reference && slot.is_none() {
            slot = Some(checked_slot(count)?);
            count += 1;
        }
    }
    let slot = match slot {
        Some(slot) => slot,
        None => checked_slot(count)?,
    };
    Some(RebalancePlan { assignments, slot })
}

fn checked_slot(count: i64) -> Option<i64> {
    count
        .checked_mul(SORTING_STEP)
        .filter(|slot| *slot < SORTING_CEILING)
}
