//! Smallest-free-id allocation shared by every resource table.
//!
//! New rows take the lowest positive integer not currently in use, so ids stay
//! contiguous for small admin-managed tables. The scan is linear in the row
//! count and re-runs on every create; there is no persisted free list.

/// Smallest positive id absent from `ids`, which must be ascending without duplicates.
pub fn next_available_id(ids: &[i64]) -> i64 {
    let mut next = 1;
    for &id in ids {
        if id != next {
            break;
        }
        next += 1;
    }
    next
}

/// Value the table's auto-increment counter is advanced to once `assigned` is inserted.
pub fn counter_after(highest_existing: Option<i64>, assigned: i64) -> i64 {
    highest_existing.unwrap_or(0).max(assigned) + 1
}

/// Id and counter for one insert, computed from the ids in use before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub id: i64,
    pub counter: i64,
}

impl Allocation {
    pub fn plan(ids: &[i64]) -> Self {
        let id = next_available_id(ids);
        Allocation {
            id,
            counter: counter_after(ids.last().copied(), id),
        }
    }
}
