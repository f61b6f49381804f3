//! The global order over committed events and the cursor that marks a
//! position within it.
//!
//! Ordering is by `(transaction_id, position)`, not by `position` alone:
//! `transaction_id` reflects commit order, so a cursor taken while a slow
//! transaction is still in flight correctly excludes it once it finally
//! commits, even though that transaction's rows may carry smaller
//! `position` values than events committed after it. See spec.md §4.5.
use std::cmp::Ordering;

/// A position in the global event order. Exclusive on reads: a scan "after
/// cursor c" returns only events that sort strictly greater than `c`.
///
/// A cursor is only ever produced by the store (from a read or a
/// projection); there is no public constructor that fabricates one out of
/// thin air besides [`Cursor::zero`], which represents "the start of the
/// stream" and is what an absent `after` argument is equivalent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Cursor {
    transaction_id: u64,
    position: i64,
}

impl Cursor {
    /// Constructs a cursor from its wire components. Only backends that
    /// actually observed a `(transaction_id, position)` pair committed to
    /// the store should call this.
    pub fn new(transaction_id: u64, position: i64) -> Self {
        Self {
            transaction_id,
            position,
        }
    }

    /// The cursor preceding the first possible event: `after` this cursor
    /// returns the entire stream.
    pub fn zero() -> Self {
        Self {
            transaction_id: 0,
            position: 0,
        }
    }

    pub fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    pub fn position(&self) -> i64 {
        self.position
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.transaction_id, self.position).cmp(&(other.transaction_id, other.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic_on_tx_then_position() {
        let a = Cursor::new(1, 5);
        let b = Cursor::new(1, 6);
        let c = Cursor::new(2, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(Cursor::zero() < a);
    }

    #[test]
    fn equal_pairs_compare_equal() {
        assert_eq!(Cursor::new(3, 9), Cursor::new(3, 9));
    }
}
