//! Range-shift primitive shared by every structural mutation.

use tracing::trace;

use crate::domain::{BoundKind, Region};
use crate::infrastructure::traits::BoundsStore;
use crate::infrastructure::StoreResult;

/// Add `delta` to every left and every right bound lying in `region`.
///
/// Each column is matched against its own pre-shift values. The two store
/// calls are atomic only together with the surrounding transaction.
pub fn shift(store: &dyn BoundsStore, region: Region, delta: i64) -> StoreResult<()> {
    if delta == 0 || region.is_empty() {
        trace!(%region, delta, "shift skipped");
        return Ok(());
    }
    trace!(%region, delta, "shift");
    store.shift_range(BoundKind::Right, region, delta)?;
    store.shift_range(BoundKind::Left, region, delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bounds, NewRecord};
    use crate::infrastructure::store::MemoryStore;

    fn store_with(bounds: &[(i64, i64)]) -> MemoryStore {
        let store = MemoryStore::new();
        for &(left, right) in bounds {
            store
                .insert(NewRecord {
                    name: format!("{left}-{right}"),
                    parent: None,
                    bounds: Bounds { left, right },
                })
                .unwrap();
        }
        store
    }

    fn bounds(store: &MemoryStore) -> Vec<(i64, i64)> {
        let mut all: Vec<(i64, i64)> = store
            .all()
            .unwrap()
            .iter()
            .map(|n| (n.left, n.right))
            .collect();
        all.sort();
        all
    }

    #[test]
    fn given_threshold_when_shifting_then_moves_bounds_at_or_beyond() {
        let store = store_with(&[(1, 4), (5, 6)]);
        shift(&store, Region::AtLeast(4), 2).unwrap();
        assert_eq!(bounds(&store), vec![(1, 6), (7, 8)]);
    }

    #[test]
    fn given_interval_when_shifting_into_negative_space_then_keeps_shape() {
        let store = store_with(&[(1, 2), (3, 6)]);
        shift(&store, Region::within(3, 6), -6).unwrap();
        assert_eq!(bounds(&store), vec![(-3, 0), (1, 2)]);
    }

    #[test]
    fn given_empty_region_when_shifting_then_nothing_changes() {
        let store = store_with(&[(1, 2)]);
        shift(&store, Region::within(3, 2), 5).unwrap();
        shift(&store, Region::AtLeast(1), 0).unwrap();
        assert_eq!(bounds(&store), vec![(1, 2)]);
    }
}
