//! In-memory space-partitioning trees over a point set.
//!
//! Both trees own their points in the leaves, and every input point ends up in exactly one
//! leaf. Leaves are numbered in depth-first order, which is the partition id of their points.

pub use kd::*;
pub use quad::*;

use tessera_error::{TesseraResult, tessera_bail, tessera_err};

use crate::Point;

mod kd;
mod quad;

/// Maps every row to the index of the leaf holding it.
pub(crate) fn leaf_ids<'a>(
    leaves: impl Iterator<Item = &'a [Point]>,
    num_rows: usize,
) -> TesseraResult<Vec<u32>> {
    let mut ids = vec![None; num_rows];
    for (leaf, points) in leaves.enumerate() {
        let leaf = u32::try_from(leaf).map_err(|_| tessera_err!("too many leaves: {leaf}"))?;
        for point in points {
            let row = point.row();
            let slot = ids
                .get_mut(row)
                .ok_or_else(|| tessera_err!(OutOfBounds: row, 0, num_rows))?;
            if slot.replace(leaf).is_some() {
                tessera_bail!(AssertionFailed: "row {row} is held by two leaves");
            }
        }
    }
    ids.into_iter()
        .enumerate()
        .map(|(row, id)| id.ok_or_else(|| tessera_err!(AssertionFailed: "row {row} is held by no leaf")))
        .collect()
}
