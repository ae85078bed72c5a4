//! Disk-backed sorting for datasets that do not fit in memory.
//!
//! A dataset is sorted in two steps: every batch is sorted on its own and written as a run
//! (`s<id>` files, see [`write_sorted`]), then all runs of a folder are merged with a k-way merge
//! into size-bounded output files (see [`merge_files`]). Only one batch per run is resident at
//! any time.

pub use merge::*;
pub use sort::*;

mod merge;
mod sort;

/// Prefix of sorted run files consumed by [`merge_files`].
pub const RUN_PREFIX: &str = "s";
