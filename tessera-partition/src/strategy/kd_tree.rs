use tessera_error::TesseraResult;

use crate::{KdTree, PartitionJob, PartitionSummary, Partitioning, PartitioningScheme};

/// Partitions on the leaves of a [`KdTree`] built over every row. Memory grows with the row count.
#[derive(Debug, Clone, Copy, Default)]
pub struct KdTreePartitioning;

impl Partitioning for KdTreePartitioning {
    fn scheme(&self) -> PartitioningScheme {
        PartitioningScheme::KdTree
    }

    fn partition_rows(&self, job: &mut PartitionJob<'_>) -> TesseraResult<PartitionSummary> {
        let tree = KdTree::build(job.read_points()?, job.partition_size())?;
        log::debug!("KD tree over {} points has {} leaves", tree.num_points(), tree.leaves().len());
        job.write_ids(&tree.partition_ids()?)
    }
}
