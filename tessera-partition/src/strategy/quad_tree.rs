use tessera_error::TesseraResult;

use crate::{PartitionJob, PartitionSummary, Partitioning, PartitioningScheme, QuadTree};

/// Partitions on the leaves of a [`QuadTree`] built over every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadTreePartitioning;

impl Partitioning for QuadTreePartitioning {
    fn scheme(&self) -> PartitioningScheme {
        PartitioningScheme::QuadTree
    }

    fn partition_rows(&self, job: &mut PartitionJob<'_>) -> TesseraResult<PartitionSummary> {
        let tree = QuadTree::build(job.read_points()?, job.partition_size())?;
        let ids = tree.partition_ids()?;
        job.write_ids(&ids)
    }
}
