use tessera_error::TesseraResult;

use crate::{PartitionJob, PartitionSummary, Partitioning, PartitioningScheme};

/// Writes the source unchanged as the single partition 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPartitioning;

impl Partitioning for NoPartitioning {
    fn scheme(&self) -> PartitioningScheme {
        PartitioningScheme::NoPartition
    }

    fn partition_rows(&self, job: &mut PartitionJob<'_>) -> TesseraResult<PartitionSummary> {
        job.copy_source()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tessera_error::TesseraUnwrap;
    use tessera_io::Settings;

    use crate::strategy::test_harness::Fixture;
    use crate::{NoPartitioning, PartitionSummary};

    #[test]
    fn copies_the_source() {
        let fixture = Fixture::new("cities", Settings::default());
        let summary = fixture.run(&NoPartitioning, &["x", "y"], 1).tessera_unwrap();
        assert_eq!(summary, PartitionSummary { partitions: 1, rows: 8 });
        assert_eq!(fixture.output_entries(), vec!["0.parquet"]);
        assert_eq!(
            fs::read(&fixture.partitions()[0]).tessera_unwrap(),
            fs::read(&fixture.source).tessera_unwrap()
        );
    }
}
