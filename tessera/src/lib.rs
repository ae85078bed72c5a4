pub use tessera_partition::*;
pub use {
    tessera_curve as curve, tessera_error as error, tessera_io as io, tessera_sort as sort,
};

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::error::TesseraUnwrap;
    use crate::io::fixtures::TableGenerator;
    use crate::io::{DataReader, Settings};
    use crate::{PartitioningScheme, create_partitioner};

    #[test]
    fn partitions_through_the_facade() {
        let dir = tempdir().tessera_unwrap();
        let source = dir.path().join("cities.parquet");
        let settings = Settings::default();
        TableGenerator::write(&TableGenerator::cities().tessera_unwrap(), &source, &settings)
            .tessera_unwrap();

        let reader = DataReader::try_new(&source, &settings).tessera_unwrap();
        let mut partitioner = create_partitioner(
            PartitioningScheme::KdTree.name(),
            reader,
            &["x", "y"],
            2,
            dir.path().join("kd-tree"),
        )
        .tessera_unwrap();
        let summary = partitioner.run().tessera_unwrap();
        assert_eq!(summary.rows, 8);
        assert_eq!(summary.partitions, 4);
    }
}
