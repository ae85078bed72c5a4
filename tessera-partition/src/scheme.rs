use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tessera_error::{TesseraError, TesseraResult, tessera_err};
use tessera_io::DataReader;

use crate::{
    FixedGridPartitioning, GridFilePartitioning, HilbertCurvePartitioning, KdTreePartitioning,
    NoPartitioning, PartitionSummary, Partitioning, QuadTreePartitioning, StrTreePartitioning,
    ZOrderCurvePartitioning,
};

/// Identifies a partitioning strategy by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitioningScheme {
    NoPartition,
    FixedGrid,
    GridFile,
    KdTree,
    StrTree,
    QuadTree,
    HilbertCurve,
    ZOrderCurve,
}

impl PartitioningScheme {
    pub const ALL: [PartitioningScheme; 8] = [
        PartitioningScheme::NoPartition,
        PartitioningScheme::FixedGrid,
        PartitioningScheme::GridFile,
        PartitioningScheme::KdTree,
        PartitioningScheme::StrTree,
        PartitioningScheme::QuadTree,
        PartitioningScheme::HilbertCurve,
        PartitioningScheme::ZOrderCurve,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PartitioningScheme::NoPartition => "no-partition",
            PartitioningScheme::FixedGrid => "fixed-grid",
            PartitioningScheme::GridFile => "grid-file",
            PartitioningScheme::KdTree => "kd-tree",
            PartitioningScheme::StrTree => "str-tree",
            PartitioningScheme::QuadTree => "quad-tree",
            PartitioningScheme::HilbertCurve => "hilbert-curve",
            PartitioningScheme::ZOrderCurve => "z-order-curve",
        }
    }

    /// Whether partitions carry their id in a `partition_id` column. Other schemes only name
    /// their files after the id.
    pub fn writes_partition_id(&self) -> bool {
        !matches!(
            self,
            PartitioningScheme::NoPartition | PartitioningScheme::GridFile | PartitioningScheme::StrTree
        )
    }

    /// Builds the strategy for partitioning on `dimensions` columns.
    pub fn strategy(&self, dimensions: usize) -> TesseraResult<Box<dyn Partitioning>> {
        Ok(match self {
            PartitioningScheme::NoPartition => Box::new(NoPartitioning),
            PartitioningScheme::FixedGrid => Box::new(FixedGridPartitioning),
            PartitioningScheme::GridFile => Box::new(GridFilePartitioning),
            PartitioningScheme::KdTree => Box::new(KdTreePartitioning),
            PartitioningScheme::StrTree => Box::new(StrTreePartitioning),
            PartitioningScheme::QuadTree => Box::new(QuadTreePartitioning),
            PartitioningScheme::HilbertCurve => Box::new(HilbertCurvePartitioning),
            PartitioningScheme::ZOrderCurve => Box::new(ZOrderCurvePartitioning::try_new(dimensions)?),
        })
    }
}

impl Display for PartitioningScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PartitioningScheme {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartitioningScheme::ALL
            .into_iter()
            .find(|scheme| scheme.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| tessera_err!(UnknownScheme: "{s}"))
    }
}

/// A strategy bound to its input, columns, partition size and output folder.
pub struct Partitioner {
    strategy: Box<dyn Partitioning>,
    reader: DataReader,
    columns: Vec<String>,
    partition_size: usize,
    output: PathBuf,
}

impl Debug for Partitioner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partitioner")
            .field("strategy", &self.strategy)
            .field("source", &self.reader.path())
            .field("columns", &self.columns)
            .field("partition_size", &self.partition_size)
            .field("output", &self.output)
            .finish()
    }
}

impl Partitioner {
    pub fn scheme(&self) -> PartitioningScheme {
        self.strategy.scheme()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn run(&mut self) -> TesseraResult<PartitionSummary> {
        self.strategy.partition(
            &mut self.reader,
            &self.columns,
            self.partition_size,
            &self.output,
        )
    }
}

/// Builds the partitioner named by `scheme`. Unknown names fail here rather than when run.
pub fn create_partitioner<S: AsRef<str>>(
    scheme: &str,
    reader: DataReader,
    columns: &[S],
    partition_size: usize,
    output: impl Into<PathBuf>,
) -> TesseraResult<Partitioner> {
    let scheme: PartitioningScheme = scheme.parse()?;
    let columns = columns.iter().map(|c| c.as_ref().to_string()).collect::<Vec<_>>();
    Ok(Partitioner {
        strategy: scheme.strategy(columns.len())?,
        reader,
        columns,
        partition_size,
        output: output.into(),
    })
}
