//! The partitioning contract and its implementations.

use std::fmt::{Debug, Display};
use std::path::{Path, PathBuf};

pub use curve::*;
pub use fixed_grid::*;
pub use grid_file::*;
pub use kd_tree::*;
pub use no_partition::*;
pub use quad_tree::*;
pub use str_tree::*;
use tessera_error::{TesseraResult, tessera_bail, tessera_err};
use tessera_io::{ColumnKind, DataReader, DataWriter, Settings, columns_to_f64};
pub use working_dir::*;

use crate::{Domain, PartitioningScheme, Point, skewness_order, to_points};

mod curve;
mod fixed_grid;
mod grid_file;
mod kd_tree;
mod no_partition;
mod quad_tree;
mod str_tree;
mod working_dir;

/// Fewest partitioning columns any strategy accepts.
pub const MIN_PARTITION_COLUMNS: usize = 2;

/// What a finished partitioning run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSummary {
    /// Number of partition files written.
    pub partitions: usize,
    /// Rows across all partition files.
    pub rows: usize,
}

/// A way of grouping the rows of a dataset into partition files on a set of columns.
pub trait Partitioning: Debug {
    fn scheme(&self) -> PartitioningScheme;

    /// Computes and writes the partitions of a request that has been validated and holds more
    /// than `partition_size` rows.
    fn partition_rows(&self, job: &mut PartitionJob<'_>) -> TesseraResult<PartitionSummary>;

    /// Partitions the file behind `reader` on `columns` into files of about `partition_size`
    /// rows, written as `<id>.<ext>` directly under `output`.
    ///
    /// Fails before any I/O when fewer than two columns are given, a column is missing or
    /// cannot be partitioned on, or `partition_size` is zero. When `partition_size` covers the
    /// whole file, the file is copied unchanged as partition 0.
    fn partition(
        &self,
        reader: &mut DataReader,
        columns: &[String],
        partition_size: usize,
        output: &Path,
    ) -> TesseraResult<PartitionSummary> {
        validate(reader, columns, partition_size)?;
        let scheme = self.scheme();
        log::info!(
            "Partitioning {} with {scheme} on [{}], {partition_size} rows per partition",
            reader.path().display(),
            columns.join(", ")
        );

        let mut job = PartitionJob {
            reader,
            columns,
            partition_size,
            output,
        };
        let num_rows = job.num_rows();
        let summary = if partition_size >= num_rows {
            log::debug!("{num_rows} rows fit in one partition, copying the source");
            job.copy_source()?
        } else {
            self.partition_rows(&mut job)?
        };

        if summary.rows != num_rows {
            tessera_bail!(
                "{scheme} wrote {} rows but the source holds {num_rows}",
                summary.rows
            );
        }
        log::info!(
            "{scheme} wrote {} partitions to {}",
            summary.partitions,
            output.display()
        );
        Ok(summary)
    }
}

/// Checks a request in the order its failures are reported.
pub fn validate(reader: &DataReader, columns: &[String], partition_size: usize) -> TesseraResult<()> {
    if columns.len() < MIN_PARTITION_COLUMNS {
        tessera_bail!(InsufficientNumberOfColumns: columns.len(), MIN_PARTITION_COLUMNS);
    }
    for column in columns {
        let index = reader.column_index(column).ok_or_else(|| {
            tessera_err!(InvalidColumn: "{column} is not a column of {}", reader.path().display())
        })?;
        let data_type = reader.schema().field(index).data_type();
        if !ColumnKind::of(data_type).is_supported() {
            tessera_bail!(InvalidColumn: "cannot partition on {column} of type {data_type}");
        }
    }
    if partition_size == 0 {
        tessera_bail!(InvalidPartitionSize: partition_size);
    }
    Ok(())
}

/// A validated partitioning request, handed to [`Partitioning::partition_rows`].
pub struct PartitionJob<'a> {
    reader: &'a mut DataReader,
    columns: &'a [String],
    partition_size: usize,
    output: &'a Path,
}

impl PartitionJob<'_> {
    pub fn reader(&self) -> &DataReader {
        self.reader
    }

    pub fn reader_mut(&mut self) -> &mut DataReader {
        &mut *self.reader
    }

    pub fn columns(&self) -> &[String] {
        self.columns
    }

    pub fn dimensions(&self) -> usize {
        self.columns.len()
    }

    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    pub fn output(&self) -> &Path {
        self.output
    }

    pub fn settings(&self) -> &Settings {
        self.reader.settings()
    }

    pub fn num_rows(&self) -> usize {
        self.reader.num_rows()
    }

    pub fn writer(&self) -> DataWriter {
        DataWriter::new(self.settings())
    }

    /// Final path of partition `id`.
    pub fn partition_path(&self, id: impl Display) -> PathBuf {
        self.output.join(self.settings().partition_file_name(id))
    }

    pub fn domain(&self) -> TesseraResult<Domain> {
        Domain::from_reader(self.reader, self.columns)
    }

    /// Every row of the file as a point on the partitioning columns.
    pub fn read_points(&self) -> TesseraResult<Vec<Point>> {
        to_points(&self.reader.read_columns(self.columns)?)
    }

    /// The order in which split-based strategies visit the partitioning columns.
    ///
    /// Declared column order, unless [`Settings::order_by_skewness`] asks for the most skewed
    /// columns first, as estimated on the first batch.
    pub fn dimension_order(&mut self) -> TesseraResult<Vec<usize>> {
        if !self.settings().order_by_skewness() {
            return Ok((0..self.dimensions()).collect());
        }
        self.reader.rewind();
        let first = self.reader.next_batch()?;
        self.reader.rewind();
        let Some(batch) = first else {
            return Ok((0..self.dimensions()).collect());
        };
        let order = skewness_order(&columns_to_f64(&batch, self.columns)?);
        log::debug!(
            "Column order by skewness: {}",
            order.iter().map(|d| self.columns[*d].as_str()).collect::<Vec<_>>().join(", ")
        );
        Ok(order)
    }

    /// Copies the source as the single partition 0, replacing any previous file.
    pub fn copy_source(&self) -> TesseraResult<PartitionSummary> {
        self.writer()
            .copy_file(self.reader.path(), self.partition_path(0))?;
        Ok(PartitionSummary {
            partitions: 1,
            rows: self.num_rows(),
        })
    }

    /// Writes every row of the file to the partition named by its entry in `ids`.
    pub fn write_ids(&self, ids: &[u32]) -> TesseraResult<PartitionSummary> {
        let table = self.reader.read_full_table()?;
        let counts = self
            .writer()
            .write_partitions(&table, ids, |id| self.partition_path(id))?;
        let summary = PartitionSummary {
            partitions: counts.len(),
            rows: counts.values().sum(),
        };
        if summary.rows != table.num_rows() {
            tessera_bail!(
                "partitions hold {} rows, the table {}",
                summary.rows,
                table.num_rows()
            );
        }
        Ok(summary)
    }

    pub fn working_dir(&self, scheme: PartitioningScheme) -> TesseraResult<WorkingDir> {
        WorkingDir::create(self.output, scheme)
    }
}
