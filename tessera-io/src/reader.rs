use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::{DataType, SchemaRef};
use arrow_select::concat::concat_batches;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::file::metadata::ParquetMetaData;
use parquet::file::statistics::Statistics;
use tessera_error::{TesseraError, TesseraResult, tessera_err};

use crate::{Settings, column_to_f64};

/// Streaming reader over a single Parquet file.
///
/// Metadata is read once when the file is opened. Batches are decoded lazily by
/// [`DataReader::next_batch`]; whole-file helpers open their own independent stream and never
/// disturb the position of the batch cursor.
pub struct DataReader {
    path: PathBuf,
    settings: Settings,
    metadata: Arc<ParquetMetaData>,
    schema: SchemaRef,
    batches: Option<ParquetRecordBatchReader>,
}

impl DataReader {
    pub fn try_new(path: impl AsRef<Path>, settings: &Settings) -> TesseraResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            TesseraError::from(e).with_context(format!("opening {}", path.display()))
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let metadata = builder.metadata().clone();
        let schema = builder.schema().clone();
        log::debug!(
            "Opened {} with {} rows in {} row groups",
            path.display(),
            metadata.file_metadata().num_rows(),
            metadata.num_row_groups()
        );
        Ok(Self {
            path,
            settings: settings.clone(),
            metadata,
            schema,
            batches: None,
        })
    }

    /// Points this reader at another file, keeping its settings.
    pub fn load(&mut self, path: impl AsRef<Path>) -> TesseraResult<()> {
        *self = Self::try_new(path, &self.settings)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        usize::try_from(self.metadata.file_metadata().num_rows()).unwrap_or_default()
    }

    /// Number of batches a full pass of [`DataReader::next_batch`] yields.
    pub fn num_batches(&self) -> usize {
        self.num_rows().div_ceil(self.settings.batch_size())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name).ok()
    }

    fn require_column(&self, name: &str) -> TesseraResult<usize> {
        self.column_index(name).ok_or_else(|| {
            tessera_err!(InvalidColumn: "{name} is not a column of {}", self.path.display())
        })
    }

    /// Returns the next batch of the file, or `None` once the file is exhausted.
    pub fn next_batch(&mut self) -> TesseraResult<Option<RecordBatch>> {
        if self.batches.is_none() {
            self.batches = Some(self.open_stream(None)?);
        }
        let Some(batches) = self.batches.as_mut() else {
            return Ok(None);
        };
        Ok(batches.next().transpose()?)
    }

    /// Restarts [`DataReader::next_batch`] from the first row.
    pub fn rewind(&mut self) {
        self.batches = None;
    }

    /// Opens an independent batch stream, optionally restricted to the given root columns.
    pub fn open_stream(&self, projection: Option<&[usize]>) -> TesseraResult<ParquetRecordBatchReader> {
        let mut builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&self.path)?)?
            .with_batch_size(self.settings.batch_size());
        if let Some(indices) = projection {
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices.iter().copied());
            builder = builder.with_projection(mask);
        }
        Ok(builder.build()?)
    }

    /// Materializes the whole file as a single batch.
    pub fn read_full_table(&self) -> TesseraResult<RecordBatch> {
        let batches = self
            .open_stream(None)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(concat_batches(&self.schema, &batches)?)
    }

    /// Reads the named columns of the whole file as `f64` coordinates, one vector per column.
    pub fn read_columns<S: AsRef<str>>(&self, names: &[S]) -> TesseraResult<Vec<Vec<f64>>> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name.as_ref()))
            .collect::<TesseraResult<Vec<_>>>()?;
        let mut columns: Vec<Vec<f64>> = (0..names.len())
            .map(|_| Vec::with_capacity(self.num_rows()))
            .collect();
        for batch in self.open_stream(Some(&indices))? {
            let batch = batch?;
            for (values, name) in columns.iter_mut().zip(names) {
                let column = batch.column_by_name(name.as_ref()).ok_or_else(|| {
                    tessera_err!(InvalidColumn: "{} missing from projected batch", name.as_ref())
                })?;
                values.extend(column_to_f64(column.as_ref())?);
            }
        }
        Ok(columns)
    }

    /// Minimum and maximum of a column, in the same `f64` domain [`column_to_f64`] produces.
    ///
    /// Row group statistics are used when every row group carries exact bounds for a plainly
    /// encoded numeric or date column; otherwise the column is scanned batch by batch.
    /// Nulls count as `0.0`, so a column holding nulls always spans zero.
    /// An empty file reports `(0.0, 0.0)`.
    pub fn column_stats(&self, name: &str) -> TesseraResult<(f64, f64)> {
        let index = self.require_column(name)?;
        if let Some(bounds) = self.stats_from_metadata(index) {
            return Ok(bounds);
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for batch in self.open_stream(Some(&[index]))? {
            let batch = batch?;
            for value in column_to_f64(batch.column(0).as_ref())? {
                min = min.min(value);
                max = max.max(value);
            }
        }
        if min > max {
            return Ok((0.0, 0.0));
        }
        Ok((min, max))
    }

    fn stats_from_metadata(&self, index: usize) -> Option<(f64, f64)> {
        let field = self.schema.field(index);
        if !matches!(
            field.data_type(),
            DataType::Int32 | DataType::Int64 | DataType::Float32 | DataType::Float64 | DataType::Date32
        ) {
            return None;
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for row_group in self.metadata.row_groups() {
            let chunk = row_group.columns().iter().find(|c| {
                let parts = c.column_path().parts();
                parts.len() == 1 && parts[0] == *field.name()
            })?;
            let stats = chunk.statistics()?;
            if !stats.min_is_exact() || !stats.max_is_exact() {
                return None;
            }
            match stats.null_count_opt() {
                Some(0) => {}
                Some(_) => {
                    min = min.min(0.0);
                    max = max.max(0.0);
                }
                None if field.is_nullable() => return None,
                None => {}
            }
            let (lo, hi) = match stats {
                Statistics::Int32(s) => (f64::from(*s.min_opt()?), f64::from(*s.max_opt()?)),
                Statistics::Int64(s) => (*s.min_opt()? as f64, *s.max_opt()? as f64),
                Statistics::Float(s) => (f64::from(*s.min_opt()?), f64::from(*s.max_opt()?)),
                Statistics::Double(s) => (*s.min_opt()?, *s.max_opt()?),
                _ => return None,
            };
            min = min.min(lo);
            max = max.max(hi);
        }
        (min <= max).then_some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::cast::AsArray;
    use arrow_array::types::Int32Type;
    use arrow_array::{ArrayRef, Int16Array, Int32Array, RecordBatch};
    use rstest::rstest;
    use tempfile::tempdir;
    use tessera_error::{TesseraError, TesseraUnwrap};

    use crate::fixtures::TableGenerator;
    use crate::{DataReader, DataWriter, Settings};

    fn school_reader(batch_size: usize) -> (tempfile::TempDir, DataReader) {
        let dir = tempdir().tessera_unwrap();
        let settings = Settings::default().with_batch_size(batch_size);
        let path = dir.path().join("school.parquet");
        DataWriter::new(&settings)
            .write_table(&TableGenerator::school().tessera_unwrap(), &path)
            .tessera_unwrap();
        let reader = DataReader::try_new(&path, &settings).tessera_unwrap();
        (dir, reader)
    }

    #[rstest]
    #[case(3, 3)]
    #[case(8, 1)]
    #[case(100, 1)]
    fn streams_batches(#[case] batch_size: usize, #[case] expected_batches: usize) {
        let (_dir, mut reader) = school_reader(batch_size);
        assert_eq!(reader.num_rows(), 8);
        assert_eq!(reader.num_batches(), expected_batches);

        let mut rows = 0;
        let mut batches = 0;
        while let Some(batch) = reader.next_batch().tessera_unwrap() {
            rows += batch.num_rows();
            batches += 1;
        }
        assert_eq!((rows, batches), (8, expected_batches));
        assert!(reader.next_batch().tessera_unwrap().is_none());

        reader.rewind();
        assert!(reader.next_batch().tessera_unwrap().is_some());
    }

    #[test]
    fn reads_whole_table_and_columns() {
        let (_dir, reader) = school_reader(3);
        let table = reader.read_full_table().tessera_unwrap();
        assert_eq!(table.num_rows(), 8);
        assert_eq!(
            table.column(0).as_primitive::<Int32Type>().values().to_vec(),
            vec![16, 45, 21, 7, 74, 34, 111, 91]
        );

        let columns = reader.read_columns(&["Age", "Student_id"]).tessera_unwrap();
        assert_eq!(columns[0], vec![30.0, 21.0, 18.0, 27.0, 41.0, 37.0, 23.0, 22.0]);
        assert_eq!(columns[1][6], 111.0);
    }

    #[rstest]
    #[case("Student_id", (7.0, 111.0))]
    #[case("Age", (18.0, 41.0))]
    fn column_statistics(#[case] name: &str, #[case] expected: (f64, f64)) {
        let (_dir, reader) = school_reader(3);
        assert_eq!(reader.column_stats(name).tessera_unwrap(), expected);
        assert!(reader.column_index(name).is_some());
    }

    #[rstest]
    #[case(Arc::new(Int32Array::from(vec![Some(5), None, Some(9)])) as ArrayRef, (0.0, 9.0))]
    #[case(Arc::new(Int32Array::from(vec![Some(-5), None, Some(-2)])) as ArrayRef, (-5.0, 0.0))]
    #[case(Arc::new(Int16Array::from(vec![Some(5), None, Some(9)])) as ArrayRef, (0.0, 9.0))]
    #[case(Arc::new(Int32Array::from(vec![None, None, Some(3)])) as ArrayRef, (0.0, 3.0))]
    #[case(Arc::new(Int32Array::from(vec![Some(4), Some(6), Some(8)])) as ArrayRef, (4.0, 8.0))]
    fn nulls_widen_statistics_to_zero(
        #[case] values: ArrayRef,
        #[case] expected: (f64, f64),
        #[values(1, 3)] row_group_size: usize,
    ) {
        let dir = tempdir().tessera_unwrap();
        let settings = Settings::default().with_row_group_size(row_group_size);
        let path = dir.path().join("nulls.parquet");
        let table = RecordBatch::try_from_iter(vec![("v", values)]).tessera_unwrap();
        DataWriter::new(&settings).write_table(&table, &path).tessera_unwrap();
        let reader = DataReader::try_new(&path, &settings).tessera_unwrap();

        assert_eq!(reader.column_stats("v").tessera_unwrap(), expected);
        let values = reader.read_columns(&["v"]).tessera_unwrap();
        assert!(values[0].iter().all(|v| (expected.0..=expected.1).contains(v)));
    }

    #[test]
    fn unknown_column() {
        let (_dir, reader) = school_reader(3);
        assert!(reader.column_index("Grade").is_none());
        assert!(matches!(
            reader.column_stats("Grade"),
            Err(TesseraError::InvalidColumn(..))
        ));
    }

    #[test]
    fn load_switches_files() {
        let (dir, mut reader) = school_reader(3);
        let cities = dir.path().join("cities.parquet");
        DataWriter::new(reader.settings())
            .write_table(&TableGenerator::cities().tessera_unwrap(), &cities)
            .tessera_unwrap();
        reader.load(&cities).tessera_unwrap();
        assert_eq!(reader.path(), cities.as_path());
        assert_eq!(reader.column_stats("x").tessera_unwrap(), (5.0, 90.0));
    }
}
