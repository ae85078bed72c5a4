use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch, UInt32Array, UInt64Array};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use arrow_select::take::take_record_batch;
use parquet::arrow::ArrowWriter;
use tessera_error::{TesseraResult, tessera_bail};

use crate::{DataReader, PARTITION_ID_COLUMN, Settings};

/// Path a file is written to before it is renamed to `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

fn ensure_parent(path: &Path) -> TesseraResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Writes Parquet files configured by [`Settings`].
#[derive(Debug, Clone)]
pub struct DataWriter {
    settings: Settings,
}

impl DataWriter {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Starts a file at `path`. Nothing is visible at `path` until [`PartitionFileWriter::finish`].
    pub fn open(&self, path: impl AsRef<Path>, schema: SchemaRef) -> TesseraResult<PartitionFileWriter> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;
        let temp = temp_path(&path);
        let writer = ArrowWriter::try_new(
            File::create(&temp)?,
            schema,
            Some(self.settings.writer_properties()),
        )?;
        Ok(PartitionFileWriter {
            writer,
            temp,
            path,
            rows: 0,
        })
    }

    /// Writes a whole table to `path`, returning the number of rows written.
    pub fn write_table(&self, table: &RecordBatch, path: impl AsRef<Path>) -> TesseraResult<usize> {
        let mut writer = self.open(path, table.schema())?;
        writer.write(table)?;
        writer.finish()
    }

    /// Groups the rows of `batch` by `ids` and writes each group to `path_for(id)`, keeping the
    /// original row order inside every group. When [`Settings::add_partition_id`] is set the
    /// written files carry the id in a [`PARTITION_ID_COLUMN`] column.
    ///
    /// Returns the number of rows written per id.
    pub fn write_partitions(
        &self,
        batch: &RecordBatch,
        ids: &[u32],
        path_for: impl Fn(u32) -> PathBuf,
    ) -> TesseraResult<BTreeMap<u32, usize>> {
        if ids.len() != batch.num_rows() {
            tessera_bail!(
                "got {} partition ids for a batch of {} rows",
                ids.len(),
                batch.num_rows()
            );
        }

        let mut groups: BTreeMap<u32, Vec<u64>> = BTreeMap::new();
        for (row, id) in ids.iter().enumerate() {
            groups.entry(*id).or_default().push(row as u64);
        }

        let source = if self.settings.add_partition_id() {
            with_partition_id(batch, UInt32Array::from(ids.to_vec()))?
        } else {
            batch.clone()
        };

        let mut counts = BTreeMap::new();
        for (id, rows) in groups {
            let partition = take_record_batch(&source, &UInt64Array::from(rows))?;
            counts.insert(id, self.write_table(&partition, path_for(id))?);
        }
        Ok(counts)
    }

    /// Concatenates `inputs` into `output` batch by batch. The inputs are left in place.
    pub fn merge_into(&self, inputs: &[PathBuf], output: impl AsRef<Path>) -> TesseraResult<usize> {
        let Some(first) = inputs.first() else {
            tessera_bail!("no files to merge into {}", output.as_ref().display());
        };
        let schema = DataReader::try_new(first, &self.settings)?.schema().clone();
        let mut writer = self.open(output, schema)?;
        for input in inputs {
            let mut reader = DataReader::try_new(input, &self.settings)?;
            while let Some(batch) = reader.next_batch()? {
                writer.write(&batch)?;
            }
        }
        writer.finish()
    }

    /// Copies `source` to `destination`, replacing any existing file there.
    pub fn copy_file(&self, source: impl AsRef<Path>, destination: impl AsRef<Path>) -> TesseraResult<u64> {
        let destination = destination.as_ref();
        ensure_parent(destination)?;
        let temp = temp_path(destination);
        let bytes = fs::copy(source, &temp)?;
        fs::rename(&temp, destination)?;
        Ok(bytes)
    }
}

/// A Parquet file being written. Dropping it without calling [`PartitionFileWriter::finish`]
/// leaves only the temporary file behind.
pub struct PartitionFileWriter {
    writer: ArrowWriter<File>,
    temp: PathBuf,
    path: PathBuf,
    rows: usize,
}

impl PartitionFileWriter {
    pub fn write(&mut self, batch: &RecordBatch) -> TesseraResult<()> {
        self.writer.write(batch)?;
        self.rows += batch.num_rows();
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the file and moves it to its final path, returning the number of rows written.
    pub fn finish(self) -> TesseraResult<usize> {
        self.writer.close()?;
        fs::rename(&self.temp, &self.path)?;
        log::trace!("Wrote {} rows to {}", self.rows, self.path.display());
        Ok(self.rows)
    }
}

/// Returns `batch` with a non-nullable `UInt32` [`PARTITION_ID_COLUMN`] holding `ids`. An
/// existing column of that name is replaced.
pub fn with_partition_id(batch: &RecordBatch, ids: UInt32Array) -> TesseraResult<RecordBatch> {
    let schema = batch.schema();
    let field = Arc::new(Field::new(PARTITION_ID_COLUMN, DataType::UInt32, false));
    let ids: ArrayRef = Arc::new(ids);

    let mut fields = schema.fields().iter().cloned().collect::<Vec<_>>();
    let mut columns = batch.columns().to_vec();
    match schema.index_of(PARTITION_ID_COLUMN) {
        Ok(index) => {
            fields[index] = field;
            columns[index] = ids;
        }
        Err(_) => {
            fields.push(field);
            columns.push(ids);
        }
    }

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}
