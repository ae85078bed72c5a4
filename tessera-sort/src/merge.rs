use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs;
use std::path::{Path, PathBuf};

use arrow_array::{Array, RecordBatch};
use arrow_schema::SchemaRef;
use arrow_select::interleave::interleave;
use regex::Regex;
use tessera_error::{TesseraResult, tessera_bail, tessera_err};
use tessera_io::{DataReader, DataWriter, PartitionFileWriter, Settings};

use crate::{RUN_PREFIX, sort_keys};

/// Sorted runs in `folder`, ordered by their numeric run id.
pub fn sorted_runs(folder: &Path, settings: &Settings) -> TesseraResult<Vec<PathBuf>> {
    let pattern = Regex::new(&format!(
        r"^{RUN_PREFIX}(\d+)\.{}$",
        regex::escape(settings.file_extension())
    ))
    .map_err(|e| tessera_err!("invalid run pattern: {e}"))?;

    let mut runs = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(captures) = pattern.captures(name) else {
            continue;
        };
        let id: u64 = captures[1]
            .parse()
            .map_err(|e| tessera_err!("invalid run file name {name}: {e}"))?;
        runs.push((id, path));
    }
    runs.sort();
    Ok(runs.into_iter().map(|(_, path)| path).collect())
}

/// K-way merges every sorted run in `folder` on `column` into files `0.<ext>`, `1.<ext>`, ...
/// of `target_slice_size` rows each, the last one possibly smaller.
///
/// Rows with equal keys are emitted in run order, then in their order within the run. The runs
/// are deleted once every output file has been written. Returns the output files in order.
pub fn merge_files(
    folder: &Path,
    column: &str,
    target_slice_size: usize,
    settings: &Settings,
) -> TesseraResult<Vec<PathBuf>> {
    if target_slice_size == 0 {
        tessera_bail!("merge slice size must be at least 1");
    }

    let run_paths = sorted_runs(folder, settings)?;
    let mut runs = Vec::with_capacity(run_paths.len());
    let mut schema: Option<SchemaRef> = None;
    let mut input_rows = 0;
    for path in &run_paths {
        let reader = DataReader::try_new(path, settings)?;
        input_rows += reader.num_rows();
        schema.get_or_insert_with(|| reader.schema().clone());
        if let Some(run) = Run::open(reader, column)? {
            runs.push(run);
        }
    }

    let mut heap = runs
        .iter()
        .enumerate()
        .map(|(index, run)| Reverse(Head::new(run.key(), index)))
        .collect::<BinaryHeap<_>>();

    let writer = DataWriter::new(settings);
    let mut outputs = Vec::new();
    if let Some(schema) = schema {
        let mut sink = SliceSink {
            writer: &writer,
            folder,
            schema,
            target: target_slice_size,
            current: None,
            outputs: Vec::new(),
        };
        let mut pinned: Vec<RecordBatch> = Vec::new();
        let mut pending: Vec<(usize, usize)> = Vec::new();

        while let Some(Reverse(head)) = heap.pop() {
            let run = &mut runs[head.run];
            let slot = run.pin(&mut pinned);
            pending.push((slot, run.position));
            if run.advance(column)? {
                heap.push(Reverse(Head::new(run.key(), head.run)));
            }

            if pending.len() >= settings.batch_size().min(sink.remaining()) {
                sink.write(&interleave_rows(&sink.schema, &pinned, &pending)?)?;
                pending.clear();
                pinned.clear();
                runs.iter_mut().for_each(|r| r.slot = None);
            }
        }
        if !pending.is_empty() {
            sink.write(&interleave_rows(&sink.schema, &pinned, &pending)?)?;
        }
        outputs = sink.finish()?;
    }

    for path in &run_paths {
        fs::remove_file(path)?;
    }
    log::debug!(
        "Merged {} runs with {input_rows} rows on {column} into {} files in {}",
        run_paths.len(),
        outputs.len(),
        folder.display()
    );
    Ok(outputs)
}

/// Smallest unconsumed key of a run.
#[derive(Debug, Clone, Copy)]
struct Head {
    key: f64,
    run: usize,
}

impl Head {
    fn new(key: f64, run: usize) -> Self {
        Self { key, run }
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.run.cmp(&other.run))
    }
}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head {}

/// Read cursor over one sorted run.
struct Run {
    reader: DataReader,
    batch: RecordBatch,
    keys: Vec<f64>,
    position: usize,
    /// Index of `batch` in the merge's pinned batches, if it has been pinned since the last flush.
    slot: Option<usize>,
}

impl Run {
    /// Positions a cursor on the first row of the run. Empty runs yield `None`.
    fn open(mut reader: DataReader, column: &str) -> TesseraResult<Option<Self>> {
        while let Some(batch) = reader.next_batch()? {
            if batch.num_rows() > 0 {
                let keys = sort_keys(&batch, column)?;
                return Ok(Some(Self {
                    reader,
                    batch,
                    keys,
                    position: 0,
                    slot: None,
                }));
            }
        }
        Ok(None)
    }

    fn key(&self) -> f64 {
        self.keys[self.position]
    }

    fn pin(&mut self, pinned: &mut Vec<RecordBatch>) -> usize {
        match self.slot {
            Some(slot) => slot,
            None => {
                pinned.push(self.batch.clone());
                let slot = pinned.len() - 1;
                self.slot = Some(slot);
                slot
            }
        }
    }

    /// Moves past the current row, loading the next batch when needed. Returns false once the
    /// run is exhausted.
    fn advance(&mut self, column: &str) -> TesseraResult<bool> {
        self.position += 1;
        if self.position < self.keys.len() {
            return Ok(true);
        }
        while let Some(batch) = self.reader.next_batch()? {
            if batch.num_rows() > 0 {
                self.keys = sort_keys(&batch, column)?;
                self.batch = batch;
                self.position = 0;
                self.slot = None;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn interleave_rows(
    schema: &SchemaRef,
    pinned: &[RecordBatch],
    rows: &[(usize, usize)],
) -> TesseraResult<RecordBatch> {
    let columns = (0..schema.fields().len())
        .map(|index| {
            let arrays: Vec<&dyn Array> = pinned.iter().map(|b| b.column(index).as_ref()).collect();
            interleave(&arrays, rows)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

/// Splits the merged stream into consecutive files of `target` rows.
struct SliceSink<'a> {
    writer: &'a DataWriter,
    folder: &'a Path,
    schema: SchemaRef,
    target: usize,
    current: Option<PartitionFileWriter>,
    outputs: Vec<PathBuf>,
}

impl SliceSink<'_> {
    /// Rows that still fit in the slice being written.
    fn remaining(&self) -> usize {
        self.target - self.current.as_ref().map_or(0, PartitionFileWriter::rows)
    }

    /// Appends a chunk that never spans two slices.
    fn write(&mut self, chunk: &RecordBatch) -> TesseraResult<()> {
        if self.current.is_none() {
            let name = self
                .writer
                .settings()
                .partition_file_name(self.outputs.len());
            let path = self.folder.join(name);
            self.current = Some(self.writer.open(&path, self.schema.clone())?);
            self.outputs.push(path);
        }
        if let Some(current) = self.current.as_mut() {
            current.write(chunk)?;
            if current.rows() < self.target {
                return Ok(());
            }
        }
        if let Some(done) = self.current.take() {
            done.finish()?;
        }
        Ok(())
    }

    fn finish(mut self) -> TesseraResult<Vec<PathBuf>> {
        if let Some(current) = self.current.take() {
            current.finish()?;
        }
        Ok(self.outputs)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use arrow_array::cast::AsArray;
    use arrow_array::types::Int32Type;
    use arrow_array::{ArrayRef, Int32Array, RecordBatch};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;
    use tempfile::tempdir;
    use tessera_error::TesseraUnwrap;
    use tessera_io::fixtures::TableGenerator;
    use tessera_io::{DataReader, DataWriter, Settings};

    use crate::{merge_files, sorted_runs, write_sorted};

    fn read_ints(path: &Path, column: &str, settings: &Settings) -> Vec<i32> {
        let table = DataReader::try_new(path, settings)
            .tessera_unwrap()
            .read_full_table()
            .tessera_unwrap();
        table
            .column_by_name(column)
            .map(|c| c.as_primitive::<Int32Type>().values().to_vec())
            .unwrap_or_default()
    }

    fn read_strings(path: &Path, column: &str, settings: &Settings) -> Vec<String> {
        let table = DataReader::try_new(path, settings)
            .tessera_unwrap()
            .read_full_table()
            .tessera_unwrap();
        table
            .column_by_name(column)
            .map(|c| {
                c.as_string::<i32>()
                    .iter()
                    .map(|s| s.unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[rstest]
    #[case(2, 2, vec![vec![5, 27], vec![35, 52], vec![62, 82], vec![85, 90]])]
    #[case(3, 3, vec![vec![5, 27, 35], vec![52, 62, 82], vec![85, 90]])]
    #[case(3, 8, vec![vec![5, 27, 35, 52, 62, 82, 85, 90]])]
    #[case(1, 5, vec![vec![5, 27, 35, 52, 62], vec![82, 85, 90]])]
    fn merges_city_runs(
        #[case] batch_size: usize,
        #[case] slice: usize,
        #[case] expected: Vec<Vec<i32>>,
    ) {
        let dir = tempdir().tessera_unwrap();
        let settings = Settings::default().with_batch_size(batch_size);
        let writer = DataWriter::new(&settings);
        let cities = TableGenerator::cities().tessera_unwrap();
        for run in 0..4 {
            let path = dir.path().join(settings.file_name("s", run));
            write_sorted(&cities.slice(run * 2, 2), "x", &path, &writer).tessera_unwrap();
        }

        let outputs = merge_files(dir.path(), "x", slice, &settings).tessera_unwrap();
        let merged: Vec<Vec<i32>> = outputs
            .iter()
            .map(|p| read_ints(p, "x", &settings))
            .collect();
        assert_eq!(merged, expected);
        assert!(sorted_runs(dir.path(), &settings).tessera_unwrap().is_empty());
    }

    #[test]
    fn carries_whole_rows() {
        let dir = tempdir().tessera_unwrap();
        let settings = Settings::default().with_batch_size(2);
        let writer = DataWriter::new(&settings);
        let cities = TableGenerator::cities().tessera_unwrap();
        write_sorted(&cities.slice(0, 4), "y", dir.path().join("s0.parquet"), &writer).tessera_unwrap();
        write_sorted(&cities.slice(4, 4), "y", dir.path().join("s1.parquet"), &writer).tessera_unwrap();

        let outputs = merge_files(dir.path(), "y", 8, &settings).tessera_unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(
            read_strings(&outputs[0], "city", &settings),
            vec!["Miami", "Mobile", "Atlanta", "Omaha", "Chicago", "Denver", "Buffalo", "Toronto"]
        );
        assert_eq!(
            read_ints(&outputs[0], "y", &settings),
            vec![5, 10, 15, 35, 42, 45, 65, 77]
        );
    }

    #[test]
    fn single_sorted_run_is_unchanged() {
        let dir = tempdir().tessera_unwrap();
        let settings = Settings::default().with_batch_size(3);
        let school = TableGenerator::school().tessera_unwrap();
        let run = dir.path().join("s0.parquet");
        write_sorted(&school, "Student_id", &run, &DataWriter::new(&settings)).tessera_unwrap();
        let before = read_ints(&run, "Age", &settings);

        let outputs = merge_files(dir.path(), "Student_id", 100, &settings).tessera_unwrap();
        assert_eq!(outputs, vec![dir.path().join("0.parquet")]);
        assert_eq!(read_ints(&outputs[0], "Age", &settings), before);
        assert!(!run.exists());
    }

    #[test]
    fn equal_keys_follow_run_order() {
        let dir = tempdir().tessera_unwrap();
        let settings = Settings::default();
        let writer = DataWriter::new(&settings);
        // Numeric run order differs from the textual order of the file names
        for (id, tag) in [(2, 100), (9, 200), (10, 300)] {
            let batch = RecordBatch::try_from_iter(vec![
                ("key", Arc::new(Int32Array::from(vec![1, 1])) as ArrayRef),
                ("tag", Arc::new(Int32Array::from(vec![tag, tag + 1])) as ArrayRef),
            ])
            .tessera_unwrap();
            write_sorted(&batch, "key", dir.path().join(format!("s{id}.parquet")), &writer)
                .tessera_unwrap();
        }
        let outputs = merge_files(dir.path(), "key", 6, &settings).tessera_unwrap();
        assert_eq!(
            read_ints(&outputs[0], "tag", &settings),
            vec![100, 101, 200, 201, 300, 301]
        );
    }

    #[test]
    fn random_runs_merge_into_total_order() {
        let dir = tempdir().tessera_unwrap();
        let settings = Settings::default().with_batch_size(7);
        let writer = DataWriter::new(&settings);
        let mut rng = StdRng::seed_from_u64(42);
        let mut all = Vec::new();
        for run in 0..5 {
            let values: Vec<i32> = (0..rng.random_range(1..40))
                .map(|_| rng.random_range(-50..50))
                .collect();
            all.extend(values.iter().copied());
            let batch = RecordBatch::try_from_iter(vec![(
                "v",
                Arc::new(Int32Array::from(values)) as ArrayRef,
            )])
            .tessera_unwrap();
            write_sorted(&batch, "v", dir.path().join(format!("s{run}.parquet")), &writer)
                .tessera_unwrap();
        }
        all.sort_unstable();

        let outputs = merge_files(dir.path(), "v", 16, &settings).tessera_unwrap();
        let sizes: Vec<usize> = outputs
            .iter()
            .map(|p| read_ints(p, "v", &settings).len())
            .collect();
        assert!(sizes[..sizes.len() - 1].iter().all(|s| *s == 16));
        let merged: Vec<i32> = outputs
            .iter()
            .flat_map(|p| read_ints(p, "v", &settings))
            .collect();
        assert_eq!(merged, all);
    }

    #[test]
    fn rejects_empty_slices() {
        let dir = tempdir().tessera_unwrap();
        assert!(merge_files(dir.path(), "x", 0, &Settings::default()).is_err());
    }

    #[test]
    fn empty_folder_produces_nothing() {
        let dir = tempdir().tessera_unwrap();
        let outputs = merge_files(dir.path(), "x", 4, &Settings::default()).tessera_unwrap();
        assert!(outputs.is_empty());
    }
}
