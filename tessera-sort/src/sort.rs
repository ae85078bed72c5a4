use std::path::Path;

use arrow_array::{RecordBatch, UInt64Array};
use arrow_select::take::take_record_batch;
use tessera_error::{TesseraResult, tessera_err};
use tessera_io::{DataWriter, column_to_f64};

/// Sort keys of the named column, as compared by [`sort_batch`] and [`crate::merge_files`].
pub fn sort_keys(batch: &RecordBatch, column: &str) -> TesseraResult<Vec<f64>> {
    let array = batch
        .column_by_name(column)
        .ok_or_else(|| tessera_err!(InvalidColumn: "cannot sort on missing column {column}"))?;
    column_to_f64(array.as_ref())
}

/// Stable ascending sort of a batch on one column.
#[allow(clippy::cast_possible_truncation)]
pub fn sort_batch(batch: &RecordBatch, column: &str) -> TesseraResult<RecordBatch> {
    let keys = sort_keys(batch, column)?;
    let mut indices: Vec<u64> = (0..batch.num_rows() as u64).collect();
    indices.sort_by(|a, b| keys[*a as usize].total_cmp(&keys[*b as usize]));
    Ok(take_record_batch(batch, &UInt64Array::from(indices))?)
}

/// Sorts `batch` on `column` and writes it as a single file at `output`.
pub fn write_sorted(
    batch: &RecordBatch,
    column: &str,
    output: impl AsRef<Path>,
    writer: &DataWriter,
) -> TesseraResult<usize> {
    let sorted = sort_batch(batch, column)?;
    writer.write_table(&sorted, output)
}

#[cfg(test)]
mod tests {
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int32Type;
    use tempfile::tempdir;
    use tessera_error::{TesseraError, TesseraUnwrap};
    use tessera_io::fixtures::TableGenerator;
    use tessera_io::{DataReader, DataWriter, Settings};

    use crate::{sort_batch, write_sorted};

    fn int_column(batch: &arrow_array::RecordBatch, index: usize) -> Vec<i32> {
        batch.column(index).as_primitive::<Int32Type>().values().to_vec()
    }

    #[test]
    fn sorts_by_named_column() {
        let school = TableGenerator::school().tessera_unwrap();
        let sorted = sort_batch(&school, "Age").tessera_unwrap();
        assert_eq!(int_column(&sorted, 1), vec![18, 21, 22, 23, 27, 30, 37, 41]);
        assert_eq!(int_column(&sorted, 0), vec![21, 45, 91, 111, 7, 16, 34, 74]);
    }

    #[test]
    fn sort_is_stable() {
        let weather = TableGenerator::weather().tessera_unwrap();
        let sorted = sort_batch(&weather, "Year").tessera_unwrap();
        assert_eq!(int_column(&sorted, 2), vec![1990, 1995, 1995, 2000, 2000]);
        // Days keep their input order among equal years
        assert_eq!(int_column(&sorted, 0), vec![1, 17, 28, 12, 23]);
    }

    #[test]
    fn writes_sorted_run() {
        let dir = tempdir().tessera_unwrap();
        let settings = Settings::default();
        let path = dir.path().join("s0.parquet");
        let cities = TableGenerator::cities().tessera_unwrap();
        let rows = write_sorted(&cities, "x", &path, &DataWriter::new(&settings)).tessera_unwrap();
        assert_eq!(rows, 8);

        let run = DataReader::try_new(&path, &settings)
            .tessera_unwrap()
            .read_full_table()
            .tessera_unwrap();
        assert_eq!(int_column(&run, 1), vec![5, 27, 35, 52, 62, 82, 85, 90]);
    }

    #[test]
    fn missing_column() {
        let school = TableGenerator::school().tessera_unwrap();
        assert!(matches!(
            sort_batch(&school, "Grade"),
            Err(TesseraError::InvalidColumn(..))
        ));
    }
}
