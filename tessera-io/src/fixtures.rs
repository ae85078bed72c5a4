//! Small in-memory tables used by tests and demos.

use std::path::Path;
use std::sync::Arc;

use arrow_array::{ArrayRef, Date32Array, Float64Array, Int32Array, RecordBatch, StringArray};
use tessera_error::TesseraResult;

use crate::{DataWriter, Settings};

/// Names accepted by [`TableGenerator::by_name`].
pub const FIXTURE_NAMES: [&str; 4] = ["school", "cities", "weather", "events"];

pub struct TableGenerator;

impl TableGenerator {
    /// Eight students with an `Int32` id and age.
    pub fn school() -> TesseraResult<RecordBatch> {
        Ok(RecordBatch::try_from_iter(vec![
            (
                "Student_id",
                Arc::new(Int32Array::from(vec![16, 45, 21, 7, 74, 34, 111, 91])) as ArrayRef,
            ),
            (
                "Age",
                Arc::new(Int32Array::from(vec![30, 21, 18, 27, 41, 37, 23, 22])) as ArrayRef,
            ),
        ])?)
    }

    /// Eight cities placed on an integer plane.
    pub fn cities() -> TesseraResult<RecordBatch> {
        Ok(RecordBatch::try_from_iter(vec![
            (
                "city",
                Arc::new(StringArray::from(vec![
                    "Toronto", "Buffalo", "Denver", "Chicago", "Omaha", "Mobile", "Atlanta", "Miami",
                ])) as ArrayRef,
            ),
            (
                "x",
                Arc::new(Int32Array::from(vec![62, 82, 5, 35, 27, 52, 85, 90])) as ArrayRef,
            ),
            (
                "y",
                Arc::new(Int32Array::from(vec![77, 65, 45, 42, 35, 10, 15, 5])) as ArrayRef,
            ),
        ])?)
    }

    /// Five daily observations mixing integer and floating point columns.
    pub fn weather() -> TesseraResult<RecordBatch> {
        Ok(RecordBatch::try_from_iter(vec![
            ("Day", Arc::new(Int32Array::from(vec![1, 12, 17, 23, 28])) as ArrayRef),
            ("Month", Arc::new(Int32Array::from(vec![1, 3, 5, 7, 1])) as ArrayRef),
            (
                "Year",
                Arc::new(Int32Array::from(vec![1990, 2000, 1995, 2000, 1995])) as ArrayRef,
            ),
            (
                "Temperature",
                Arc::new(Float64Array::from(vec![0.4, 43.32, 23.43, 24.33, 13.34])) as ArrayRef,
            ),
            (
                "Humidity",
                Arc::new(Float64Array::from(vec![34.0, 23.0, 78.0, 48.0, 10.0])) as ArrayRef,
            ),
        ])?)
    }

    /// Eight events of 2024 with a `Date32` day, four on each side of the year's middle.
    pub fn events() -> TesseraResult<RecordBatch> {
        Ok(RecordBatch::try_from_iter(vec![
            (
                "venue",
                Arc::new(StringArray::from(vec![
                    "Arena", "Bowl", "Club", "Dome", "Expo", "Forum", "Garden", "Hall",
                ])) as ArrayRef,
            ),
            (
                // 2024-01-05, 2024-11-20, 2024-03-14, 2024-08-01,
                // 2024-02-29, 2024-12-24, 2024-05-30, 2024-10-09
                "Date",
                Arc::new(Date32Array::from(vec![
                    19_727, 20_047, 19_796, 19_936, 19_782, 20_081, 19_873, 20_005,
                ])) as ArrayRef,
            ),
            (
                "Visitors",
                Arc::new(Int32Array::from(vec![120, 45, 300, 80, 210, 15, 95, 260])) as ArrayRef,
            ),
        ])?)
    }

    pub fn by_name(name: &str) -> Option<TesseraResult<RecordBatch>> {
        match name {
            "school" => Some(Self::school()),
            "cities" => Some(Self::cities()),
            "weather" => Some(Self::weather()),
            "events" => Some(Self::events()),
            _ => None,
        }
    }

    /// Writes `table` as a Parquet file at `path`.
    pub fn write(table: &RecordBatch, path: impl AsRef<Path>, settings: &Settings) -> TesseraResult<usize> {
        DataWriter::new(settings).write_table(table, path)
    }
}
