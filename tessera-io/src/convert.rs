use arrow_array::cast::AsArray;
use arrow_array::types::Float64Type;
use arrow_array::{Array, RecordBatch};
use arrow_cast::cast;
use arrow_schema::DataType;
use tessera_error::{TesseraResult, tessera_err};

/// How values of a column are turned into partitioning coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Integers, floats, decimals and booleans, compared by numeric value.
    Numeric,
    /// Dates, times, timestamps and durations, compared by their physical tick count so that
    /// every value of the column lives in the same unit.
    Temporal,
    /// Anything else cannot be partitioned on.
    Unsupported,
}

impl ColumnKind {
    pub fn of(data_type: &DataType) -> Self {
        match data_type {
            DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(..)
            | DataType::Decimal256(..) => ColumnKind::Numeric,
            DataType::Date32
            | DataType::Date64
            | DataType::Time32(_)
            | DataType::Time64(_)
            | DataType::Timestamp(..)
            | DataType::Duration(_) => ColumnKind::Temporal,
            _ => ColumnKind::Unsupported,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ColumnKind::Unsupported)
    }
}

/// Physical integer type a temporal column is reinterpreted as before widening to `f64`.
fn physical_type(data_type: &DataType) -> Option<DataType> {
    match data_type {
        DataType::Date32 | DataType::Time32(_) => Some(DataType::Int32),
        DataType::Date64 | DataType::Time64(_) | DataType::Timestamp(..) | DataType::Duration(_) => {
            Some(DataType::Int64)
        }
        _ => None,
    }
}

/// Converts a column into `f64` coordinates, one per row. Nulls become `0.0`.
pub fn column_to_f64(array: &dyn Array) -> TesseraResult<Vec<f64>> {
    let floats = match ColumnKind::of(array.data_type()) {
        ColumnKind::Numeric => cast(array, &DataType::Float64)?,
        ColumnKind::Temporal => {
            let physical = physical_type(array.data_type()).ok_or_else(|| {
                tessera_err!(NotImplemented: "no physical type for {}", array.data_type())
            })?;
            cast(cast(array, &physical)?.as_ref(), &DataType::Float64)?
        }
        ColumnKind::Unsupported => {
            return Err(tessera_err!(
                NotImplemented: "cannot partition on column of type {}",
                array.data_type()
            ));
        }
    };
    let floats = floats
        .as_primitive_opt::<Float64Type>()
        .ok_or_else(|| tessera_err!("cast to Float64 produced {}", floats.data_type()))?;
    if floats.null_count() == 0 {
        Ok(floats.values().to_vec())
    } else {
        Ok(floats.iter().map(|v| v.unwrap_or(0.0)).collect())
    }
}

/// Converts the named columns of a batch, returning one vector of coordinates per column.
pub fn columns_to_f64<S: AsRef<str>>(batch: &RecordBatch, names: &[S]) -> TesseraResult<Vec<Vec<f64>>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let column = batch
                .column_by_name(name)
                .ok_or_else(|| tessera_err!(InvalidColumn: "{name} is not part of the batch"))?;
            column_to_f64(column.as_ref())
        })
        .collect()
}
