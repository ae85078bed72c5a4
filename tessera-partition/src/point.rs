use itertools::Itertools;
use tessera_error::{TesseraResult, tessera_bail};

/// One row's values on the partitioning columns.
///
/// Points remember the row they were read from, so that equal coordinates remain distinct
/// entities and partition ids can be written back in the original row order.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    row: usize,
    coords: Box<[f64]>,
}

impl Point {
    pub fn new(row: usize, coords: impl Into<Box<[f64]>>) -> Self {
        Self {
            row,
            coords: coords.into(),
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn coord(&self, dimension: usize) -> f64 {
        self.coords[dimension]
    }

    pub fn dimensions(&self) -> usize {
        self.coords.len()
    }
}

/// Turns column-oriented coordinates into one point per row.
pub fn to_points(columns: &[Vec<f64>]) -> TesseraResult<Vec<Point>> {
    let Some(first) = columns.first() else {
        return Ok(Vec::new());
    };
    if let Some(other) = columns.iter().find(|c| c.len() != first.len()) {
        tessera_bail!(
            "columns have different lengths: {} and {}",
            first.len(),
            other.len()
        );
    }
    Ok((0..first.len())
        .map(|row| Point::new(row, columns.iter().map(|c| c[row]).collect::<Vec<_>>()))
        .collect())
}

/// Pearson's median skewness `|3 (mean - median) / stdev|` using the sample standard deviation.
///
/// Zero for fewer than two values or a column without spread.
pub fn column_skewness(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stdev = variance.sqrt();
    if stdev == 0.0 || !stdev.is_finite() {
        return 0.0;
    }
    let sorted = values.iter().copied().sorted_by(f64::total_cmp).collect_vec();
    let median = sorted[sorted.len() / 2];
    (3.0 * (mean - median) / stdev).abs()
}

/// Column indices ordered by descending skewness. Equally skewed columns keep their order.
pub fn skewness_order(columns: &[Vec<f64>]) -> Vec<usize> {
    let skew = columns.iter().map(|c| column_skewness(c)).collect_vec();
    (0..columns.len())
        .sorted_by(|a, b| skew[*b].total_cmp(&skew[*a]))
        .collect()
}
