use tessera_error::TesseraResult;
use tessera_io::DataReader;

/// Observed `[min, max]` range of one partitioning column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || !self.width().is_finite()
    }

    /// Scales `value` linearly onto `0..=max_coordinate`. A degenerate range maps everything to 0.
    #[allow(clippy::cast_possible_truncation)]
    pub fn quantize(&self, value: f64, max_coordinate: u64) -> u64 {
        if self.is_degenerate() {
            return 0;
        }
        let scaled = ((value - self.min) / self.width() * max_coordinate as f64).floor();
        if scaled <= 0.0 {
            0
        } else if scaled >= max_coordinate as f64 {
            max_coordinate
        } else {
            scaled as u64
        }
    }
}

/// Per-column bounds of the whole dataset, in partitioning column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    bounds: Vec<Bounds>,
}

impl Domain {
    pub fn new(bounds: Vec<Bounds>) -> Self {
        Self { bounds }
    }

    /// Reads the bounds of `columns` from the reader's column statistics.
    pub fn from_reader<S: AsRef<str>>(reader: &DataReader, columns: &[S]) -> TesseraResult<Self> {
        let bounds = columns
            .iter()
            .map(|c| {
                let (min, max) = reader.column_stats(c.as_ref())?;
                Ok(Bounds::new(min, max))
            })
            .collect::<TesseraResult<Vec<_>>>()?;
        Ok(Self { bounds })
    }

    pub fn dimensions(&self) -> usize {
        self.bounds.len()
    }

    pub fn bounds(&self, dimension: usize) -> Bounds {
        self.bounds[dimension]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bounds> {
        self.bounds.iter()
    }

    /// Copy of this domain with one dimension narrowed to `bounds`.
    pub fn with_bounds(&self, dimension: usize, bounds: Bounds) -> Self {
        let mut narrowed = self.clone();
        narrowed.bounds[dimension] = bounds;
        narrowed
    }
}
