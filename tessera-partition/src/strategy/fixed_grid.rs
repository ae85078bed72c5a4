use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use arrow_array::RecordBatch;
use tessera_error::{TesseraResult, tessera_bail, tessera_err};
use tessera_io::columns_to_f64;

use crate::{Domain, PartitionJob, PartitionSummary, Partitioning, PartitioningScheme};

/// Slack added to every cell so that the domain maximum still falls inside the grid.
const CELL_MARGIN: f64 = 1.1;

/// Uniform grid over the column domains, cut into partitions of at most `partition_size` rows.
///
/// The grid starts with about as many cells as partitions are needed. When the first batch
/// shows more rows per occupied cell than fit a partition, the cells are narrowed by the ratio
/// of the partition size to that density, up to one cell per row.
///
/// Rows are streamed batch by batch. Within a batch they are visited in cell order and dealt
/// into buckets: every cell keeps one open bucket, and a full bucket is replaced by a new one
/// with the next free id. Each batch writes one fragment per bucket, and the fragments of a
/// bucket are concatenated into the final partition once every batch is done. Ids are
/// therefore contiguous, and a dense cell spans several partitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedGridPartitioning;

/// Cell geometry of a [`FixedGridPartitioning`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    domain: Domain,
    cells_per_dimension: usize,
    widths: Vec<f64>,
}

impl Grid {
    /// A grid whose `k^n` cells are the fewest that cover `partitions` partitions.
    pub fn new(domain: Domain, partitions: usize) -> TesseraResult<Self> {
        let n = exponent(&domain)?;
        let mut k = 1usize;
        while k.checked_pow(n).is_some_and(|cells| cells < partitions) {
            k += 1;
        }
        if k.checked_pow(n).is_none_or(|cells| cells > u32::MAX as usize) {
            tessera_bail!("a grid of {k}^{n} cells does not fit 32-bit partition ids");
        }
        Ok(Self::with_cells(domain, k))
    }

    fn with_cells(domain: Domain, k: usize) -> Self {
        let widths = domain
            .iter()
            .map(|b| {
                if b.is_degenerate() {
                    1.0
                } else {
                    b.width() * CELL_MARGIN / k as f64
                }
            })
            .collect();
        Self {
            domain,
            cells_per_dimension: k,
            widths,
        }
    }

    /// Narrows the cells when `density` rows per occupied cell overflow `partition_size`.
    ///
    /// Widths shrink by `(partition_size / density)^(1/n)`, but the grid never grows past
    /// `max_cells` cells.
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_density(
        self,
        partition_size: usize,
        density: f64,
        max_cells: usize,
    ) -> TesseraResult<Self> {
        if !density.is_finite() || density <= partition_size as f64 {
            return Ok(self);
        }
        let n = exponent(&self.domain)?;
        let scale = (density / partition_size as f64).powf(1.0 / f64::from(n));
        let wanted = (self.cells_per_dimension as f64 * scale).ceil() as usize;
        let max_cells = max_cells.min(u32::MAX as usize);

        let mut k = self.cells_per_dimension;
        while k < wanted && (k + 1).checked_pow(n).is_some_and(|cells| cells <= max_cells) {
            k += 1;
        }
        if k == self.cells_per_dimension {
            return Ok(self);
        }
        log::debug!(
            "{density:.1} rows per occupied cell, narrowing the grid from {} to {k} cells per dimension",
            self.cells_per_dimension
        );
        Ok(Self::with_cells(self.domain, k))
    }

    pub fn cells_per_dimension(&self) -> usize {
        self.cells_per_dimension
    }

    /// Linearized cell index of a row, the first dimension varying fastest.
    #[allow(clippy::cast_possible_truncation)]
    pub fn cell(&self, coords: impl Iterator<Item = f64>) -> u32 {
        let k = self.cells_per_dimension;
        let mut id = 0;
        let mut stride = 1;
        for ((value, bounds), width) in coords.zip(self.domain.iter()).zip(&self.widths) {
            let index = ((value - bounds.min) / width).floor();
            let index = if index <= 0.0 {
                0
            } else {
                (index as usize).min(k - 1)
            };
            id += index * stride;
            stride *= k;
        }
        // Grid::new checked that every id fits
        id as u32
    }

    /// Cell of every row of `batch`.
    pub fn cells(&self, batch: &RecordBatch, columns: &[String]) -> TesseraResult<Vec<u32>> {
        let values = columns_to_f64(batch, columns)?;
        Ok((0..batch.num_rows())
            .map(|row| self.cell(values.iter().map(|column| column[row])))
            .collect())
    }
}

fn exponent(domain: &Domain) -> TesseraResult<u32> {
    u32::try_from(domain.dimensions())
        .map_err(|_| tessera_err!("too many dimensions: {}", domain.dimensions()))
}

/// Rows per occupied cell of `cells`, extrapolated to `num_rows` rows.
fn observed_density(cells: &[u32], num_rows: usize) -> f64 {
    let mut occupied = cells.to_vec();
    occupied.sort_unstable();
    occupied.dedup();
    if occupied.is_empty() {
        0.0
    } else {
        num_rows as f64 / occupied.len() as f64
    }
}

/// Deals the rows of each cell into partitions of at most `size` rows.
#[derive(Debug)]
struct Buckets {
    size: usize,
    open: HashMap<u32, (u32, usize)>,
    next: u32,
}

impl Buckets {
    fn new(size: usize) -> Self {
        Self {
            size,
            open: HashMap::new(),
            next: 0,
        }
    }

    /// Partition id of the next row of `cell`.
    fn assign(&mut self, cell: u32) -> TesseraResult<u32> {
        let size = self.size;
        let bucket = self.open.entry(cell).or_insert((0, size));
        if bucket.1 >= size {
            let id = self.next;
            self.next = id
                .checked_add(1)
                .ok_or_else(|| tessera_err!("more partitions than 32-bit ids can name"))?;
            *bucket = (id, 0);
        }
        bucket.1 += 1;
        Ok(bucket.0)
    }

    /// Partition ids of a batch whose rows fall in `cells`, visiting rows in cell order.
    fn assign_batch(&mut self, cells: &[u32]) -> TesseraResult<Vec<u32>> {
        let mut order = (0..cells.len()).collect::<Vec<_>>();
        order.sort_by_key(|row| cells[*row]);
        let mut ids = vec![0; cells.len()];
        for row in order {
            ids[row] = self.assign(cells[row])?;
        }
        Ok(ids)
    }
}

impl Partitioning for FixedGridPartitioning {
    fn scheme(&self) -> PartitioningScheme {
        PartitioningScheme::FixedGrid
    }

    fn partition_rows(&self, job: &mut PartitionJob<'_>) -> TesseraResult<PartitionSummary> {
        let num_rows = job.num_rows();
        let partition_size = job.partition_size();
        let partitions = num_rows.div_ceil(partition_size);
        let grid = Grid::new(job.domain()?, partitions)?;

        let work = job.working_dir(self.scheme())?;
        let writer = job.writer();
        let settings = job.settings().clone();
        let columns = job.columns().to_vec();
        let reader = job.reader_mut();
        reader.rewind();

        let mut pending = reader.next_batch()?;
        let grid = match &pending {
            Some(batch) => {
                let density = observed_density(&grid.cells(batch, &columns)?, num_rows);
                grid.with_density(partition_size, density, num_rows.max(partitions))?
            }
            None => grid,
        };
        log::debug!(
            "Fixed grid of {} cells per dimension for {partitions} partitions",
            grid.cells_per_dimension()
        );

        let mut buckets = Buckets::new(partition_size);
        let mut fragments: BTreeMap<u32, Vec<PathBuf>> = BTreeMap::new();
        let mut batch_id = 0;
        while let Some(batch) = pending.take() {
            let ids = buckets.assign_batch(&grid.cells(&batch, &columns)?)?;
            let fragment = |id: u32| {
                work.join(id.to_string())
                    .join(settings.file_name("b", batch_id))
            };
            for id in writer.write_partitions(&batch, &ids, &fragment)?.into_keys() {
                fragments.entry(id).or_default().push(fragment(id));
            }
            batch_id += 1;
            pending = reader.next_batch()?;
        }
        reader.rewind();

        let mut rows = 0;
        for (id, files) in &fragments {
            rows += writer.merge_into(files, job.partition_path(id))?;
            for file in files {
                fs::remove_file(file)?;
            }
        }
        work.remove()?;
        Ok(PartitionSummary {
            partitions: fragments.len(),
            rows,
        })
    }
}
