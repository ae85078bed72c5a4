use tessera_curve::{HilbertCurve, MAX_MORTON_DIMENSIONS, SpaceFillingCurve, ZOrderCurve};
use tessera_error::{TesseraResult, tessera_bail, tessera_err};

use crate::{Domain, PartitionJob, PartitionSummary, Partitioning, PartitioningScheme, Point};

/// Orders rows along a Hilbert curve and cuts the order into runs of `partition_size` rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct HilbertCurvePartitioning;

impl Partitioning for HilbertCurvePartitioning {
    fn scheme(&self) -> PartitioningScheme {
        PartitioningScheme::HilbertCurve
    }

    fn partition_rows(&self, job: &mut PartitionJob<'_>) -> TesseraResult<PartitionSummary> {
        let curve = HilbertCurve::with_max_precision(job.dimensions())?;
        partition_along(&curve, job)
    }
}

/// Orders rows along a Z-order (Morton) curve and cuts the order into runs of
/// `partition_size` rows. Supports up to eight columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZOrderCurvePartitioning;

impl ZOrderCurvePartitioning {
    /// Fails for more columns than a Morton code can interleave.
    pub fn try_new(dimensions: usize) -> TesseraResult<Self> {
        if dimensions > MAX_MORTON_DIMENSIONS {
            tessera_bail!(
                "z-order curves interleave at most {MAX_MORTON_DIMENSIONS} columns, got {dimensions}"
            );
        }
        Ok(Self)
    }
}

impl Partitioning for ZOrderCurvePartitioning {
    fn scheme(&self) -> PartitioningScheme {
        PartitioningScheme::ZOrderCurve
    }

    fn partition_rows(&self, job: &mut PartitionJob<'_>) -> TesseraResult<PartitionSummary> {
        let curve = ZOrderCurve::try_new(job.dimensions())?;
        partition_along(&curve, job)
    }
}

fn partition_along<C: SpaceFillingCurve>(
    curve: &C,
    job: &mut PartitionJob<'_>,
) -> TesseraResult<PartitionSummary> {
    let domain = job.domain()?;
    let points = job.read_points()?;
    log::debug!(
        "Encoding {} points on a {}-bit {}-dimensional curve",
        points.len(),
        curve.bits(),
        curve.dimensions()
    );
    let ids = curve_ranks(curve, &domain, &points)?
        .into_iter()
        .map(|rank| rank / job.partition_size())
        .map(|id| u32::try_from(id).map_err(|_| tessera_err!("partition id {id} overflows u32")))
        .collect::<TesseraResult<Vec<_>>>()?;
    job.write_ids(&ids)
}

/// Position of every point along the curve, indexed by row. Equal curve indices are ranked by
/// row.
pub fn curve_ranks<C: SpaceFillingCurve + ?Sized>(
    curve: &C,
    domain: &Domain,
    points: &[Point],
) -> TesseraResult<Vec<usize>> {
    let max = curve.max_coordinate();
    let mut keys = Vec::with_capacity(points.len());
    let mut coords = vec![0u64; domain.dimensions()];
    for point in points {
        for (d, (c, bounds)) in coords.iter_mut().zip(domain.iter()).enumerate() {
            *c = bounds.quantize(point.coord(d), max);
        }
        keys.push((curve.encode(&coords)?, point.row()));
    }
    keys.sort_unstable();

    let mut ranks = vec![0; points.len()];
    for (rank, (_, row)) in keys.into_iter().enumerate() {
        ranks[row] = rank;
    }
    Ok(ranks)
}
