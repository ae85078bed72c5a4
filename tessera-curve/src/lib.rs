//! Space-filling curve codecs.
//!
//! A curve maps an N-dimensional tuple of unsigned integer coordinates onto a single `u64`
//! index such that tuples close to each other in space tend to be close along the curve.
//! Decoding is the exact inverse of encoding for every coordinate that fits the curve's
//! per-dimension bit width.

pub use hilbert::*;
pub use morton::*;
use tessera_error::{TesseraResult, tessera_bail};

mod hilbert;
mod morton;

/// Width of a curve index in bits.
pub const INDEX_BITS: u32 = u64::BITS;

/// A bijection between integer coordinate tuples and positions along a curve.
pub trait SpaceFillingCurve {
    /// Number of coordinates per point.
    fn dimensions(&self) -> usize;

    /// Number of significant bits per coordinate.
    fn bits(&self) -> u32;

    /// Largest coordinate value the curve can represent.
    fn max_coordinate(&self) -> u64 {
        (1u64 << self.bits()) - 1
    }

    /// Maps a coordinate tuple to its curve index.
    fn encode(&self, coords: &[u64]) -> TesseraResult<u64>;

    /// Maps a curve index back to its coordinate tuple.
    fn decode(&self, index: u64) -> TesseraResult<Vec<u64>>;
}

fn check_coordinates<C: SpaceFillingCurve + ?Sized>(curve: &C, coords: &[u64]) -> TesseraResult<()> {
    if coords.len() != curve.dimensions() {
        tessera_bail!(
            "expected {} coordinates, got {}",
            curve.dimensions(),
            coords.len()
        );
    }
    let max = curve.max_coordinate();
    if let Some(c) = coords.iter().find(|c| **c > max) {
        tessera_bail!("coordinate {c} does not fit in {} bits", curve.bits());
    }
    Ok(())
}
