use tessera_error::{TesseraResult, tessera_bail};

use crate::{SpaceFillingCurve, check_coordinates};

/// Smallest dimensionality supported by [`ZOrderCurve`].
pub const MIN_MORTON_DIMENSIONS: usize = 2;
/// Largest dimensionality supported by [`ZOrderCurve`].
pub const MAX_MORTON_DIMENSIONS: usize = 8;

/// Bits per coordinate available to a Morton code of the given dimensionality.
pub const fn morton_bits(dimensions: usize) -> Option<u32> {
    match dimensions {
        2 => Some(32),
        3 => Some(21),
        4 => Some(16),
        5 => Some(12),
        6 => Some(10),
        7 => Some(9),
        8 => Some(8),
        _ => None,
    }
}

/// Spreads the 8 bits of a byte `dimensions` positions apart.
const fn spread_table(dimensions: usize) -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut bit = 0;
        let mut spread = 0u64;
        while bit < 8 {
            if byte & (1 << bit) != 0 {
                spread |= 1u64 << (bit * dimensions);
            }
            bit += 1;
        }
        table[byte] = spread;
        byte += 1;
    }
    table
}

static SPREAD: [[u64; 256]; MAX_MORTON_DIMENSIONS - MIN_MORTON_DIMENSIONS + 1] = [
    spread_table(2),
    spread_table(3),
    spread_table(4),
    spread_table(5),
    spread_table(6),
    spread_table(7),
    spread_table(8),
];

/// Z-order (Morton) curve: the raw bits of every coordinate interleaved, first coordinate in the
/// least significant position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZOrderCurve {
    dimensions: usize,
    bits: u32,
}

impl ZOrderCurve {
    pub fn try_new(dimensions: usize) -> TesseraResult<Self> {
        let Some(bits) = morton_bits(dimensions) else {
            tessera_bail!(
                "z-order curve supports {MIN_MORTON_DIMENSIONS} to {MAX_MORTON_DIMENSIONS} dimensions, got {dimensions}"
            );
        };
        Ok(Self { dimensions, bits })
    }

    fn table(&self) -> &'static [u64; 256] {
        &SPREAD[self.dimensions - MIN_MORTON_DIMENSIONS]
    }
}

impl SpaceFillingCurve for ZOrderCurve {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn bits(&self) -> u32 {
        self.bits
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode(&self, coords: &[u64]) -> TesseraResult<u64> {
        check_coordinates(self, coords)?;
        let table = self.table();
        let stride = 8 * self.dimensions;
        let mut code = 0u64;
        for (d, coord) in coords.iter().enumerate() {
            let mut rest = *coord;
            let mut shift = d;
            while rest != 0 {
                code |= table[(rest & 0xFF) as usize] << shift;
                rest >>= 8;
                shift += stride;
            }
        }
        Ok(code)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn decode(&self, index: u64) -> TesseraResult<Vec<u64>> {
        let used = self.dimensions as u32 * self.bits;
        if used < u64::BITS && index >> used != 0 {
            tessera_bail!("z-order index {index} exceeds {used} bits");
        }
        let mut coords = vec![0u64; self.dimensions];
        for k in 0..self.bits {
            for (d, coord) in coords.iter_mut().enumerate() {
                let pos = k as usize * self.dimensions + d;
                *coord |= ((index >> pos) & 1) << k;
            }
        }
        Ok(coords)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;
    use tessera_error::TesseraUnwrap;

    use crate::{SpaceFillingCurve, ZOrderCurve, morton_bits};

    #[rstest]
    #[case(&[18, 21], 806)]
    #[case(&[21, 45], 2483)]
    #[case(&[22, 91], 9118)]
    #[case(&[1, 0, 0], 1)]
    #[case(&[0, 0, 1], 4)]
    fn encodes_known_codes(#[case] coords: &[u64], #[case] expected: u64) {
        let curve = ZOrderCurve::try_new(coords.len()).tessera_unwrap();
        assert_eq!(curve.encode(coords).tessera_unwrap(), expected);
        assert_eq!(curve.decode(expected).tessera_unwrap(), coords);
    }

    #[test]
    fn decode_inverts_encode() {
        let mut rng = StdRng::seed_from_u64(11);
        for dimensions in 2..=8 {
            let curve = ZOrderCurve::try_new(dimensions).tessera_unwrap();
            for _ in 0..500 {
                let coords: Vec<u64> = (0..dimensions)
                    .map(|_| rng.random_range(0..=curve.max_coordinate()))
                    .collect();
                let code = curve.encode(&coords).tessera_unwrap();
                assert_eq!(curve.decode(code).tessera_unwrap(), coords);
            }
        }
    }

    #[test]
    fn full_width_coordinates() {
        let curve = ZOrderCurve::try_new(2).tessera_unwrap();
        let max = curve.max_coordinate();
        assert_eq!(curve.encode(&[max, max]).tessera_unwrap(), u64::MAX);
        assert_eq!(curve.encode(&[max, 0]).tessera_unwrap(), 0x5555_5555_5555_5555);
    }

    #[rstest]
    #[case(1)]
    #[case(9)]
    fn rejects_unsupported_dimensions(#[case] dimensions: usize) {
        assert!(morton_bits(dimensions).is_none());
        assert!(ZOrderCurve::try_new(dimensions).is_err());
    }
}
