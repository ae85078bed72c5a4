use tessera_error::{TesseraResult, tessera_bail};

use crate::{INDEX_BITS, SpaceFillingCurve, check_coordinates};

/// Hilbert curve over `dimensions` axes with `bits` bits per axis.
///
/// Encoding follows Skilling's transform ("Programming the Hilbert curve", 2004): the
/// coordinates are rewritten in place into their "transposed" Hilbert form and the transposed
/// bits are then interleaved, most significant bit of the first axis first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HilbertCurve {
    dimensions: usize,
    bits: u32,
}

impl HilbertCurve {
    /// Upper bound on bits per axis, regardless of dimensionality.
    pub const MAX_BITS: u32 = 32;

    pub fn try_new(dimensions: usize, bits: u32) -> TesseraResult<Self> {
        if dimensions < 2 {
            tessera_bail!("hilbert curve needs at least 2 dimensions, got {dimensions}");
        }
        if bits == 0 || bits > Self::MAX_BITS {
            tessera_bail!(
                "hilbert curve bits per dimension must be in 1..={}, got {bits}",
                Self::MAX_BITS
            );
        }
        if dimensions as u64 * bits as u64 > INDEX_BITS as u64 {
            tessera_bail!(
                "{dimensions} dimensions of {bits} bits do not fit in a {INDEX_BITS} bit index"
            );
        }
        Ok(Self { dimensions, bits })
    }

    /// The finest curve whose index still fits in a `u64` for the given dimensionality.
    pub fn with_max_precision(dimensions: usize) -> TesseraResult<Self> {
        let bits = u32::try_from(INDEX_BITS as usize / dimensions.max(1))
            .unwrap_or(Self::MAX_BITS)
            .min(Self::MAX_BITS);
        Self::try_new(dimensions, bits)
    }
}

impl SpaceFillingCurve for HilbertCurve {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn bits(&self) -> u32 {
        self.bits
    }

    fn encode(&self, coords: &[u64]) -> TesseraResult<u64> {
        check_coordinates(self, coords)?;
        let mut axes = coords.to_vec();
        axes_to_transpose(&mut axes, self.bits);
        Ok(interleave(&axes, self.bits))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn decode(&self, index: u64) -> TesseraResult<Vec<u64>> {
        let used = self.dimensions as u32 * self.bits;
        if used < INDEX_BITS && index >> used != 0 {
            tessera_bail!("hilbert index {index} exceeds {used} bits");
        }
        let mut axes = uninterleave(index, self.dimensions, self.bits);
        transpose_to_axes(&mut axes, self.bits);
        Ok(axes)
    }
}

/// Rewrites axis coordinates into the transposed Hilbert representation.
fn axes_to_transpose(x: &mut [u64], bits: u32) {
    let n = x.len();
    let m = 1u64 << (bits - 1);

    // Inverse undo
    let mut q = m;
    while q > 1 {
        let p = q - 1;
        for i in 0..n {
            if x[i] & q != 0 {
                x[0] ^= p;
            } else {
                let t = (x[0] ^ x[i]) & p;
                x[0] ^= t;
                x[i] ^= t;
            }
        }
        q >>= 1;
    }

    // Gray encode
    for i in 1..n {
        x[i] ^= x[i - 1];
    }
    let mut t = 0;
    let mut q = m;
    while q > 1 {
        if x[n - 1] & q != 0 {
            t ^= q - 1;
        }
        q >>= 1;
    }
    for v in x.iter_mut() {
        *v ^= t;
    }
}

/// Inverse of [`axes_to_transpose`].
fn transpose_to_axes(x: &mut [u64], bits: u32) {
    let n = x.len();
    let end = 2u64 << (bits - 1);

    // Gray decode by H ^ (H/2)
    let mut t = x[n - 1] >> 1;
    for i in (1..n).rev() {
        x[i] ^= x[i - 1];
    }
    x[0] ^= t;

    // Undo excess work
    let mut q = 2u64;
    while q != end {
        let p = q - 1;
        for i in (0..n).rev() {
            if x[i] & q != 0 {
                x[0] ^= p;
            } else {
                t = (x[0] ^ x[i]) & p;
                x[0] ^= t;
                x[i] ^= t;
            }
        }
        q <<= 1;
    }
}

/// Bit `k` of `x[j]` lands at position `k * n + (n - 1 - j)`.
fn interleave(x: &[u64], bits: u32) -> u64 {
    let mut index = 0u64;
    for k in (0..bits).rev() {
        for v in x {
            index = (index << 1) | ((v >> k) & 1);
        }
    }
    index
}

#[allow(clippy::cast_possible_truncation)]
fn uninterleave(index: u64, dimensions: usize, bits: u32) -> Vec<u64> {
    let mut x = vec![0u64; dimensions];
    let n = dimensions as u32;
    for k in 0..bits {
        for (j, v) in x.iter_mut().enumerate() {
            let pos = k * n + (n - 1 - j as u32);
            *v |= ((index >> pos) & 1) << k;
        }
    }
    x
}
