//! Tonal Interval Space (TIS) transform.
//!
//! Maps a 12-bit chroma vector into a 6-dimensional complex vector via a
//! weighted half-length DFT of the normalized pitch-class distribution
//! (Navarro-Caceres et al.). The batch path is vectorized over `ndarray`
//! the way `mecomp-analysis` vectorizes its audio descriptors; the scalar
//! path below it is a thin wrapper for single chords.

use ndarray::Array2;
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

use crate::chroma::CHROMA_LEN;
use crate::error::{Result, TensionError};

/// Dimensionality of a TIS vector.
pub const TIS_DIM: usize = CHROMA_LEN / 2;

/// Default per-dimension TIS weights (paper values).
pub const DEFAULT_WEIGHTS: [f64; TIS_DIM] = [2.0, 11.0, 17.0, 16.0, 19.0, 7.0];

/// A single chord's Tonal Interval Space vector.
pub type TisVector = [Complex64; TIS_DIM];

/// Precomputed `(6, 12)` complex DFT basis: `exp(-2*pi*i*k*n/12)` for
/// `k = 1..=6`, `n = 0..12`.
pub fn basis_matrix() -> Array2<Complex64> {
    let mut basis = Array2::<Complex64>::zeros((TIS_DIM, CHROMA_LEN));
    for k in 0..TIS_DIM {
        let kf = (k + 1) as f64;
        for n in 0..CHROMA_LEN {
            let nf = n as f64;
            let angle = -2.0 * PI * kf * nf / CHROMA_LEN as f64;
            basis[[k, n]] = Complex64::new(angle.cos(), angle.sin());
        }
    }
    basis
}

/// Vectorized chroma -> TIS for an `(N, 12)` matrix of 0/1 (or general
/// non-negative) chroma rows. Returns an `(N, 6)` complex matrix.
pub fn chroma_matrix_to_tis(
    chroma: &Array2<f64>,
    weights: &[f64; TIS_DIM],
    basis: &Array2<Complex64>,
) -> Result<Array2<Complex64>> {
    if chroma.ncols() != CHROMA_LEN {
        return Err(TensionError::InvalidChromaLength {
            expected: CHROMA_LEN,
            got: chroma.ncols(),
        });
    }
    let n = chroma.nrows();
    let mut out = Array2::<Complex64>::zeros((n, TIS_DIM));
    for row in 0..n {
        let sum: f64 = chroma.row(row).sum();
        if sum == 0.0 {
            return Err(TensionError::EmptyChroma);
        }
        for k in 0..TIS_DIM {
            let mut acc = Complex64::new(0.0, 0.0);
            for col in 0..CHROMA_LEN {
                acc += basis[[k, col]] * (chroma[[row, col]] / sum);
            }
            out[[row, k]] = acc * weights[k];
        }
    }
    Ok(out)
}

/// TIS for a single chroma vector (scalar convenience wrapper around the
/// vectorized path).
pub fn chroma_bits_to_tis(bits: &[u8], weights: &[f64; TIS_DIM]) -> Result<TisVector> {
    if bits.len() != CHROMA_LEN {
        return Err(TensionError::InvalidChromaLength {
            expected: CHROMA_LEN,
            got: bits.len(),
        });
    }
    let mut row = Array2::<f64>::zeros((1, CHROMA_LEN));
    for (i, &b) in bits.iter().enumerate() {
        row[[0, i]] = b as f64;
    }
    let basis = basis_matrix();
    let tis = chroma_matrix_to_tis(&row, weights, &basis)?;
    let mut out = [Complex64::new(0.0, 0.0); TIS_DIM];
    for k in 0..TIS_DIM {
        out[k] = tis[[0, k]];
    }
    Ok(out)
}

/// Euclidean norm of a TIS vector, `sqrt(sum |T_k|^2)`.
pub fn tis_norm(v: &TisVector) -> f64 {
    v.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt()
}

/// Unit vector `T / ||T||`. Caller must ensure `norm > 0`.
pub fn tis_unit(v: &TisVector, norm: f64) -> TisVector {
    let mut out = [Complex64::new(0.0, 0.0); TIS_DIM];
    for k in 0..TIS_DIM {
        out[k] = v[k] / norm;
    }
    out
}

/// Complex inner product `sum(v1 * conj(v2))`.
pub fn dot(v1: &[Complex64], v2: &[Complex64]) -> Complex64 {
    v1.iter().zip(v2.iter()).map(|(a, b)| a * b.conj()).sum()
}

/// Euclidean distance between two equal-length TIS vectors.
pub fn euclidean_distance(v1: &[Complex64], v2: &[Complex64]) -> f64 {
    v1.iter()
        .zip(v2.iter())
        .map(|(a, b)| (a - b).norm_sqr())
        .sum::<f64>()
        .sqrt()
}

/// Angle (radians) between two vectors via the complex inner-product
/// magnitude convention: `arccos(clip(|<u,v>| / (||u|| ||v||), 0, 1))`.
/// Returns `NaN` only if either norm is zero.
pub fn angle(v1: &[Complex64], v2: &[Complex64]) -> f64 {
    let n1 = v1.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    let n2 = v2.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    let denom = n1 * n2;
    if denom == 0.0 {
        return f64::NAN;
    }
    let cos = dot(v1, v2).norm() / denom;
    cos.clamp(0.0, 1.0).acos()
}

/// Convert a flat `(N,6)` complex array's row into a fixed-size [`TisVector`].
pub fn row_as_vector(arr: &Array2<Complex64>, row: usize) -> TisVector {
    let mut out = [Complex64::new(0.0, 0.0); TIS_DIM];
    for (k, v) in arr.row(row).iter().enumerate() {
        out[k] = *v;
    }
    out
}

/// Subtract a reference vector from every row of an `(N,6)` TIS matrix.
pub fn subtract_broadcast(arr: &Array2<Complex64>, reference: &TisVector) -> Array2<Complex64> {
    let n = arr.nrows();
    let mut out = Array2::<Complex64>::zeros((n, TIS_DIM));
    for row in 0..n {
        for k in 0..TIS_DIM {
            out[[row, k]] = arr[[row, k]] - reference[k];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn singleton_bits(pc: usize) -> [u8; CHROMA_LEN] {
        let mut bits = [0u8; CHROMA_LEN];
        bits[pc] = 1;
        bits
    }

    #[test]
    fn tis_is_deterministic() {
        let bits = singleton_bits(0);
        let t1 = chroma_bits_to_tis(&bits, &DEFAULT_WEIGHTS).unwrap();
        let t2 = chroma_bits_to_tis(&bits, &DEFAULT_WEIGHTS).unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn unit_vectors_have_unit_norm() {
        for pc in 0..CHROMA_LEN {
            let bits = singleton_bits(pc);
            let t = chroma_bits_to_tis(&bits, &DEFAULT_WEIGHTS).unwrap();
            let norm = tis_norm(&t);
            let unit = tis_unit(&t, norm);
            assert!((tis_norm(&unit) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn all_singleton_tis_norms_match_by_rotational_symmetry() {
        let base = tis_norm(&chroma_bits_to_tis(&singleton_bits(0), &DEFAULT_WEIGHTS).unwrap());
        for pc in 1..CHROMA_LEN {
            let n = tis_norm(&chroma_bits_to_tis(&singleton_bits(pc), &DEFAULT_WEIGHTS).unwrap());
            assert!((n - base).abs() < 1e-9);
        }
    }

    #[test]
    fn angle_is_zero_for_identical_vectors() {
        let bits = singleton_bits(3);
        let t = chroma_bits_to_tis(&bits, &DEFAULT_WEIGHTS).unwrap();
        assert!(angle(&t, &t) < 1e-9);
    }

    #[test]
    fn angle_is_nan_for_zero_norm() {
        let zero = [Complex64::new(0.0, 0.0); TIS_DIM];
        let bits = singleton_bits(0);
        let t = chroma_bits_to_tis(&bits, &DEFAULT_WEIGHTS).unwrap();
        assert!(angle(&zero, &t).is_nan());
    }
}
