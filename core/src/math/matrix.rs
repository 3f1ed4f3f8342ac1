//! Dense linear algebra on small real and complex matrices.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use rustfft::num_traits::{One, Zero};

use crate::prelude::{ensure_shape, Complex, Float, RadarError, RadarResult};

/// Pivots at or below this fraction of the largest entry count as zero.
pub const SINGULAR_TOLERANCE: Float = 1e-6;

/// Scalar field shared by the real and complex routines.
pub trait Field:
    Copy
    + Debug
    + PartialEq
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn modulus(self) -> Float;
    fn conjugate(self) -> Self;
    fn real_part(self) -> Float;
    fn from_real(value: Float) -> Self;
}

impl Field for Float {
    fn modulus(self) -> Float {
        self.abs()
    }
    fn conjugate(self) -> Self {
        self
    }
    fn real_part(self) -> Float {
        self
    }
    fn from_real(value: Float) -> Self {
        value
    }
}

impl Field for Complex {
    fn modulus(self) -> Float {
        self.norm()
    }
    fn conjugate(self) -> Self {
        self.conj()
    }
    fn real_part(self) -> Float {
        self.re
    }
    fn from_real(value: Float) -> Self {
        Complex::new(value, 0.0)
    }
}

fn ensure_square<T>(what: &str, a: &ArrayView2<T>) -> RadarResult<usize> {
    if a.nrows() != a.ncols() {
        return Err(RadarError::DimensionMismatch(format!(
            "{} needs a square matrix, got {}x{}",
            what,
            a.nrows(),
            a.ncols()
        )));
    }
    Ok(a.nrows())
}

/// Scratch space for LU factorisation of `n x n` matrices.
///
/// Owned by processors that invert every frame, so repeated inversions
/// reuse the same buffers.
#[derive(Debug, Clone)]
pub struct LuWorkspace<T> {
    lu: Array2<T>,
    perm: Vec<usize>,
    column: Vec<T>,
}

impl<T: Field> LuWorkspace<T> {
    pub fn new(n: usize) -> Self {
        Self {
            lu: Array2::zeros((n, n)),
            perm: (0..n).collect(),
            column: vec![T::zero(); n],
        }
    }

    pub fn size(&self) -> usize {
        self.lu.nrows()
    }

    /// `P·A = L·U` with partial pivoting into the workspace. Returns the
    /// number of row swaps, or `None` when a pivot column is numerically zero.
    fn factor(&mut self, a: ArrayView2<T>, tolerance: Float) -> Option<usize> {
        let n = a.nrows();
        let lu = &mut self.lu;
        lu.assign(&a);
        for (i, slot) in self.perm.iter_mut().enumerate() {
            *slot = i;
        }
        let mut swaps = 0;
        let scale = a.iter().map(|v| v.modulus()).fold(0.0, Float::max);
        let limit = tolerance * scale;

        for i in 0..n {
            let (pivot_row, pivot_abs) = (i..n)
                .map(|k| (k, lu[[k, i]].modulus()))
                .fold((i, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
            if pivot_abs == 0.0 || pivot_abs <= limit {
                return None;
            }
            if pivot_row != i {
                for col in 0..n {
                    lu.swap([i, col], [pivot_row, col]);
                }
                self.perm.swap(i, pivot_row);
                swaps += 1;
            }
            let pivot = lu[[i, i]];
            for r in (i + 1)..n {
                let factor = lu[[r, i]] / pivot;
                lu[[r, i]] = factor;
                for c in (i + 1)..n {
                    let delta = factor * lu[[i, c]];
                    lu[[r, c]] = lu[[r, c]] - delta;
                }
            }
        }
        Some(swaps)
    }

    fn determinant(&self, swaps: usize) -> T {
        let product = (0..self.lu.nrows()).fold(T::one(), |acc, i| acc * self.lu[[i, i]]);
        if swaps % 2 == 1 {
            -product
        } else {
            product
        }
    }

    fn invert_into(&mut self, out: &mut ArrayViewMut2<T>) {
        let n = self.lu.nrows();
        let y = &mut self.column;
        for col in 0..n {
            // forward substitution on the permuted unit vector
            for i in 0..n {
                let mut sum = if self.perm[i] == col { T::one() } else { T::zero() };
                for k in 0..i {
                    sum = sum - self.lu[[i, k]] * y[k];
                }
                y[i] = sum;
            }
            for i in (0..n).rev() {
                let mut sum = y[i];
                for k in (i + 1)..n {
                    sum = sum - self.lu[[i, k]] * out[[k, col]];
                }
                out[[i, col]] = sum / self.lu[[i, i]];
            }
        }
    }
}

/// Inverse via LU in a caller-owned workspace; fails with `MatrixSingular`
/// for a numerically singular `a` and leaves `out` untouched.
pub fn invert_with<T: Field>(
    a: ArrayView2<T>,
    mut out: ArrayViewMut2<T>,
    workspace: &mut LuWorkspace<T>,
) -> RadarResult<()> {
    let n = ensure_square("invert", &a)?;
    ensure_shape("inverse", &[n, n], out.shape())?;
    ensure_shape("lu workspace", &[n], &[workspace.size()])?;
    workspace.factor(a, SINGULAR_TOLERANCE).ok_or(RadarError::MatrixSingular)?;
    workspace.invert_into(&mut out);
    Ok(())
}

/// Inverse via LU with a temporary workspace.
pub fn invert<T: Field>(a: ArrayView2<T>, out: ArrayViewMut2<T>) -> RadarResult<()> {
    let n = ensure_square("invert", &a)?;
    invert_with(a, out, &mut LuWorkspace::new(n))
}

/// Determinant; an exactly singular matrix yields zero, not an error.
pub fn determinant<T: Field>(a: ArrayView2<T>) -> RadarResult<T> {
    let n = ensure_square("determinant", &a)?;
    let mut workspace = LuWorkspace::new(n);
    Ok(workspace
        .factor(a, 0.0)
        .map_or_else(T::zero, |swaps| workspace.determinant(swaps)))
}

/// Cholesky factor `L` with `A = L·Lᴴ`, written straight into `out`; only
/// the lower triangle of `a` is read.
pub fn cholesky<T: Field>(a: ArrayView2<T>, mut out: ArrayViewMut2<T>) -> RadarResult<()> {
    let n = ensure_square("cholesky", &a)?;
    ensure_shape("cholesky factor", &[n, n], out.shape())?;

    out.fill(T::zero());
    for i in 0..n {
        for j in i..n {
            let mut sum = a[[j, i]];
            for k in 0..i {
                sum = sum - out[[i, k]].conjugate() * out[[j, k]];
            }
            if i == j {
                let diag = sum.real_part();
                if diag <= 0.0 {
                    return Err(RadarError::MatrixNotPositiveDefinite);
                }
                out[[i, i]] = T::from_real(diag.sqrt());
            } else {
                out[[j, i]] = sum / out[[i, i]];
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::mat_mul;
    use ndarray::array;

    #[test]
    fn inverse_times_matrix_is_identity() {
        let a: Array2<Float> = array![[4.0, 7.0, 2.0], [3.0, 6.0, 1.0], [2.0, 5.0, 3.0]];
        let mut inv = Array2::zeros((3, 3));
        invert(a.view(), inv.view_mut()).unwrap();
        let mut product = Array2::zeros((3, 3));
        mat_mul(a.view(), inv.view(), product.view_mut()).unwrap();
        for ((i, j), v) in product.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((v - expected).abs() < 1e-5, "({}, {}) = {}", i, j, v);
        }
    }

    #[test]
    fn singular_matrix_is_reported() {
        let a: Array2<Float> = array![[1.0, 2.0], [2.0, 4.0]];
        let mut inv = Array2::from_elem((2, 2), 9.0);
        assert_eq!(invert(a.view(), inv.view_mut()), Err(RadarError::MatrixSingular));
        assert!(inv.iter().all(|&v| v == 9.0));
        assert_eq!(determinant(a.view()).unwrap(), 0.0);
    }

    #[test]
    fn complex_inverse_and_determinant() {
        let a = array![
            [Complex::new(2.0, 1.0), Complex::new(0.0, -1.0)],
            [Complex::new(1.0, 0.0), Complex::new(3.0, 0.0)]
        ];
        let det = determinant(a.view()).unwrap();
        // (2+i)·3 − (−i)·1 = 6 + 4i
        assert!((det - Complex::new(6.0, 4.0)).norm() < 1e-5);

        let mut inv = Array2::zeros((2, 2));
        invert(a.view(), inv.view_mut()).unwrap();
        let mut product = Array2::zeros((2, 2));
        mat_mul(a.view(), inv.view(), product.view_mut()).unwrap();
        assert!((product[[0, 0]] - Complex::new(1.0, 0.0)).norm() < 1e-5);
        assert!(product[[0, 1]].norm() < 1e-5);
    }

    #[test]
    fn workspace_is_reused_across_inversions() {
        let mut workspace = LuWorkspace::<Float>::new(2);
        let mut inv = Array2::<Float>::zeros((2, 2));
        invert_with(array![[2.0, 0.0], [0.0, 4.0]].view(), inv.view_mut(), &mut workspace).unwrap();
        let expected: Array2<Float> = array![[0.5, 0.0], [0.0, 0.25]];
        assert_eq!(inv, expected);
        invert_with(array![[0.0, 1.0], [1.0, 0.0]].view(), inv.view_mut(), &mut workspace).unwrap();
        let expected: Array2<Float> = array![[0.0, 1.0], [1.0, 0.0]];
        assert_eq!(inv, expected);

        let mut wrong = LuWorkspace::<Float>::new(3);
        assert!(matches!(
            invert_with(array![[1.0, 0.0], [0.0, 1.0]].view(), inv.view_mut(), &mut wrong),
            Err(RadarError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn determinant_tracks_row_swaps() {
        let a: Array2<Float> = array![[0.0, 1.0], [1.0, 0.0]];
        assert_eq!(determinant(a.view()).unwrap(), -1.0);
    }

    #[test]
    fn cholesky_reads_lower_triangle_only() {
        let a: Array2<Float> = array![[4.0, 99.0, 99.0], [12.0, 37.0, 99.0], [-16.0, -43.0, 98.0]];
        let mut l = Array2::zeros((3, 3));
        cholesky(a.view(), l.view_mut()).unwrap();
        let expected = array![[2.0, 0.0, 0.0], [6.0, 1.0, 0.0], [-8.0, 5.0, 3.0]];
        for (v, e) in l.iter().zip(expected.iter()) {
            assert!((v - e).abs() < 1e-4);
        }
    }

    #[test]
    fn cholesky_rejects_indefinite_matrix() {
        let a: Array2<Float> = array![[1.0, 0.0], [2.0, 1.0]];
        let mut l = Array2::zeros((2, 2));
        assert_eq!(cholesky(a.view(), l.view_mut()), Err(RadarError::MatrixNotPositiveDefinite));
    }

    #[test]
    fn complex_cholesky_of_hermitian_matrix() {
        let a = array![
            [Complex::new(4.0, 0.0), Complex::new(0.0, 0.0)],
            [Complex::new(2.0, 2.0), Complex::new(6.0, 0.0)]
        ];
        let mut l = Array2::zeros((2, 2));
        cholesky(a.view(), l.view_mut()).unwrap();
        assert!((l[[0, 0]] - Complex::new(2.0, 0.0)).norm() < 1e-5);
        assert!((l[[1, 0]] - Complex::new(1.0, 1.0)).norm() < 1e-5);
        assert!((l[[1, 1]] - Complex::new(2.0, 0.0)).norm() < 1e-5);
    }
}
