//! Shape-checked elementwise operations, reductions and matrix products.
//!
//! Every function validates shapes before touching the output, so an output
//! argument is left untouched on error.

use std::ops::{Add, Mul, Sub};

use ndarray::linalg::{general_mat_mul, general_mat_vec_mul};
use ndarray::{ArrayView, ArrayView1, ArrayView2, ArrayViewMut, ArrayViewMut1, ArrayViewMut2, Dimension, Zip};
use rustfft::num_traits::Zero;

use crate::prelude::{ensure_shape, Complex, Float, RadarError, RadarResult};

pub fn add<T, D>(a: ArrayView<T, D>, b: ArrayView<T, D>, mut out: ArrayViewMut<T, D>) -> RadarResult<()>
where
    T: Copy + Add<Output = T>,
    D: Dimension,
{
    ensure_shape("add rhs", a.shape(), b.shape())?;
    ensure_shape("add output", a.shape(), out.shape())?;
    Zip::from(&mut out).and(&a).and(&b).for_each(|o, &x, &y| *o = x + y);
    Ok(())
}

pub fn sub<T, D>(a: ArrayView<T, D>, b: ArrayView<T, D>, mut out: ArrayViewMut<T, D>) -> RadarResult<()>
where
    T: Copy + Sub<Output = T>,
    D: Dimension,
{
    ensure_shape("sub rhs", a.shape(), b.shape())?;
    ensure_shape("sub output", a.shape(), out.shape())?;
    Zip::from(&mut out).and(&a).and(&b).for_each(|o, &x, &y| *o = x - y);
    Ok(())
}

/// `out = scale * a`; `S` may be real or complex.
pub fn scale<T, S, D>(a: ArrayView<T, D>, scale: S, mut out: ArrayViewMut<T, D>) -> RadarResult<()>
where
    T: Copy + Mul<S, Output = T>,
    S: Copy,
    D: Dimension,
{
    ensure_shape("scale output", a.shape(), out.shape())?;
    Zip::from(&mut out).and(&a).for_each(|o, &x| *o = x * scale);
    Ok(())
}

/// Multiply-accumulate: `out = a + scale * b`.
pub fn mac<T, S, D>(
    a: ArrayView<T, D>,
    b: ArrayView<T, D>,
    scale: S,
    mut out: ArrayViewMut<T, D>,
) -> RadarResult<()>
where
    T: Copy + Add<Output = T> + Mul<S, Output = T>,
    S: Copy,
    D: Dimension,
{
    ensure_shape("mac rhs", a.shape(), b.shape())?;
    ensure_shape("mac output", a.shape(), out.shape())?;
    Zip::from(&mut out)
        .and(&a)
        .and(&b)
        .for_each(|o, &x, &y| *o = x + y * scale);
    Ok(())
}

/// Complex magnitude into a real container of the same shape.
pub fn abs<D: Dimension>(a: ArrayView<Complex, D>, mut out: ArrayViewMut<Float, D>) -> RadarResult<()> {
    ensure_shape("abs output", a.shape(), out.shape())?;
    Zip::from(&mut out).and(&a).for_each(|o, x| *o = x.norm());
    Ok(())
}

/// Squared magnitude `re² + im²`.
pub fn sqnorm<D: Dimension>(a: ArrayView<Complex, D>, mut out: ArrayViewMut<Float, D>) -> RadarResult<()> {
    ensure_shape("sqnorm output", a.shape(), out.shape())?;
    Zip::from(&mut out).and(&a).for_each(|o, x| *o = x.norm_sqr());
    Ok(())
}

pub fn sum<T, D>(a: ArrayView<T, D>) -> T
where
    T: Copy + Add<Output = T> + Zero,
    D: Dimension,
{
    a.iter().fold(T::zero(), |acc, &x| acc + x)
}

/// Element types with a squared magnitude.
pub trait SquaredMagnitude: Copy {
    fn squared_magnitude(self) -> Float;
}

impl SquaredMagnitude for Float {
    fn squared_magnitude(self) -> Float {
        self * self
    }
}

impl SquaredMagnitude for Complex {
    fn squared_magnitude(self) -> Float {
        self.norm_sqr()
    }
}

/// Sum of squared magnitudes; works for real and complex elements.
pub fn sum_sqr<T, D>(a: ArrayView<T, D>) -> Float
where
    T: SquaredMagnitude,
    D: Dimension,
{
    a.iter().map(|&x| x.squared_magnitude()).sum()
}

pub fn mean<T, D>(a: ArrayView<T, D>) -> T
where
    T: Copy + Add<Output = T> + Mul<Float, Output = T> + Zero,
    D: Dimension,
{
    if a.is_empty() {
        return T::zero();
    }
    sum(a.view()) * (1.0 / a.len() as Float)
}

/// Population variance of a real container.
pub fn var<D: Dimension>(a: ArrayView<Float, D>) -> Float {
    if a.is_empty() {
        return 0.0;
    }
    let m = mean(a.view());
    a.iter().map(|&x| (x - m) * (x - m)).sum::<Float>() / a.len() as Float
}

/// Largest element and its flat (row-major) index.
pub fn max<D: Dimension>(a: ArrayView<Float, D>) -> Option<(usize, Float)> {
    a.iter()
        .copied()
        .enumerate()
        .fold(None, |best, (idx, value)| match best {
            Some((_, current)) if current >= value => best,
            _ => Some((idx, value)),
        })
}

fn check_product(a: (usize, usize), b: (usize, usize), out: (usize, usize)) -> RadarResult<()> {
    if a.1 != b.0 {
        return Err(RadarError::DimensionMismatch(format!(
            "inner dimensions {} and {}",
            a.1, b.0
        )));
    }
    ensure_shape("product output", &[a.0, b.1], &[out.0, out.1])
}

/// `out = a · b` for any element type ndarray can multiply.
pub fn mat_mul<T>(a: ArrayView2<T>, b: ArrayView2<T>, mut out: ArrayViewMut2<T>) -> RadarResult<()>
where
    T: ndarray::LinalgScalar,
{
    check_product(a.dim(), b.dim(), out.dim())?;
    general_mat_mul(T::one(), &a, &b, T::zero(), &mut out);
    Ok(())
}

/// `out = a · bᵀ`.
pub fn mat_mul_transpose<T>(a: ArrayView2<T>, b: ArrayView2<T>, mut out: ArrayViewMut2<T>) -> RadarResult<()>
where
    T: ndarray::LinalgScalar,
{
    let bt = b.t();
    check_product(a.dim(), bt.dim(), out.dim())?;
    general_mat_mul(T::one(), &a, &bt, T::zero(), &mut out);
    Ok(())
}

/// `out = a · bᴴ` for complex matrices.
pub fn mat_mul_conj_transpose(
    a: ArrayView2<Complex>,
    b: ArrayView2<Complex>,
    mut out: ArrayViewMut2<Complex>,
) -> RadarResult<()> {
    check_product(a.dim(), (b.ncols(), b.nrows()), out.dim())?;
    for ((i, j), o) in out.indexed_iter_mut() {
        *o = a
            .row(i)
            .iter()
            .zip(b.row(j).iter())
            .fold(Complex::new(0.0, 0.0), |acc, (&x, &y)| acc + x * y.conj());
    }
    Ok(())
}

/// `out = aᴴ · b` for complex matrices.
pub fn mat_conj_transpose_mul(
    a: ArrayView2<Complex>,
    b: ArrayView2<Complex>,
    mut out: ArrayViewMut2<Complex>,
) -> RadarResult<()> {
    check_product((a.ncols(), a.nrows()), b.dim(), out.dim())?;
    for ((i, j), o) in out.indexed_iter_mut() {
        *o = a
            .column(i)
            .iter()
            .zip(b.column(j).iter())
            .fold(Complex::new(0.0, 0.0), |acc, (&x, &y)| acc + x.conj() * y);
    }
    Ok(())
}

/// Complex matrix times real matrix.
pub fn mat_mul_cr(a: ArrayView2<Complex>, b: ArrayView2<Float>, mut out: ArrayViewMut2<Complex>) -> RadarResult<()> {
    check_product(a.dim(), b.dim(), out.dim())?;
    for ((i, j), o) in out.indexed_iter_mut() {
        *o = a
            .row(i)
            .iter()
            .zip(b.column(j).iter())
            .fold(Complex::new(0.0, 0.0), |acc, (&x, &y)| acc + x * y);
    }
    Ok(())
}

/// Real matrix times complex matrix.
pub fn mat_mul_rc(a: ArrayView2<Float>, b: ArrayView2<Complex>, mut out: ArrayViewMut2<Complex>) -> RadarResult<()> {
    check_product(a.dim(), b.dim(), out.dim())?;
    for ((i, j), o) in out.indexed_iter_mut() {
        *o = a
            .row(i)
            .iter()
            .zip(b.column(j).iter())
            .fold(Complex::new(0.0, 0.0), |acc, (&x, &y)| acc + y * x);
    }
    Ok(())
}

/// `out = a · x`.
pub fn mat_vec<T>(a: ArrayView2<T>, x: ArrayView1<T>, mut out: ArrayViewMut1<T>) -> RadarResult<()>
where
    T: ndarray::LinalgScalar,
{
    if a.ncols() != x.len() {
        return Err(RadarError::DimensionMismatch(format!(
            "matrix has {} columns, vector {} elements",
            a.ncols(),
            x.len()
        )));
    }
    ensure_shape("matrix-vector output", &[a.nrows()], out.shape())?;
    general_mat_vec_mul(T::one(), &a, &x, T::zero(), &mut out);
    Ok(())
}

/// Complex matrix times real vector.
pub fn mat_vec_cr(a: ArrayView2<Complex>, x: ArrayView1<Float>, mut out: ArrayViewMut1<Complex>) -> RadarResult<()> {
    if a.ncols() != x.len() {
        return Err(RadarError::DimensionMismatch(format!(
            "matrix has {} columns, vector {} elements",
            a.ncols(),
            x.len()
        )));
    }
    ensure_shape("matrix-vector output", &[a.nrows()], out.shape())?;
    for (row, o) in a.rows().into_iter().zip(out.iter_mut()) {
        *o = row
            .iter()
            .zip(x.iter())
            .fold(Complex::new(0.0, 0.0), |acc, (&m, &v)| acc + m * v);
    }
    Ok(())
}
