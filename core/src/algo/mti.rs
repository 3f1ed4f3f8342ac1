//! Moving target indicator filters.
//!
//! Each element keeps an exponentially averaged history `h`. A run emits
//! `y = x - h` and then updates `h = alpha * x + (1 - alpha) * h`. The history
//! starts at zero unless it is seeded.

use std::ops::{Add, Mul, Sub};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Zip};
use rustfft::num_traits::Zero;

use crate::prelude::{ensure_shape, Complex, Float, RadarError, RadarResult};

fn check_alpha(alpha: Float) -> RadarResult<()> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(RadarError::ArgumentOutOfBounds(format!(
            "mti coefficient {} outside [0, 1]",
            alpha
        )));
    }
    Ok(())
}

/// Element type an MTI history can hold.
pub trait MtiSample: Copy + Zero + Add<Output = Self> + Sub<Output = Self> + Mul<Float, Output = Self> {}

impl MtiSample for Float {}
impl MtiSample for Complex {}

/// Slow-time MTI over a real vector, typically one range profile per frame.
#[derive(Debug, Clone)]
pub struct Mti {
    alpha: Float,
    history: Array1<Float>,
}

impl Mti {
    pub fn new(alpha: Float, length: usize) -> RadarResult<Self> {
        check_alpha(alpha)?;
        if length == 0 {
            return Err(RadarError::ArgumentInvalid("mti length is zero".into()));
        }
        Ok(Self {
            alpha,
            history: Array1::zeros(length),
        })
    }

    pub fn alpha(&self) -> Float {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: Float) -> RadarResult<()> {
        check_alpha(alpha)?;
        self.alpha = alpha;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn history(&self) -> ArrayView1<'_, Float> {
        self.history.view()
    }

    /// Loads `input` as the clutter estimate.
    pub fn seed(&mut self, input: ArrayView1<Float>) -> RadarResult<()> {
        ensure_shape("mti seed", self.history.shape(), input.shape())?;
        self.history.assign(&input);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.history.fill(0.0);
    }

    pub fn run(&mut self, input: ArrayView1<Float>, mut output: ArrayViewMut1<Float>) -> RadarResult<()> {
        ensure_shape("mti input", self.history.shape(), input.shape())?;
        ensure_shape("mti output", self.history.shape(), output.shape())?;
        let alpha = self.alpha;
        Zip::from(&mut output)
            .and(&mut self.history)
            .and(&input)
            .for_each(|y, h, &x| {
                *y = x - *h;
                *h = *h + alpha * *y;
            });
        Ok(())
    }
}

/// Two-dimensional MTI, applied cell by cell to a range-Doppler (or any)
/// matrix that keeps its shape from frame to frame.
#[derive(Debug, Clone)]
pub struct Mti2d<T> {
    alpha: Float,
    history: Array2<T>,
}

pub type Mti2dR = Mti2d<Float>;
pub type Mti2dC = Mti2d<Complex>;

impl<T: MtiSample> Mti2d<T> {
    pub fn new(alpha: Float, rows: usize, cols: usize) -> RadarResult<Self> {
        check_alpha(alpha)?;
        if rows == 0 || cols == 0 {
            return Err(RadarError::ArgumentInvalid(format!(
                "mti shape {}x{} is empty",
                rows, cols
            )));
        }
        Ok(Self {
            alpha,
            history: Array2::zeros((rows, cols)),
        })
    }

    pub fn alpha(&self) -> Float {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: Float) -> RadarResult<()> {
        check_alpha(alpha)?;
        self.alpha = alpha;
        Ok(())
    }

    pub fn shape(&self) -> (usize, usize) {
        self.history.dim()
    }

    pub fn history(&self) -> ArrayView2<'_, T> {
        self.history.view()
    }

    pub fn seed(&mut self, input: ArrayView2<T>) -> RadarResult<()> {
        ensure_shape("mti seed", self.history.shape(), input.shape())?;
        self.history.assign(&input);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.history.fill(T::zero());
    }

    pub fn run(&mut self, input: ArrayView2<T>, mut output: ArrayViewMut2<T>) -> RadarResult<()> {
        ensure_shape("mti input", self.history.shape(), input.shape())?;
        ensure_shape("mti output", self.history.shape(), output.shape())?;
        let alpha = self.alpha;
        Zip::from(&mut output)
            .and(&mut self.history)
            .and(&input)
            .for_each(|y, h, &x| {
                *y = x - *h;
                *h = x * alpha + *h * (1.0 - alpha);
            });
        Ok(())
    }

    /// Filters `data` in place.
    pub fn run_in_place(&mut self, mut data: ArrayViewMut2<T>) -> RadarResult<()> {
        ensure_shape("mti data", self.history.shape(), data.shape())?;
        let alpha = self.alpha;
        Zip::from(&mut data).and(&mut self.history).for_each(|v, h| {
            let x = *v;
            *v = x - *h;
            *h = x * alpha + *h * (1.0 - alpha);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_constant(mti: &mut Mti2dR, frames: usize) -> Array2<Float> {
        let input = Array2::from_elem((4, 4), 1.0);
        let mut output = Array2::zeros((4, 4));
        for _ in 0..frames {
            mti.run(input.view(), output.view_mut()).unwrap();
        }
        output
    }

    #[test]
    fn constant_input_decays_geometrically() {
        let mut mti = Mti2dR::new(0.3, 4, 4).unwrap();
        let first = run_constant(&mut mti, 1);
        assert!(first.iter().all(|&v| (v - 1.0).abs() < 1e-6));
        let second = run_constant(&mut mti, 1);
        assert!(second.iter().all(|&v| (v - 0.7).abs() < 1e-6));
        let third = run_constant(&mut mti, 1);
        assert!(third.iter().all(|&v| (v - 0.49).abs() < 1e-6));
        let later = run_constant(&mut mti, 18);
        assert!(later.iter().all(|&v| v.abs() < 1e-3));
    }

    #[test]
    fn converges_within_predicted_frames() {
        let eps: Float = 1e-3;
        for &alpha in &[0.1, 0.3, 0.5, 0.9, 1.0] {
            let frames = if alpha == 1.0 {
                1
            } else {
                (eps.ln() / (1.0 as Float - alpha).ln()).ceil() as usize
            };
            let mut mti = Mti2dR::new(alpha, 4, 4).unwrap();
            run_constant(&mut mti, frames);
            let next = run_constant(&mut mti, 1);
            assert!(
                next.iter().all(|&v| v.abs() < eps * 1.01),
                "alpha {} after {} frames",
                alpha,
                frames
            );
        }
    }

    #[test]
    fn zero_alpha_cancels_first_frame_forever() {
        let mut mti = Mti2dC::new(0.0, 2, 2).unwrap();
        let first = Array2::from_elem((2, 2), Complex::new(1.0, 1.0));
        mti.seed(first.view()).unwrap();
        let mut output = Array2::zeros((2, 2));
        let moved = Array2::from_elem((2, 2), Complex::new(3.0, 1.0));
        for _ in 0..5 {
            mti.run(moved.view(), output.view_mut()).unwrap();
        }
        assert!(output.iter().all(|v| (v - Complex::new(2.0, 0.0)).norm() < 1e-6));
    }

    #[test]
    fn in_place_matches_out_of_place() {
        let mut a = Mti2dC::new(0.4, 2, 3).unwrap();
        let mut b = Mti2dC::new(0.4, 2, 3).unwrap();
        let input = Array2::from_shape_fn((2, 3), |(r, c)| Complex::new(r as Float, c as Float));
        let mut output = Array2::zeros((2, 3));
        for _ in 0..3 {
            a.run(input.view(), output.view_mut()).unwrap();
            let mut data = input.clone();
            b.run_in_place(data.view_mut()).unwrap();
            assert_eq!(data, output);
        }
    }

    #[test]
    fn one_dimensional_update_and_errors() {
        let mut mti = Mti::new(0.5, 3).unwrap();
        let input = Array1::from(vec![2.0, 2.0, 2.0]);
        let mut output = Array1::zeros(3);
        mti.run(input.view(), output.view_mut()).unwrap();
        mti.run(input.view(), output.view_mut()).unwrap();
        assert!(output.iter().all(|&v| (v - 1.0).abs() < 1e-6));
        mti.reset();
        assert!(mti.history().iter().all(|&v| v == 0.0));

        assert!(Mti::new(1.5, 3).is_err());
        assert!(mti.set_alpha(-0.1).is_err());
        assert_eq!(mti.alpha(), 0.5);
        let wrong = Array1::zeros(4);
        assert!(mti.run(wrong.view(), output.view_mut()).is_err());
        assert!(Mti2dR::new(0.5, 0, 4).is_err());
    }
}
