//! Owned containers and strided views used across the pipeline.
//!
//! Owners are plain `ndarray` arrays; views borrow from their parent so a
//! view can never outlive or free the parent buffer.

pub mod ops;
pub mod views;

use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::prelude::{Complex, Float};

pub type VectorR = Array1<Float>;
pub type VectorC = Array1<Complex>;
pub type MatrixR = Array2<Float>;
pub type MatrixC = Array2<Complex>;
pub type CubeR = Array3<Float>;
pub type CubeC = Array3<Complex>;

pub use ops::*;
pub use views::*;

/// Complex number in polar form, angle in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Polar {
    pub radius: Float,
    pub angle: Float,
}

impl Polar {
    pub fn new(radius: Float, angle: Float) -> Self {
        Self { radius, angle }
    }

    pub fn from_complex(value: Complex) -> Self {
        let (radius, angle) = value.to_polar();
        Self { radius, angle }
    }

    pub fn to_complex(self) -> Complex {
        Complex::from_polar(self.radius, self.angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn clone_round_trip_keeps_shape_and_values() {
        let vector: VectorC = array![Complex::new(1.0, -2.0), Complex::new(0.5, 0.25)];
        let matrix: MatrixR = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let cube: CubeR = Array3::from_shape_fn((2, 3, 4), |(r, c, s)| (r * 12 + c * 4 + s) as Float);

        let vector_copy = {
            let tmp = vector.clone();
            tmp.clone()
        };
        let matrix_copy = {
            let tmp = matrix.clone();
            tmp.clone()
        };
        let cube_copy = {
            let tmp = cube.clone();
            tmp.clone()
        };

        assert_eq!(vector_copy, vector);
        assert_eq!(matrix_copy.shape(), matrix.shape());
        assert_eq!(matrix_copy, matrix);
        assert_eq!(cube_copy, cube);
    }

    #[test]
    fn polar_conversion_is_consistent() {
        let value = Complex::new(0.0, 2.0);
        let polar = Polar::from_complex(value);
        assert!((polar.radius - 2.0).abs() < 1e-6);
        assert!((polar.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        let back = polar.to_complex();
        assert!((back - value).norm() < 1e-6);
    }
}
