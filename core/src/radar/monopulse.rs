//! Phase-comparison angle estimation from two receive channels.
//!
//! Experimental: construction from geometry, scalar and vector runs.

use ndarray::{ArrayView1, ArrayViewMut1};

use crate::prelude::{Complex, Float, RadarError, RadarResult};

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleMonopulse {
    wavelength_m: Float,
    antenna_spacing_m: Float,
}

fn require_positive(what: &str, value: Float) -> RadarResult<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(RadarError::ArgumentOutOfBounds(format!("{} {}", what, value)))
    }
}

impl AngleMonopulse {
    pub fn new(wavelength_m: Float, antenna_spacing_m: Float) -> RadarResult<Self> {
        require_positive("wavelength", wavelength_m)?;
        require_positive("antenna spacing", antenna_spacing_m)?;
        Ok(Self {
            wavelength_m,
            antenna_spacing_m,
        })
    }

    pub fn wavelength_m(&self) -> Float {
        self.wavelength_m
    }

    pub fn set_wavelength_m(&mut self, wavelength_m: Float) -> RadarResult<()> {
        require_positive("wavelength", wavelength_m)?;
        self.wavelength_m = wavelength_m;
        Ok(())
    }

    pub fn antenna_spacing_m(&self) -> Float {
        self.antenna_spacing_m
    }

    pub fn set_antenna_spacing_m(&mut self, antenna_spacing_m: Float) -> RadarResult<()> {
        require_positive("antenna spacing", antenna_spacing_m)?;
        self.antenna_spacing_m = antenna_spacing_m;
        Ok(())
    }

    /// Angle in degrees, positive when `rx2` lags `rx1` in phase.
    pub fn run(&self, rx1: Complex, rx2: Complex) -> Float {
        let mut d_phi = rx1.arg() - rx2.arg();
        if d_phi <= -PI {
            d_phi += 2.0 * PI;
        } else if d_phi > PI {
            d_phi -= 2.0 * PI;
        }
        let sine = d_phi * self.wavelength_m / (2.0 * PI * self.antenna_spacing_m);
        sine.clamp(-1.0, 1.0).asin().to_degrees()
    }

    /// Element-wise [`run`](Self::run); `output` may be longer than the inputs.
    pub fn run_vector(
        &self,
        rx1: ArrayView1<Complex>,
        rx2: ArrayView1<Complex>,
        mut output: ArrayViewMut1<Float>,
    ) -> RadarResult<()> {
        if rx1.len() != rx2.len() || output.len() < rx1.len() {
            return Err(RadarError::DimensionMismatch(format!(
                "monopulse inputs {} and {}, output {}",
                rx1.len(),
                rx2.len(),
                output.len()
            )));
        }
        for ((out, &a), &b) in output.iter_mut().zip(rx1.iter()).zip(rx2.iter()) {
            *out = self.run(a, b);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    const WAVELENGTH: Float = 0.004_915;

    fn wave(angle_deg: Float) -> (Complex, Complex) {
        let d_phi = PI * angle_deg.to_radians().sin();
        (Complex::from_polar(2.0, 0.4), Complex::from_polar(1.5, 0.4 - d_phi))
    }

    #[test]
    fn recovers_angle_at_half_wavelength() {
        let monopulse = AngleMonopulse::new(WAVELENGTH, WAVELENGTH / 2.0).unwrap();
        for &angle in &[-60.0, -20.0, 0.0, 15.0, 45.0, 80.0] {
            let (rx1, rx2) = wave(angle);
            assert!((monopulse.run(rx1, rx2) - angle).abs() < 1e-2, "{}", angle);
        }
    }

    #[test]
    fn phase_wraps_into_principal_range() {
        let monopulse = AngleMonopulse::new(WAVELENGTH, WAVELENGTH / 2.0).unwrap();
        // 3.0 - (-3.0) wraps to 6 - 2π
        let angle = monopulse.run(Complex::from_polar(1.0, 3.0), Complex::from_polar(1.0, -3.0));
        let expected = ((6.0 - 2.0 * PI) / PI).asin().to_degrees();
        assert!((angle - expected).abs() < 1e-3);
    }

    #[test]
    fn vector_form_and_setters() {
        let mut monopulse = AngleMonopulse::new(WAVELENGTH, WAVELENGTH / 2.0).unwrap();
        let (a, b) = wave(30.0);
        let rx1 = array![a, a];
        let rx2 = array![b, a];
        let mut output = Array1::zeros(3);
        monopulse.run_vector(rx1.view(), rx2.view(), output.view_mut()).unwrap();
        assert!((output[0] - 30.0).abs() < 1e-2);
        assert!(output[1].abs() < 1e-4);
        let mut short = Array1::zeros(1);
        assert!(monopulse.run_vector(rx1.view(), rx2.view(), short.view_mut()).is_err());

        assert!(monopulse.set_wavelength_m(-1.0).is_err());
        monopulse.set_antenna_spacing_m(WAVELENGTH).unwrap();
        assert_eq!(monopulse.antenna_spacing_m(), WAVELENGTH);
        assert_eq!(monopulse.wavelength_m(), WAVELENGTH);
        assert!(AngleMonopulse::new(0.0, 1.0).is_err());
    }
}
