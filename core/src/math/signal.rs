//! Linear filtering, Butterworth design, Hilbert transform and correlation.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::math::window::{self, WindowConfig, WindowType};
use crate::prelude::{ensure_shape, Complex, Float, RadarError, RadarResult};

pub const HILBERT_ORDER_MAX: usize = 50;
pub const HILBERT_ORDER_DEFAULT: usize = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButterworthType {
    Lowpass,
    Highpass,
    Bandpass,
}

/// IIR/FIR filter `y[n] = (1/a0)(Σ b_k x[n-k] − Σ_{k≥1} a_k y[n-k])`.
///
/// Each row of the state matrices belongs to one independent channel, so a
/// matrix input filters every row with its own history.
#[derive(Debug, Clone)]
pub struct Filter {
    b: Vec<Float>,
    a: Vec<Float>,
    scale: Float,
    state_b: Array2<Float>,
    state_a: Array2<Float>,
}

impl Filter {
    pub fn new(b: &[Float], a: &[Float]) -> RadarResult<Self> {
        Self::with_channels(b, a, 1)
    }

    pub fn with_channels(b: &[Float], a: &[Float], channels: usize) -> RadarResult<Self> {
        if b.is_empty() || a.is_empty() {
            return Err(RadarError::ArgumentInvalid("filter needs at least one b and one a tap".into()));
        }
        if a[0] == 0.0 {
            return Err(RadarError::ArgumentInvalid("leading feedback tap a0 is zero".into()));
        }
        if channels == 0 {
            return Err(RadarError::ArgumentInvalid("filter needs at least one channel".into()));
        }
        Ok(Self {
            b: b.to_vec(),
            a: a.to_vec(),
            scale: 1.0 / a[0],
            state_b: Array2::zeros((channels, b.len())),
            state_a: Array2::zeros((channels, a.len())),
        })
    }

    /// Butterworth design; `cutoff2_hz` is only used for band-pass.
    pub fn butterworth(
        kind: ButterworthType,
        order: usize,
        sampling_frequency_hz: Float,
        cutoff1_hz: Float,
        cutoff2_hz: Float,
    ) -> RadarResult<Self> {
        let (b, a) = match kind {
            ButterworthType::Lowpass => butterworth_lowpass(order, sampling_frequency_hz, cutoff1_hz)?,
            ButterworthType::Highpass => butterworth_highpass(order, sampling_frequency_hz, cutoff1_hz)?,
            ButterworthType::Bandpass => {
                butterworth_bandpass(order, sampling_frequency_hz, cutoff1_hz, cutoff2_hz)?
            }
        };
        Self::new(&b, &a)
    }

    pub fn feedforward(&self) -> &[Float] {
        &self.b
    }

    pub fn feedback(&self) -> &[Float] {
        &self.a
    }

    pub fn channels(&self) -> usize {
        self.state_a.nrows()
    }

    pub fn reset(&mut self) {
        self.state_a.fill(0.0);
        self.state_b.fill(0.0);
    }

    /// Changes the channel count; all histories are cleared.
    pub fn resize(&mut self, channels: usize) -> RadarResult<()> {
        if channels == 0 {
            return Err(RadarError::ArgumentInvalid("filter needs at least one channel".into()));
        }
        self.state_b = Array2::zeros((channels, self.b.len()));
        self.state_a = Array2::zeros((channels, self.a.len()));
        Ok(())
    }

    /// Filters a single signal using the history of channel 0.
    pub fn run(&mut self, input: ArrayView1<Float>, output: ArrayViewMut1<Float>) -> RadarResult<()> {
        ensure_shape("filter output", input.shape(), output.shape())?;
        self.run_channel(0, input, output);
        Ok(())
    }

    /// Filters each row of `input` with the history of the same channel.
    pub fn run_rows(&mut self, input: ArrayView2<Float>, mut output: ArrayViewMut2<Float>) -> RadarResult<()> {
        ensure_shape("filter output", input.shape(), output.shape())?;
        if input.nrows() > self.channels() {
            return Err(RadarError::ArgumentInvalid(format!(
                "{} rows but only {} filter channels",
                input.nrows(),
                self.channels()
            )));
        }
        for (row, (x, y)) in input.rows().into_iter().zip(output.rows_mut()).enumerate() {
            self.run_channel(row, x, y);
        }
        Ok(())
    }

    fn run_channel(&mut self, channel: usize, input: ArrayView1<Float>, mut output: ArrayViewMut1<Float>) {
        let mut xs = self.state_b.row_mut(channel);
        let mut ys = self.state_a.row_mut(channel);
        let nb = xs.len();
        let na = ys.len();
        for (x, y) in input.iter().zip(output.iter_mut()) {
            for k in (1..nb).rev() {
                xs[k] = xs[k - 1];
            }
            xs[0] = *x;
            let mut acc: Float = self.b.iter().zip(xs.iter()).map(|(b, x)| b * x).sum();
            for k in 1..na {
                acc -= self.a[k] * ys[k - 1];
            }
            let value = acc * self.scale;
            for k in (1..na).rev() {
                ys[k] = ys[k - 1];
            }
            ys[0] = value;
            *y = value;
        }
    }
}

fn butterworth_poles(order: usize) -> Vec<Complex64> {
    (1..=order)
        .map(|k| {
            let theta = (2 * k - 1) as f64 * std::f64::consts::PI / (2 * order) as f64;
            Complex64::new(-theta.sin(), theta.cos())
        })
        .collect()
}

/// Coefficients of `(1 + a·x)^n`, lowest power first.
fn binomial(n: usize, a: f64) -> Vec<f64> {
    let mut result = vec![1.0; n + 1];
    let mut p = 1.0;
    let mut ak = a;
    for k in 1..=n {
        p *= (n + 1 - k) as f64 / k as f64;
        result[k] = p * ak;
        ak *= a;
    }
    result
}

/// Monic polynomial with the given roots, highest power first.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * root;
        }
        coeffs = next;
    }
    coeffs
}

fn bilinear(poles: &[Complex64], fs: f64) -> Vec<Complex64> {
    poles
        .iter()
        .map(|&p| {
            let x = p / (2.0 * fs);
            (1.0 + x) / (1.0 - x)
        })
        .collect()
}

fn prewarp(frequency: f64, fs: f64) -> f64 {
    fs / std::f64::consts::PI * (std::f64::consts::PI * frequency / fs).tan()
}

fn to_float(values: impl IntoIterator<Item = f64>) -> Vec<Float> {
    values.into_iter().map(|v| v as Float).collect()
}

fn low_high_pass(order: usize, fs: Float, cutoff: Float, highpass: bool) -> RadarResult<(Vec<Float>, Vec<Float>)> {
    if order == 0 {
        return Err(RadarError::ArgumentInvalid("butterworth order is zero".into()));
    }
    if fs <= 0.0 || cutoff <= 0.0 || 2.0 * cutoff >= fs {
        return Err(RadarError::ArgumentInvalid(format!(
            "cutoff {} Hz must lie in (0, fs/2) for fs {} Hz",
            cutoff, fs
        )));
    }
    let fs = fs as f64;
    let fc = prewarp(cutoff as f64, fs);
    let omega = 2.0 * std::f64::consts::PI * fc;

    let analog: Vec<Complex64> = butterworth_poles(order)
        .into_iter()
        .map(|p| if highpass { p * omega } else { Complex64::new(omega, 0.0) / p })
        .collect();
    let digital = bilinear(&analog, fs);

    let mut b = binomial(order, if highpass { -1.0 } else { 1.0 });
    let a: Vec<f64> = poly(&digital).iter().map(|c| c.re).collect();

    let z0 = Complex64::new(if highpass { -1.0 } else { 1.0 }, 0.0);
    let product = digital
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (z0 - p));
    let mut gain = product.re / 2f64.powi(order as i32);
    if highpass && order % 2 == 1 {
        gain = -gain;
    }
    b.iter_mut().for_each(|v| *v *= gain);

    Ok((to_float(b), to_float(a)))
}

/// Returns `(b, a)` of an order-`order` low-pass with -3 dB point at `cutoff_hz`.
pub fn butterworth_lowpass(order: usize, sampling_frequency_hz: Float, cutoff_hz: Float) -> RadarResult<(Vec<Float>, Vec<Float>)> {
    low_high_pass(order, sampling_frequency_hz, cutoff_hz, false)
}

pub fn butterworth_highpass(order: usize, sampling_frequency_hz: Float, cutoff_hz: Float) -> RadarResult<(Vec<Float>, Vec<Float>)> {
    low_high_pass(order, sampling_frequency_hz, cutoff_hz, true)
}

/// Band-pass of `2·order` poles; `b` and `a` have `2·order + 1` taps.
pub fn butterworth_bandpass(
    order: usize,
    sampling_frequency_hz: Float,
    low_hz: Float,
    high_hz: Float,
) -> RadarResult<(Vec<Float>, Vec<Float>)> {
    if order == 0 {
        return Err(RadarError::ArgumentInvalid("butterworth order is zero".into()));
    }
    if low_hz <= 0.0 || low_hz >= high_hz || 2.0 * high_hz >= sampling_frequency_hz {
        return Err(RadarError::ArgumentInvalid(format!(
            "band [{}, {}] Hz invalid for fs {} Hz",
            low_hz, high_hz, sampling_frequency_hz
        )));
    }
    let fs = sampling_frequency_hz as f64;
    let f1 = prewarp(low_hz as f64, fs);
    let f2 = prewarp(high_hz as f64, fs);
    let f0 = (f1 * f2).sqrt();
    let alpha = (f2 - f1) / (2.0 * f0);
    let omega0 = 2.0 * std::f64::consts::PI * f0;

    let mut analog = Vec::with_capacity(2 * order);
    for p in butterworth_poles(order) {
        let x = p * alpha;
        let root = (Complex64::new(1.0, 0.0) - x * x).sqrt();
        analog.push((x + Complex64::i() * root) * omega0);
        analog.push((x - Complex64::i() * root) * omega0);
    }
    let digital = bilinear(&analog, fs);

    let mut b = vec![0.0; 2 * order + 1];
    for (k, value) in binomial(order, -1.0).into_iter().enumerate() {
        b[2 * k] = value;
    }
    let a: Vec<f64> = poly(&digital).iter().map(|c| c.re).collect();

    let centre = ((low_hz as f64) * (high_hz as f64)).sqrt();
    let theta = 2.0 * std::f64::consts::PI * centre / fs;
    let z = Complex64::new(theta.cos(), -theta.sin());
    let one = Complex64::new(1.0, 0.0);
    let numerator = ((one - z) * (one + z)).powu(order as u32);
    let denominator = digital.iter().fold(one, |acc, &p| acc * (z - p));
    let gain = (numerator / denominator).norm();
    if gain == 0.0 || !gain.is_finite() {
        return Err(RadarError::Internal("band-pass gain normalisation failed".into()));
    }
    b.iter_mut().for_each(|v| *v /= gain);

    Ok((to_float(b), to_float(a)))
}

/// Analytic-signal builder based on a Hamming-windowed FIR Hilbert kernel.
#[derive(Debug, Clone)]
pub struct Hilbert {
    filter: Filter,
    delay: usize,
    padded: Vec<Float>,
    quadrature: Vec<Float>,
}

impl Hilbert {
    /// `order` in `1..=50` gives `4·order − 1` taps; a known `signal_length`
    /// caps the kernel at roughly twice the signal length.
    pub fn new(order: usize, signal_length: Option<usize>) -> RadarResult<Self> {
        if order == 0 || order > HILBERT_ORDER_MAX {
            return Err(RadarError::ArgumentInvalid(format!(
                "hilbert order {} outside 1..={}",
                order, HILBERT_ORDER_MAX
            )));
        }
        let mut length = 4 * order - 1;
        if let Some(signal_length) = signal_length.filter(|&n| n > 0) {
            if length > 2 * signal_length {
                length = 2 * signal_length;
                length += 3 - length % 4;
            }
        }
        let taps = hilbert_taps(length)?;
        Ok(Self {
            filter: Filter::new(&taps, &[1.0])?,
            delay: length / 2,
            padded: Vec::new(),
            quadrature: Vec::new(),
        })
    }

    pub fn taps(&self) -> &[Float] {
        self.filter.feedforward()
    }

    /// Writes `input + j·H{input}` into `output`.
    pub fn run(&mut self, input: ArrayView1<Float>, mut output: ArrayViewMut1<Complex>) -> RadarResult<()> {
        ensure_shape("hilbert output", input.shape(), output.shape())?;
        let total = input.len() + self.delay;
        self.padded.clear();
        self.padded.extend(input.iter().copied());
        self.padded.resize(total, 0.0);
        self.quadrature.resize(total, 0.0);

        self.filter.reset();
        self.filter.run(
            ArrayView1::from(self.padded.as_slice()),
            ArrayViewMut1::from(self.quadrature.as_mut_slice()),
        )?;
        self.filter.reset();

        for (i, (out, &re)) in output.iter_mut().zip(input.iter()).enumerate() {
            *out = Complex::new(re, self.quadrature[i + self.delay]);
        }
        Ok(())
    }
}

fn hilbert_taps(length: usize) -> RadarResult<Vec<Float>> {
    let mut taps = vec![0.0 as Float; length];
    let centre = length / 2;
    let order = (length + 1) / 4;
    for i in 0..order {
        let index = 2 * i + 1;
        let value = 2.0 / (std::f64::consts::PI * index as f64);
        taps[centre + index] = value as Float;
        taps[centre - index] = -value as Float;
    }
    let hamming = window::build(&WindowConfig::new(WindowType::Hamming, length))?;
    taps.iter_mut().zip(hamming.iter()).for_each(|(t, w)| *t *= w);
    Ok(taps)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Output has the length of the first operand, centred on zero lag.
    Same,
    /// Output has `len(x) + len(y) − 1` lags.
    Full,
}

pub fn correlate(
    x: ArrayView1<Float>,
    y: ArrayView1<Float>,
    mode: CorrelationMode,
    mut output: ArrayViewMut1<Float>,
) -> RadarResult<()> {
    match mode {
        CorrelationMode::Same => {
            ensure_shape("correlation output", x.shape(), output.shape())?;
            let half = (y.len() / 2) as isize;
            for (i, out) in output.iter_mut().enumerate() {
                let i = i as isize;
                let start_y = (half - i).max(0) as usize;
                let start_x = (i - half).max(0) as usize;
                let len = y
                    .len()
                    .saturating_sub(start_y)
                    .min(x.len().saturating_sub(start_x));
                *out = (0..len).map(|k| y[start_y + k] * x[start_x + k]).sum();
            }
        }
        CorrelationMode::Full => {
            if x.is_empty() || y.is_empty() {
                return Err(RadarError::ArgumentInvalid("correlation of empty input".into()));
            }
            let len_out = x.len() + y.len() - 1;
            ensure_shape("correlation output", &[len_out], output.shape())?;
            for (k, out) in output.iter_mut().enumerate() {
                let start = (k + 1).saturating_sub(y.len());
                let end = x.len().min(k + 1);
                *out = (start..end)
                    .map(|l| x[l] * y[l + y.len() - k - 1])
                    .sum();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn frequency_response(b: &[Float], a: &[Float], normalized_freq: f64) -> f64 {
        let z = Complex64::from_polar(1.0, -2.0 * std::f64::consts::PI * normalized_freq);
        let eval = |coeffs: &[Float]| {
            coeffs
                .iter()
                .enumerate()
                .fold(Complex64::new(0.0, 0.0), |acc, (k, &c)| acc + z.powu(k as u32) * c as f64)
        };
        (eval(b) / eval(a)).norm()
    }

    #[test]
    fn fir_filter_is_a_moving_sum() {
        let mut filter = Filter::new(&[1.0, 1.0], &[1.0]).unwrap();
        let input = array![1.0, 2.0, 3.0, 4.0];
        let mut output = Array1::zeros(4);
        filter.run(input.view(), output.view_mut()).unwrap();
        assert_eq!(output.to_vec(), vec![1.0, 3.0, 5.0, 7.0]);

        // history carries over between calls until reset
        let mut next = Array1::zeros(1);
        filter.run(array![0.0].view(), next.view_mut()).unwrap();
        assert_eq!(next[0], 4.0);
        filter.reset();
        filter.run(array![0.0].view(), next.view_mut()).unwrap();
        assert_eq!(next[0], 0.0);
    }

    #[test]
    fn iir_filter_uses_feedback_and_a0_scale() {
        // y[n] = 0.5 (x[n] + 0.5 y[n-1]) with a = [2, -1]
        let mut filter = Filter::new(&[1.0], &[2.0, -1.0]).unwrap();
        let mut output = Array1::zeros(3);
        filter.run(array![2.0, 0.0, 0.0].view(), output.view_mut()).unwrap();
        assert_eq!(output.to_vec(), vec![1.0, 0.5, 0.25]);
    }

    #[test]
    fn matrix_rows_keep_independent_state() {
        let mut filter = Filter::with_channels(&[1.0, 1.0], &[1.0], 2).unwrap();
        let input = array![[1.0, 0.0], [5.0, 0.0]];
        let mut output = Array2::zeros((2, 2));
        filter.run_rows(input.view(), output.view_mut()).unwrap();
        assert_eq!(output, array![[1.0, 1.0], [5.0, 5.0]]);

        let too_many = Array2::zeros((3, 2));
        let mut out3 = Array2::zeros((3, 2));
        assert!(filter.run_rows(too_many.view(), out3.view_mut()).is_err());
    }

    #[test]
    fn butterworth_lowpass_has_unit_dc_gain_and_half_power_cutoff() {
        let (b, a) = butterworth_lowpass(2, 1000.0, 100.0).unwrap();
        assert_eq!(b.len(), 3);
        assert!((a[0] - 1.0).abs() < 1e-6);
        assert!((frequency_response(&b, &a, 0.0) - 1.0).abs() < 1e-4);
        let at_cutoff = frequency_response(&b, &a, 0.1);
        assert!((at_cutoff - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert!(frequency_response(&b, &a, 0.4) < 0.05);
    }

    #[test]
    fn butterworth_highpass_blocks_dc() {
        for order in 1..=3 {
            let (b, a) = butterworth_highpass(order, 1000.0, 100.0).unwrap();
            assert!(frequency_response(&b, &a, 0.0) < 1e-4);
            assert!((frequency_response(&b, &a, 0.5) - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn butterworth_bandpass_passes_centre() {
        let (b, a) = butterworth_bandpass(2, 1000.0, 80.0, 120.0).unwrap();
        assert_eq!(b.len(), 5);
        assert_eq!(a.len(), 5);
        let centre = (80.0f64 * 120.0).sqrt() / 1000.0;
        assert!((frequency_response(&b, &a, centre) - 1.0).abs() < 1e-3);
        assert!(frequency_response(&b, &a, 0.0) < 1e-4);
        assert!(frequency_response(&b, &a, 0.4) < 0.05);
    }

    #[test]
    fn butterworth_rejects_cutoff_above_nyquist() {
        assert!(butterworth_lowpass(2, 1000.0, 500.0).is_err());
        assert!(butterworth_highpass(0, 1000.0, 100.0).is_err());
        assert!(butterworth_bandpass(1, 1000.0, 200.0, 100.0).is_err());
        assert!(Filter::butterworth(ButterworthType::Lowpass, 2, 1000.0, 100.0, 0.0).is_ok());
    }

    #[test]
    fn hilbert_kernel_length_and_symmetry() {
        let hilbert = Hilbert::new(5, None).unwrap();
        let taps = hilbert.taps();
        assert_eq!(taps.len(), 19);
        assert_eq!(taps[9], 0.0);
        assert!((taps[10] + taps[8]).abs() < 1e-6);
        assert_eq!(taps[11], 0.0);

        let capped = Hilbert::new(50, Some(20)).unwrap();
        assert_eq!(capped.taps().len() % 4, 3);
        assert!(capped.taps().len() <= 43);
        assert!(Hilbert::new(0, None).is_err());
        assert!(Hilbert::new(51, None).is_err());
    }

    #[test]
    fn hilbert_turns_cosine_into_complex_exponential() {
        let n = 256;
        let freq = 0.1;
        let input = Array1::from_shape_fn(n, |i| (2.0 * std::f32::consts::PI * freq * i as Float).cos());
        let mut output = Array1::zeros(n);
        let mut hilbert = Hilbert::new(HILBERT_ORDER_DEFAULT, None).unwrap();
        hilbert.run(input.view(), output.view_mut()).unwrap();
        for i in 60..200 {
            let expected = (2.0 * std::f32::consts::PI * freq * i as Float).sin();
            assert!((output[i].im - expected).abs() < 0.05, "sample {}", i);
            assert_eq!(output[i].re, input[i]);
        }
    }

    #[test]
    fn correlation_modes() {
        let x = array![1.0, 2.0, 3.0];
        let y = array![0.0, 1.0, 0.5];
        let mut full = Array1::zeros(5);
        correlate(x.view(), y.view(), CorrelationMode::Full, full.view_mut()).unwrap();
        assert_eq!(full.to_vec(), vec![0.5, 2.0, 3.5, 3.0, 0.0]);

        let mut same = Array1::zeros(3);
        correlate(x.view(), y.view(), CorrelationMode::Same, same.view_mut()).unwrap();
        assert_eq!(same.to_vec(), vec![2.0, 3.5, 3.0]);

        let mut wrong = Array1::zeros(4);
        assert!(correlate(x.view(), y.view(), CorrelationMode::Full, wrong.view_mut()).is_err());
    }
}
