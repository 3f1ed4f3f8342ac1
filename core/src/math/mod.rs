pub mod fft;
pub mod matrix;
pub mod signal;
pub mod stats;
pub mod window;

pub use fft::{fft_shift, fft_shift_in_place, frequency_axis, max_input_len, AxisSpec, FftHelper, FftType};
pub use matrix::{cholesky, determinant, invert, invert_with, LuWorkspace};
pub use signal::{ButterworthType, CorrelationMode, Filter, Hilbert};
pub use stats::{MedianFilter, StatsHelper};
pub use window::{WindowConfig, WindowType};
