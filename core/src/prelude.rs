use ndarray::ArrayView3;

/// Floating point type shared by the whole pipeline.
pub type Float = f32;

/// Complex sample type built on [`Float`].
pub type Complex = num_complex::Complex<Float>;

/// Speed of light in m/s.
pub const LIGHT_SPEED_M_S: Float = 299_792_458.0;

/// Common error type for every processing block and the device boundary.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RadarError {
    #[error("argument is missing: {0}")]
    ArgumentNull(String),
    #[error("argument is invalid: {0}")]
    ArgumentInvalid(String),
    #[error("argument is out of bounds: {0}")]
    ArgumentOutOfBounds(String),
    #[error("index is out of bounds: {0}")]
    IndexOutOfBounds(String),
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("memory allocation failed")]
    MemoryAllocationFailed,
    #[error("matrix is singular")]
    MatrixSingular,
    #[error("matrix is not positive definite")]
    MatrixNotPositiveDefinite,
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("not possible: {0}")]
    NotPossible(String),
    #[error("internal failure: {0}")]
    Internal(String),

    #[error("no compatible device found")]
    NoDevice,
    #[error("device is busy")]
    DeviceBusy,
    #[error("communication error: {0}")]
    CommunicationError(String),
    #[error("number of samples out of range")]
    NumSamplesOutOfRange,
    #[error("rx antenna combination not allowed")]
    RxAntennaCombinationNotAllowed,
    #[error("if gain out of range")]
    IfGainOutOfRange,
    #[error("sample rate out of range")]
    SampleRateOutOfRange,
    #[error("rf frequencies out of range")]
    RfOutOfRange,
    #[error("tx power out of range")]
    TxPowerOutOfRange,
    #[error("chirp repetition time cannot be applied")]
    ChirpRateOutOfRange,
    #[error("frame repetition time cannot be applied")]
    FrameRateOutOfRange,
    #[error("number of chirps not allowed")]
    NumChirpsNotAllowed,
    #[error("frame size not supported")]
    FrameSizeNotSupported,
    #[error("timeout while waiting for a frame")]
    Timeout,
    #[error("device fifo overflow")]
    FifoOverflow,
    #[error("device is not configured")]
    NotConfigured,

    #[error("cannot open file: {0}")]
    OpeningFile(String),
    #[error("file is invalid: {0}")]
    FileInvalid(String),
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("invalid json key: {0}")]
    InvalidJsonKey(String),
    #[error("invalid json value: {0}")]
    InvalidJsonValue(String),
}

pub type RadarResult<T> = Result<T, RadarError>;

/// Returns `DimensionMismatch` unless `actual` equals `expected`.
pub fn ensure_shape(what: &str, expected: &[usize], actual: &[usize]) -> RadarResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RadarError::DimensionMismatch(format!(
            "{} expected {:?}, got {:?}",
            what, expected, actual
        )))
    }
}

/// Stateful processor that consumes raw frames in sensor-time order.
///
/// Frames are cubes of `num_rx_antennas x num_chirps_per_frame x num_samples_per_chirp`.
pub trait FrameProcessor {
    type Output;

    fn process(&mut self, frame: ArrayView3<Float>) -> RadarResult<Self::Output>;

    /// Drops all causal state; the next frame is treated as the first one.
    fn reset(&mut self);
}
