//! Thread-local error register for callers that expect the legacy
//! check-after-every-call style.
//!
//! Internally every API returns [`RadarResult`]; [`capture`] translates a
//! result into the register. A successful call never clears a previously
//! recorded code, callers reset it with [`clear`] or [`get_and_clear`].

use std::cell::Cell;

use crate::prelude::{RadarError, RadarResult};

pub const API_BASE: u32 = 0x0001_0000;
pub const DEV_BASE: u32 = 0x0001_1000;
pub const HOST_BASE: u32 = 0x0003_0000;
pub const APP_BASE: u32 = 0x8000_0000;

/// Numeric error codes stored in the thread-local register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Ok = 0,
    ArgumentNull = API_BASE + 0x01,
    ArgumentInvalid = API_BASE + 0x02,
    ArgumentOutOfBounds = API_BASE + 0x03,
    IndexOutOfBounds = API_BASE + 0x06,
    DimensionMismatch = API_BASE + 0x07,
    MemoryAllocationFailed = API_BASE + 0x08,
    MatrixSingular = API_BASE + 0x0A,
    MatrixNotPositiveDefinite = API_BASE + 0x0B,
    NotSupported = API_BASE + 0x0C,
    Internal = API_BASE + 0x0D,
    NotPossible = API_BASE + 0x0E,
    NoDevice = DEV_BASE,
    DeviceBusy = DEV_BASE + 0x01,
    CommunicationError = DEV_BASE + 0x02,
    NumSamplesOutOfRange = DEV_BASE + 0x03,
    RxAntennaCombinationNotAllowed = DEV_BASE + 0x04,
    IfGainOutOfRange = DEV_BASE + 0x05,
    SampleRateOutOfRange = DEV_BASE + 0x06,
    RfOutOfRange = DEV_BASE + 0x07,
    TxPowerOutOfRange = DEV_BASE + 0x08,
    ChirpRateOutOfRange = DEV_BASE + 0x09,
    FrameRateOutOfRange = DEV_BASE + 0x0A,
    NumChirpsNotAllowed = DEV_BASE + 0x0B,
    FrameSizeNotSupported = DEV_BASE + 0x0C,
    Timeout = DEV_BASE + 0x0D,
    FifoOverflow = DEV_BASE + 0x0E,
    NotConfigured = DEV_BASE + 0x21,
    OpeningFile = HOST_BASE + 0x01,
    FileInvalid = HOST_BASE + 0x02,
    InvalidJson = HOST_BASE + 0x04,
    InvalidJsonKey = HOST_BASE + 0x05,
    InvalidJsonValue = HOST_BASE + 0x06,
}

impl ErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::ArgumentNull => "argument is null",
            ErrorCode::ArgumentInvalid => "argument is invalid",
            ErrorCode::ArgumentOutOfBounds => "argument is out of bounds",
            ErrorCode::IndexOutOfBounds => "index is out of bounds",
            ErrorCode::DimensionMismatch => "dimension mismatch",
            ErrorCode::MemoryAllocationFailed => "memory allocation failed",
            ErrorCode::MatrixSingular => "matrix is singular",
            ErrorCode::MatrixNotPositiveDefinite => "matrix is not positive definite",
            ErrorCode::NotSupported => "not supported",
            ErrorCode::Internal => "internal logic error",
            ErrorCode::NotPossible => "not possible",
            ErrorCode::NoDevice => "no compatible device found",
            ErrorCode::DeviceBusy => "connected device is busy",
            ErrorCode::CommunicationError => "communication error between host and device",
            ErrorCode::NumSamplesOutOfRange => "number of samples out of range",
            ErrorCode::RxAntennaCombinationNotAllowed => "rx antenna combination not allowed",
            ErrorCode::IfGainOutOfRange => "if gain out of range",
            ErrorCode::SampleRateOutOfRange => "sample rate out of range",
            ErrorCode::RfOutOfRange => "rf frequencies out of range",
            ErrorCode::TxPowerOutOfRange => "tx power out of range",
            ErrorCode::ChirpRateOutOfRange => "chirp repetition time cannot be applied",
            ErrorCode::FrameRateOutOfRange => "frame repetition time cannot be applied",
            ErrorCode::NumChirpsNotAllowed => "number of chirps not allowed",
            ErrorCode::FrameSizeNotSupported => "frame size not supported",
            ErrorCode::Timeout => "timeout while acquiring a frame",
            ErrorCode::FifoOverflow => "device fifo overflow",
            ErrorCode::NotConfigured => "device needs to be configured",
            ErrorCode::OpeningFile => "cannot open file",
            ErrorCode::FileInvalid => "file is invalid",
            ErrorCode::InvalidJson => "invalid json structure",
            ErrorCode::InvalidJsonKey => "invalid or missing json key",
            ErrorCode::InvalidJsonValue => "invalid json value",
        }
    }
}

impl From<&RadarError> for ErrorCode {
    fn from(error: &RadarError) -> Self {
        match error {
            RadarError::ArgumentNull(_) => ErrorCode::ArgumentNull,
            RadarError::ArgumentInvalid(_) => ErrorCode::ArgumentInvalid,
            RadarError::ArgumentOutOfBounds(_) => ErrorCode::ArgumentOutOfBounds,
            RadarError::IndexOutOfBounds(_) => ErrorCode::IndexOutOfBounds,
            RadarError::DimensionMismatch(_) => ErrorCode::DimensionMismatch,
            RadarError::MemoryAllocationFailed => ErrorCode::MemoryAllocationFailed,
            RadarError::MatrixSingular => ErrorCode::MatrixSingular,
            RadarError::MatrixNotPositiveDefinite => ErrorCode::MatrixNotPositiveDefinite,
            RadarError::NotSupported(_) => ErrorCode::NotSupported,
            RadarError::NotPossible(_) => ErrorCode::NotPossible,
            RadarError::Internal(_) => ErrorCode::Internal,
            RadarError::NoDevice => ErrorCode::NoDevice,
            RadarError::DeviceBusy => ErrorCode::DeviceBusy,
            RadarError::CommunicationError(_) => ErrorCode::CommunicationError,
            RadarError::NumSamplesOutOfRange => ErrorCode::NumSamplesOutOfRange,
            RadarError::RxAntennaCombinationNotAllowed => ErrorCode::RxAntennaCombinationNotAllowed,
            RadarError::IfGainOutOfRange => ErrorCode::IfGainOutOfRange,
            RadarError::SampleRateOutOfRange => ErrorCode::SampleRateOutOfRange,
            RadarError::RfOutOfRange => ErrorCode::RfOutOfRange,
            RadarError::TxPowerOutOfRange => ErrorCode::TxPowerOutOfRange,
            RadarError::ChirpRateOutOfRange => ErrorCode::ChirpRateOutOfRange,
            RadarError::FrameRateOutOfRange => ErrorCode::FrameRateOutOfRange,
            RadarError::NumChirpsNotAllowed => ErrorCode::NumChirpsNotAllowed,
            RadarError::FrameSizeNotSupported => ErrorCode::FrameSizeNotSupported,
            RadarError::Timeout => ErrorCode::Timeout,
            RadarError::FifoOverflow => ErrorCode::FifoOverflow,
            RadarError::NotConfigured => ErrorCode::NotConfigured,
            RadarError::OpeningFile(_) => ErrorCode::OpeningFile,
            RadarError::FileInvalid(_) => ErrorCode::FileInvalid,
            RadarError::InvalidJson(_) => ErrorCode::InvalidJson,
            RadarError::InvalidJsonKey(_) => ErrorCode::InvalidJsonKey,
            RadarError::InvalidJsonValue(_) => ErrorCode::InvalidJsonValue,
        }
    }
}

thread_local! {
    static LAST_ERROR: Cell<ErrorCode> = Cell::new(ErrorCode::Ok);
}

pub fn set(code: ErrorCode) {
    LAST_ERROR.with(|cell| cell.set(code));
}

pub fn get() -> ErrorCode {
    LAST_ERROR.with(|cell| cell.get())
}

pub fn get_and_clear() -> ErrorCode {
    LAST_ERROR.with(|cell| cell.replace(ErrorCode::Ok))
}

pub fn clear() {
    set(ErrorCode::Ok);
}

pub fn to_string(code: ErrorCode) -> String {
    format!("{} (0x{:08x})", code.description(), code.code())
}

/// Records the code of a failed result and hands back the value on success.
pub fn capture<T>(result: RadarResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            log::debug!("recording error: {}", err);
            set(ErrorCode::from(&err));
            None
        }
    }
}
