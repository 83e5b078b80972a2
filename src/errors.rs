// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture service

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Sensor/device errors
    Device(DeviceError),
    /// Recording session errors
    Recording(RecordingError),
    /// Storage transfer errors
    Transfer(TransferError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors outside the transfer pipeline
    Storage(String),
}

/// Sensor-level errors
///
/// Capture failures are transient by contract: callers retry with backoff
/// before treating the device as gone.
#[derive(Debug, Clone)]
pub enum DeviceError {
    /// The driver rejected the requested mode profile
    ConfigureFailed(String),
    /// A frame read failed (transient, retryable)
    CaptureFailed(String),
    /// An operation was issued before any profile was applied
    NotConfigured,
}

/// Recording session errors
#[derive(Debug, Clone)]
pub enum RecordingError {
    /// A non-terminal session already exists
    ConcurrentSession,
    /// The referenced session is not live
    NotRecording,
    /// The encoder sink could not be opened
    EncoderOpen(String),
    /// A frame write to the encoder sink failed
    EncoderWrite(String),
    /// The sensor failed persistently during the session
    Device(DeviceError),
    /// The session could not be started
    StartFailed(String),
    /// The capture loop did not acknowledge a stop request in time
    StopFailed(String),
}

/// Storage transfer errors
///
/// All of these leave the staging file in place; a failed transfer may be
/// retried later by re-enqueueing the same path.
#[derive(Debug, Clone)]
pub enum TransferError {
    /// No removable volume is currently mounted
    NoRemovableStorage,
    /// Copying to the removable volume failed
    CopyFailed(String),
    /// The copied file did not verify against the source
    VerificationFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Device(e) => write!(f, "Device error: {}", e),
            AppError::Recording(e) => write!(f, "Recording error: {}", e),
            AppError::Transfer(e) => write!(f, "Transfer error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::ConfigureFailed(msg) => write!(f, "Configure failed: {}", msg),
            DeviceError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            DeviceError::NotConfigured => write!(f, "Sensor is not configured"),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::ConcurrentSession => {
                write!(f, "Another recording session is active")
            }
            RecordingError::NotRecording => write!(f, "No live recording session"),
            RecordingError::EncoderOpen(msg) => write!(f, "Failed to open encoder: {}", msg),
            RecordingError::EncoderWrite(msg) => write!(f, "Encoder write failed: {}", msg),
            RecordingError::Device(e) => write!(f, "Sensor failed during recording: {}", e),
            RecordingError::StartFailed(msg) => write!(f, "Failed to start recording: {}", msg),
            RecordingError::StopFailed(msg) => write!(f, "Failed to stop recording: {}", msg),
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::NoRemovableStorage => {
                write!(f, "No removable storage attached")
            }
            TransferError::CopyFailed(msg) => write!(f, "Copy failed: {}", msg),
            TransferError::VerificationFailed(msg) => {
                write!(f, "Copy verification failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for DeviceError {}
impl std::error::Error for RecordingError {}
impl std::error::Error for TransferError {}

// Conversions from sub-errors to AppError
impl From<DeviceError> for AppError {
    fn from(err: DeviceError) -> Self {
        AppError::Device(err)
    }
}

impl From<RecordingError> for AppError {
    fn from(err: RecordingError) -> Self {
        AppError::Recording(err)
    }
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        AppError::Transfer(err)
    }
}

impl From<DeviceError> for RecordingError {
    fn from(err: DeviceError) -> Self {
        RecordingError::Device(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}
