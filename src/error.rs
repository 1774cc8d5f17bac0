use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Coarse classification used by callers deciding whether a failure is worth retrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    SourceData,
    Configuration,
    Rendering,
}

/// The capture on disk (or its index entry) cannot support the request.
#[derive(Debug, Error)]
pub enum SourceDataError {
    #[error("failed to open Digital RF reader at {path}: {reason}")]
    ReaderOpen { path: PathBuf, reason: String },
    #[error("no sample bounds available for channel {channel}")]
    BoundsUnavailable { channel: String },
    #[error("properties file {path} is missing attribute {attribute}")]
    MissingSampleRate { path: PathBuf, attribute: String },
    #[error("invalid sample rate {numerator}/{denominator}")]
    InvalidSampleRate { numerator: u64, denominator: u64 },
    #[error("invalid sample range: start {start} must be below end {end}")]
    InvalidSampleRange { start: u64, end: u64 },
    #[error("capture {uuid} not found in index {index}")]
    CaptureNotFound { index: String, uuid: String },
    #[error("capture document for {uuid} has no usable {field}")]
    MalformedDocument { uuid: String, field: &'static str },
    #[error("no usable slices produced for channel {channel} ({skipped} skipped)")]
    NoUsableSlices { channel: String, skipped: usize },
    #[error("failed to read channel {channel} at sample {start}: {reason}")]
    Read {
        channel: String,
        start: u64,
        reason: String,
    },
    #[error("malformed slice payload: {0}")]
    MalformedPayload(String),
    #[error("capture index lookup failed: {0}")]
    Index(String),
    #[error("block file listing failed: {0}")]
    Catalog(String),
}

/// The request itself is malformed for the capture it addresses.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("channel {channel} not found; available channels: {}", .available.join(", "))]
    UnknownChannel {
        channel: String,
        available: Vec<String>,
    },
    #[error("unsupported capture type: {0}")]
    UnsupportedCaptureType(String),
    #[error("temporal filtering is only supported for Digital RF captures, got {0}")]
    TemporalFilterUnsupported(String),
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum VisualizationError {
    #[error(transparent)]
    SourceData(#[from] SourceDataError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisualizationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VisualizationError::SourceData(_) => ErrorKind::SourceData,
            VisualizationError::Configuration(_) => ErrorKind::Configuration,
            VisualizationError::Plot(_) | VisualizationError::Io(_) => ErrorKind::Rendering,
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidParameter {
            name,
            reason: reason.into(),
        }
        .into()
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for VisualizationError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        VisualizationError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for VisualizationError {
    fn from(value: image::ImageError) -> Self {
        VisualizationError::Plot(value.to_string())
    }
}
