//! Temporal indexing and on-demand FFT rendering for Digital RF captures.
//!
//! `temporal` maps block-file names to timestamps and selects the files of a
//! capture that intersect a time window. `processing` validates a channel's
//! sampling parameters and computes waterfall slices and spectrogram images
//! from it, one reader per call.
pub mod config;
pub mod error;
pub mod processing;
pub mod temporal;
pub use config::{EngineConfig, IndexConfig};
pub use error::{ConfigurationError, ErrorKind, Result, SourceDataError, VisualizationError};
pub use processing::{
    DigitalRfParameterValidator, DigitalRfParams, PowerBounds, SpectrogramEngine,
    SpectrogramParams, WaterfallEngine, WaterfallMetadata, WaterfallSlice,
};
pub use temporal::{CaptureBoundsResolver, CaptureTimeBounds, CaptureType, TemporalFileSelector};
