// src/processing/mod.rs
pub mod colormap;
pub mod fft;
pub mod params;
pub mod plot;
pub mod source;
pub mod spectrogram;
pub mod waterfall;
pub use colormap::Colormap;
pub use fft::{PowerBounds, PowerTracker, SliceComputer, SliceCustomFields, WaterfallSlice};
pub use params::{
    DigitalRfParameterValidator, DigitalRfParams, ValidatedCapture, WaterfallSliceParams,
};
pub use plot::{render_spectrogram_png, PlotStyle, SpectrogramRaster};
pub use source::{
    DrfReader, MemoryCapture, MemoryChannel, MemoryReader, MemoryStore, PropertiesSource,
    ReadOutcome, ReaderFactory,
};
pub use spectrogram::{SpectrogramEngine, SpectrogramMetadata, SpectrogramOutput, SpectrogramParams};
pub use waterfall::{
    ConversionMetadata, FullConversion, WaterfallEngine, WaterfallMetadata, WaterfallRange,
};
