// src/temporal/mod.rs
pub mod bounds;
pub mod capture;
pub mod codec;
pub mod selector;
pub use bounds::{CaptureBoundsResolver, CaptureTimeBounds};
pub use capture::{
    BlockFile, BlockFileCatalog, Capture, CaptureIndex, CaptureType, MemoryCatalog, MemoryIndex,
};
pub use selector::TemporalFileSelector;
