use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::IndexConfig;
use crate::error::{Result, SourceDataError, VisualizationError};
use crate::temporal::capture::{BlockFileCatalog, Capture, CaptureIndex, CaptureType};
use crate::temporal::selector::data_files;

/// Absolute capture span in whole seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTimeBounds {
    pub start_time_sec: i64,
    pub end_time_sec: i64,
}

impl CaptureTimeBounds {
    pub fn epoch_start_ms(&self) -> i64 {
        self.start_time_sec * 1000
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end_time_sec - self.start_time_sec) * 1000
    }
}

/// Looks up capture bounds in the metadata index. Nothing is cached.
pub struct CaptureBoundsResolver<'a, I: CaptureIndex> {
    index: &'a I,
    config: IndexConfig,
}

impl<'a, I: CaptureIndex> CaptureBoundsResolver<'a, I> {
    pub fn new(index: &'a I, config: IndexConfig) -> Self {
        Self { index, config }
    }

    pub fn get_capture_bounds(
        &self,
        capture_type: CaptureType,
        capture_uuid: &str,
    ) -> Result<CaptureTimeBounds> {
        let index_name = self.config.index_for(capture_type)?;
        let document = self
            .index
            .find(index_name, capture_uuid)
            .map_err(SourceDataError::Index)?
            .ok_or_else(|| SourceDataError::CaptureNotFound {
                index: index_name.to_owned(),
                uuid: capture_uuid.to_owned(),
            })?;
        let search_props = &document["search_props"];
        Ok(CaptureTimeBounds {
            start_time_sec: seconds_field(search_props, "start_time", capture_uuid)?,
            end_time_sec: seconds_field(search_props, "end_time", capture_uuid)?,
        })
    }

    /// Milliseconds between consecutive data blocks, or 0 when fewer than two exist.
    ///
    /// `capture_type` must agree with the capture's own type.
    pub fn get_file_cadence<C: BlockFileCatalog>(
        &self,
        catalog: &C,
        capture_type: CaptureType,
        capture: &Capture,
    ) -> Result<u64> {
        if capture_type != capture.capture_type {
            return Err(VisualizationError::invalid(
                "capture_type",
                format!(
                    "{capture_type} does not match capture {} of type {}",
                    capture.uuid, capture.capture_type
                ),
            ));
        }
        let bounds = self.get_capture_bounds(capture_type, &capture.uuid)?;
        let count = data_files(catalog, capture)?.len();
        if count < 2 {
            return Ok(0);
        }
        let gaps = (count - 1) as f64;
        let cadence = (bounds.duration_ms() as f64 / gaps).floor();
        Ok((cadence as u64).max(1))
    }
}

fn seconds_field(search_props: &Value, field: &'static str, uuid: &str) -> Result<i64> {
    let value = &search_props[field];
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|v| v.floor() as i64))
        .ok_or_else(|| {
            SourceDataError::MalformedDocument {
                uuid: uuid.to_owned(),
                field,
            }
            .into()
        })
}
