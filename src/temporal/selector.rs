use log::warn;

use crate::error::{ConfigurationError, Result, SourceDataError};
use crate::temporal::bounds::CaptureBoundsResolver;
use crate::temporal::capture::{BlockFile, BlockFileCatalog, Capture, CaptureIndex, CaptureType};
use crate::temporal::codec;

/// Canonically named data blocks of a Digital RF capture, in catalog order.
pub(crate) fn data_files<C: BlockFileCatalog>(catalog: &C, capture: &Capture) -> Result<Vec<BlockFile>> {
    if capture.capture_type != CaptureType::DigitalRf {
        return Err(
            ConfigurationError::TemporalFilterUnsupported(capture.capture_type.to_string()).into(),
        );
    }
    Ok(list_all(catalog, capture)?
        .into_iter()
        .filter(BlockFile::is_data_block)
        .collect())
}

fn list_all<C: BlockFileCatalog>(catalog: &C, capture: &Capture) -> Result<Vec<BlockFile>> {
    catalog
        .list(capture)
        .map_err(|e| SourceDataError::Catalog(e).into())
}

/// Picks the block files that intersect a window given relative to capture start.
pub struct TemporalFileSelector<'a, I: CaptureIndex, C: BlockFileCatalog> {
    resolver: &'a CaptureBoundsResolver<'a, I>,
    catalog: &'a C,
}

impl<'a, I: CaptureIndex, C: BlockFileCatalog> TemporalFileSelector<'a, I, C> {
    pub fn new(resolver: &'a CaptureBoundsResolver<'a, I>, catalog: &'a C) -> Self {
        Self { resolver, catalog }
    }

    pub fn get_data_files(&self, capture: &Capture) -> Result<Vec<BlockFile>> {
        data_files(self.catalog, capture)
    }

    /// Data blocks whose names fall in the inclusive name range of the window, sorted by name.
    /// Names are compared case-insensitively, matching how data blocks are recognised.
    ///
    /// Relies on name order matching time order, which holds only while the
    /// seconds component keeps the same digit width across the window.
    pub fn filter_by_window(
        &self,
        capture: &Capture,
        start_rel_ms: i64,
        end_rel_ms: i64,
    ) -> Result<Vec<BlockFile>> {
        let files = self.get_data_files(capture)?;
        let bounds = self
            .resolver
            .get_capture_bounds(capture.capture_type, &capture.uuid)?;
        let epoch_start_ms = bounds.epoch_start_ms();
        let to_name = |rel_ms: i64| codec::encode((epoch_start_ms + rel_ms).max(0) as u64);
        let start_name = to_name(start_rel_ms);
        let end_name = to_name(end_rel_ms);

        let mut selected: Vec<BlockFile> = files
            .into_iter()
            .filter(|f| {
                let name = f.name.to_ascii_lowercase();
                name >= start_name && name <= end_name
            })
            .collect();
        selected.sort_by_cached_key(|f| f.name.to_ascii_lowercase());
        Ok(selected)
    }

    /// All non-data files plus the data blocks inside the window; unfiltered if either bound is missing.
    pub fn get_files_with_temporal_filter(
        &self,
        capture: &Capture,
        start_rel_ms: Option<i64>,
        end_rel_ms: Option<i64>,
    ) -> Result<Vec<BlockFile>> {
        let (Some(start), Some(end)) = (start_rel_ms, end_rel_ms) else {
            warn!(
                "temporal filter for capture {} missing a bound (start={start_rel_ms:?}, end={end_rel_ms:?}); returning all files",
                capture.uuid
            );
            return list_all(self.catalog, capture);
        };
        let mut files: Vec<BlockFile> = list_all(self.catalog, capture)?
            .into_iter()
            .filter(|f| !f.is_data_block())
            .collect();
        files.extend(self.filter_by_window(capture, start, end)?);
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::temporal::capture::{MemoryCatalog, MemoryIndex};
    use crate::ErrorKind;

    fn setup(capture: &Capture, names: &[&str]) -> (MemoryIndex, MemoryCatalog) {
        let mut index = MemoryIndex::new();
        index.insert_bounds("captures-drf", &capture.uuid, 1000, 1010);
        index.insert_bounds("captures-rh", &capture.uuid, 1000, 1010);
        let mut catalog = MemoryCatalog::new();
        catalog.add(capture, names);
        (index, catalog)
    }

    fn names(files: &[BlockFile]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let capture = Capture::new("cap", CaptureType::DigitalRf, "ch0");
        let (index, catalog) = setup(
            &capture,
            &["rf@1001.000.h5", "rf@1000.500.h5", "rf@1000.000.h5", "rf@1001.001.h5"],
        );
        let resolver = CaptureBoundsResolver::new(&index, IndexConfig::default());
        let selector = TemporalFileSelector::new(&resolver, &catalog);
        let files = selector.filter_by_window(&capture, 0, 1000).unwrap();
        assert_eq!(
            names(&files),
            vec!["rf@1000.000.h5", "rf@1000.500.h5", "rf@1001.000.h5"]
        );
    }

    #[test]
    fn upper_case_block_names_are_windowed() {
        let capture = Capture::new("cap", CaptureType::DigitalRf, "ch0");
        let (index, catalog) = setup(
            &capture,
            &["RF@1000.500.H5", "drf_properties.h5", "Rf@1002.000.h5"],
        );
        let resolver = CaptureBoundsResolver::new(&index, IndexConfig::default());
        let selector = TemporalFileSelector::new(&resolver, &catalog);
        let files = selector
            .get_files_with_temporal_filter(&capture, Some(0), Some(1000))
            .unwrap();
        assert_eq!(names(&files), vec!["drf_properties.h5", "RF@1000.500.H5"]);
    }

    #[test]
    fn non_data_files_always_survive_filtering() {
        let capture = Capture::new("cap", CaptureType::DigitalRf, "ch0");
        let (index, catalog) = setup(
            &capture,
            &["drf_properties.h5", "rf@1000.000.h5", "rf@1005.000.h5", "metadata/dmd_properties.h5"],
        );
        let resolver = CaptureBoundsResolver::new(&index, IndexConfig::default());
        let selector = TemporalFileSelector::new(&resolver, &catalog);
        let files = selector
            .get_files_with_temporal_filter(&capture, Some(4000), Some(6000))
            .unwrap();
        assert_eq!(
            names(&files),
            vec!["drf_properties.h5", "metadata/dmd_properties.h5", "rf@1005.000.h5"]
        );
    }

    #[test]
    fn missing_bound_returns_everything() {
        let _ = env_logger::builder().is_test(true).try_init();
        let capture = Capture::new("cap", CaptureType::DigitalRf, "ch0");
        let (index, catalog) = setup(&capture, &["drf_properties.h5", "rf@1000.000.h5"]);
        let resolver = CaptureBoundsResolver::new(&index, IndexConfig::default());
        let selector = TemporalFileSelector::new(&resolver, &catalog);
        let files = selector
            .get_files_with_temporal_filter(&capture, None, Some(10))
            .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn other_capture_types_are_rejected() {
        let capture = Capture::new("cap", CaptureType::RadioHound, "ch0");
        let (index, catalog) = setup(&capture, &["rf@1000.000.h5"]);
        let resolver = CaptureBoundsResolver::new(&index, IndexConfig::default());
        let selector = TemporalFileSelector::new(&resolver, &catalog);
        let err = selector.get_data_files(&capture).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = selector
            .get_files_with_temporal_filter(&capture, Some(0), Some(10))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn name_order_breaks_across_seconds_digit_width() {
        let capture = Capture::new("cap", CaptureType::DigitalRf, "ch0");
        let (index, catalog) = setup(&capture, &["rf@999.900.h5", "rf@1000.000.h5"]);
        let resolver = CaptureBoundsResolver::new(&index, IndexConfig::default());
        let selector = TemporalFileSelector::new(&resolver, &catalog);
        // [999.500 s, 1000.100 s] spans both files in time, but "rf@1000..." sorts before "rf@999...".
        let files = selector.filter_by_window(&capture, -500, 100).unwrap();
        assert!(files.is_empty());
    }
}
