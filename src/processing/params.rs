use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::error::{ConfigurationError, Result, SourceDataError, VisualizationError};
use crate::processing::source::{DrfReader, MetadataEntries, PropertiesSource, ReaderFactory};

pub const PROPERTIES_FILE: &str = "drf_properties.h5";

/// Validated sampling parameters for one channel of a capture.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DigitalRfParams {
    channel: String,
    start_sample: u64,
    end_sample: u64,
    fft_size: usize,
    center_freq: f64,
    sample_rate_numerator: u64,
    sample_rate_denominator: u64,
}

impl DigitalRfParams {
    pub fn new(
        channel: impl Into<String>,
        start_sample: u64,
        end_sample: u64,
        fft_size: usize,
        center_freq: f64,
        sample_rate_numerator: u64,
        sample_rate_denominator: u64,
    ) -> Result<Self> {
        if end_sample <= start_sample {
            return Err(SourceDataError::InvalidSampleRange {
                start: start_sample,
                end: end_sample,
            }
            .into());
        }
        if fft_size == 0 {
            return Err(VisualizationError::invalid(
                "fft_size",
                "must be greater than zero",
            ));
        }
        if sample_rate_numerator == 0 || sample_rate_denominator == 0 {
            return Err(SourceDataError::InvalidSampleRate {
                numerator: sample_rate_numerator,
                denominator: sample_rate_denominator,
            }
            .into());
        }
        Ok(Self {
            channel: channel.into(),
            start_sample,
            end_sample,
            fft_size,
            center_freq,
            sample_rate_numerator,
            sample_rate_denominator,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn start_sample(&self) -> u64 {
        self.start_sample
    }

    pub fn end_sample(&self) -> u64 {
        self.end_sample
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn center_freq(&self) -> f64 {
        self.center_freq
    }

    pub fn sample_rate_numerator(&self) -> u64 {
        self.sample_rate_numerator
    }

    pub fn sample_rate_denominator(&self) -> u64 {
        self.sample_rate_denominator
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate_numerator as f64 / self.sample_rate_denominator as f64
    }

    pub fn min_frequency(&self) -> f64 {
        self.center_freq - self.sample_rate() / 2.0
    }

    pub fn max_frequency(&self) -> f64 {
        self.center_freq + self.sample_rate() / 2.0
    }

    pub fn total_samples(&self) -> u64 {
        self.end_sample - self.start_sample
    }

    pub fn total_slices(&self, samples_per_slice: u64) -> u64 {
        self.total_samples() / samples_per_slice
    }

    /// View of one slice; the base parameters are borrowed, not copied.
    pub fn slice(&self, slice_idx: u64, samples_per_slice: u64) -> WaterfallSliceParams<'_> {
        WaterfallSliceParams {
            base: self,
            slice_idx,
            samples_per_slice,
        }
    }

    /// Wall-clock instant of an absolute sample index, or `None` past what chrono can represent.
    pub fn sample_time(&self, sample: u64) -> Option<DateTime<Utc>> {
        let nanos = (sample as u128)
            .checked_mul(self.sample_rate_denominator as u128)?
            .checked_mul(1_000_000_000)?
            / self.sample_rate_numerator as u128;
        let secs = i64::try_from(nanos / 1_000_000_000).ok()?;
        DateTime::<Utc>::from_timestamp(secs, (nanos % 1_000_000_000) as u32)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WaterfallSliceParams<'a> {
    base: &'a DigitalRfParams,
    slice_idx: u64,
    samples_per_slice: u64,
}

impl<'a> WaterfallSliceParams<'a> {
    pub fn base(&self) -> &'a DigitalRfParams {
        self.base
    }

    pub fn slice_idx(&self) -> u64 {
        self.slice_idx
    }

    pub fn samples_per_slice(&self) -> u64 {
        self.samples_per_slice
    }

    pub fn slice_start_sample(&self) -> u64 {
        self.base
            .start_sample
            .saturating_add(self.slice_idx.saturating_mul(self.samples_per_slice))
    }

    /// Zero once the slice starts at or past the end of the capture.
    pub fn slice_num_samples(&self) -> u64 {
        self.base
            .end_sample
            .saturating_sub(self.slice_start_sample())
            .min(self.samples_per_slice)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.base.sample_time(self.slice_start_sample())
    }
}

/// A freshly opened reader together with the parameters validated against it.
pub struct ValidatedCapture<R: DrfReader> {
    pub reader: R,
    pub params: DigitalRfParams,
}

/// Opens a capture and derives its sampling parameters.
pub struct DigitalRfParameterValidator<'a, F: ReaderFactory, P: PropertiesSource> {
    readers: &'a F,
    properties: &'a P,
}

impl<'a, F: ReaderFactory, P: PropertiesSource> DigitalRfParameterValidator<'a, F, P> {
    pub fn new(readers: &'a F, properties: &'a P) -> Self {
        Self {
            readers,
            properties,
        }
    }

    pub fn validate(
        &self,
        drf_path: &Path,
        channel: &str,
        fft_size: usize,
    ) -> Result<ValidatedCapture<F::Reader>> {
        let reader = self
            .readers
            .open(drf_path)
            .map_err(|reason| SourceDataError::ReaderOpen {
                path: drf_path.to_path_buf(),
                reason,
            })?;

        let available = reader.channels();
        if !available.iter().any(|c| c == channel) {
            return Err(ConfigurationError::UnknownChannel {
                channel: channel.to_owned(),
                available,
            }
            .into());
        }

        let (start_sample, end_sample) =
            reader
                .bounds(channel)
                .ok_or_else(|| SourceDataError::BoundsUnavailable {
                    channel: channel.to_owned(),
                })?;

        let properties_path = drf_path.join(channel).join(PROPERTIES_FILE);
        let (numerator, denominator) = self.sample_rate(&properties_path)?;

        let center_freq = match reader.read_metadata(start_sample, end_sample, channel) {
            Ok(Some(entries)) => center_frequency(&entries).unwrap_or_else(|| {
                warn!("no center frequency in metadata for channel {channel}; using 0.0");
                0.0
            }),
            Ok(None) => {
                warn!("no metadata for channel {channel}; center frequency defaults to 0.0");
                0.0
            }
            Err(e) => {
                warn!("failed to read metadata for channel {channel}: {e}; center frequency defaults to 0.0");
                0.0
            }
        };

        let params = DigitalRfParams::new(
            channel,
            start_sample,
            end_sample,
            fft_size,
            center_freq,
            numerator,
            denominator,
        )?;
        debug!(
            "validated {} channel {channel}: samples [{start_sample}, {end_sample}), {} Hz at {center_freq} Hz",
            drf_path.display(),
            params.sample_rate()
        );
        Ok(ValidatedCapture { reader, params })
    }

    fn sample_rate(&self, path: &Path) -> Result<(u64, u64)> {
        let attrs = self
            .properties
            .read_properties(path)
            .map_err(|reason| SourceDataError::ReaderOpen {
                path: path.to_path_buf(),
                reason,
            })?;
        let attribute = |name: &str| {
            attrs
                .get(name)
                .and_then(as_whole_number)
                .ok_or_else(|| SourceDataError::MissingSampleRate {
                    path: path.to_path_buf(),
                    attribute: name.to_owned(),
                })
        };
        Ok((
            attribute("sample_rate_numerator")?,
            attribute("sample_rate_denominator")?,
        ))
    }
}

fn as_whole_number(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|v| *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    })
}

/// `center_freq` scalar, or the first of `center_frequencies`, from the earliest entry.
fn center_frequency(entries: &MetadataEntries) -> Option<f64> {
    let (_, first) = entries.iter().next()?;
    if let Some(freq) = first.get("center_freq").and_then(Value::as_f64) {
        return Some(freq);
    }
    match first.get("center_frequencies")? {
        Value::Array(values) => values.first().and_then(Value::as_f64),
        other => other.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::source::{MemoryCapture, MemoryChannel, MemoryStore};
    use crate::ErrorKind;
    use rustfft::num_complex::Complex32;
    use serde_json::json;

    fn store(channel: MemoryChannel) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert(
            "/data/cap",
            MemoryCapture::new().with_channel("ch0", channel),
            10_000_000,
            10,
        );
        store
    }

    fn tone(len: usize) -> Vec<Complex32> {
        vec![Complex32::new(1.0, 0.0); len]
    }

    #[test]
    fn derives_frequency_span() {
        let channel = MemoryChannel::new(5_000, tone(4096))
            .with_metadata(5_000, json!({"center_freq": 100.0e6}));
        let store = store(channel);
        let validator = DigitalRfParameterValidator::new(&store, &store);
        let params = validator
            .validate(Path::new("/data/cap"), "ch0", 1024)
            .unwrap()
            .params;
        assert_eq!(params.sample_rate(), 1.0e6);
        assert_eq!(params.min_frequency(), 99.5e6);
        assert_eq!(params.max_frequency(), 100.5e6);
        assert_eq!(params.total_samples(), 4096);
        assert_eq!(params.total_slices(1000), 4);
    }

    #[test]
    fn center_frequencies_array_is_accepted() {
        let channel = MemoryChannel::new(0, tone(16))
            .with_metadata(3, json!({"center_frequencies": [2.4e9, 2.5e9]}));
        let store = store(channel);
        let validator = DigitalRfParameterValidator::new(&store, &store);
        let params = validator
            .validate(Path::new("/data/cap"), "ch0", 8)
            .unwrap()
            .params;
        assert_eq!(params.center_freq(), 2.4e9);
    }

    #[test]
    fn center_frequency_defaults_when_metadata_unreadable() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut store = MemoryStore::new();
        let mut capture =
            MemoryCapture::new().with_channel("ch0", MemoryChannel::new(0, tone(16)));
        capture.metadata_unreadable = true;
        store.insert("/data/cap", capture, 1000, 1);
        let validator = DigitalRfParameterValidator::new(&store, &store);
        let params = validator
            .validate(Path::new("/data/cap"), "ch0", 8)
            .unwrap()
            .params;
        assert_eq!(params.center_freq(), 0.0);
    }

    #[test]
    fn unknown_channel_names_alternatives() {
        let store = store(MemoryChannel::new(0, tone(16)));
        let validator = DigitalRfParameterValidator::new(&store, &store);
        let err = validator
            .validate(Path::new("/data/cap"), "ch7", 8)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("ch0"));
    }

    #[test]
    fn missing_capture_is_source_error() {
        let store = store(MemoryChannel::new(0, tone(16)));
        let validator = DigitalRfParameterValidator::new(&store, &store);
        let err = validator
            .validate(Path::new("/elsewhere"), "ch0", 8)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            VisualizationError::SourceData(SourceDataError::ReaderOpen { .. })
        ));
    }

    #[test]
    fn empty_channel_has_no_bounds() {
        let store = store(MemoryChannel::new(0, Vec::new()));
        let validator = DigitalRfParameterValidator::new(&store, &store);
        let err = validator
            .validate(Path::new("/data/cap"), "ch0", 8)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            VisualizationError::SourceData(SourceDataError::BoundsUnavailable { .. })
        ));
    }

    #[test]
    fn missing_rate_attribute_is_reported() {
        let mut store = store(MemoryChannel::new(0, tone(16)));
        let mut attrs = serde_json::Map::new();
        attrs.insert("sample_rate_numerator".into(), json!(1000));
        store.set_properties("/data/cap/ch0/drf_properties.h5", attrs);
        let validator = DigitalRfParameterValidator::new(&store, &store);
        let err = validator
            .validate(Path::new("/data/cap"), "ch0", 8)
            .err()
            .unwrap();
        match err {
            VisualizationError::SourceData(SourceDataError::MissingSampleRate {
                attribute, ..
            }) => assert_eq!(attribute, "sample_rate_denominator"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn slice_view_clamps_to_capture_end() {
        let params = DigitalRfParams::new("ch0", 100, 1100, 64, 0.0, 100, 1).unwrap();
        let last = params.slice(3, 300);
        assert_eq!(last.slice_start_sample(), 1000);
        assert_eq!(last.slice_num_samples(), 100);
        assert_eq!(params.slice(4, 300).slice_num_samples(), 0);
        assert_eq!(params.slice(u64::MAX, 300).slice_num_samples(), 0);
    }

    #[test]
    fn slice_timestamp_uses_sample_rate() {
        let params = DigitalRfParams::new("ch0", 1_000_000, 2_000_000, 64, 0.0, 1000, 1).unwrap();
        let ts = params.slice(1, 500).timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn unrepresentable_sample_time_is_none() {
        let slow = DigitalRfParams::new("ch0", 0, 10, 64, 0.0, 1, u64::MAX).unwrap();
        assert!(slow.sample_time(u64::MAX).is_none());
        let late = DigitalRfParams::new("ch0", 0, 10, 64, 0.0, 1, 1).unwrap();
        assert!(late.sample_time(1 << 60).is_none());
        assert!(late.sample_time(0).is_some());
    }

    #[test]
    fn rejects_empty_sample_range() {
        assert!(DigitalRfParams::new("ch0", 10, 10, 64, 0.0, 100, 1).is_err());
        assert!(DigitalRfParams::new("ch0", 0, 10, 64, 0.0, 100, 0).is_err());
        assert!(DigitalRfParams::new("ch0", 0, 10, 0, 0.0, 100, 1).is_err());
    }
}
