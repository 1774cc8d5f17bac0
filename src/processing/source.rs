use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use serde_json::{Map, Value};

/// Result of one sample read: either samples or a hole in the recording.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadOutcome {
    Samples(Vec<Complex32>),
    Gap,
}

/// Per-sample metadata entries keyed by the sample index they were written at.
pub type MetadataEntries = BTreeMap<u64, Value>;

/// Handle onto one opened Digital RF directory. Not assumed to be thread-safe.
pub trait DrfReader {
    fn channels(&self) -> Vec<String>;
    /// Inclusive start, exclusive end.
    fn bounds(&self, channel: &str) -> Option<(u64, u64)>;
    /// `Ok(ReadOutcome::Gap)` for missing blocks, `Err` for anything else.
    fn read_vector(
        &self,
        start_sample: u64,
        num_samples: u64,
        channel: &str,
        subchannel: usize,
    ) -> Result<ReadOutcome, String>;
    fn read_metadata(
        &self,
        start_sample: u64,
        end_sample: u64,
        channel: &str,
    ) -> Result<Option<MetadataEntries>, String>;
}

pub trait ReaderFactory {
    type Reader: DrfReader;
    fn open(&self, path: &Path) -> Result<Self::Reader, String>;
}

/// Attribute access for `drf_properties.h5` style files.
pub trait PropertiesSource {
    fn read_properties(&self, path: &Path) -> Result<Map<String, Value>, String>;
}

/// One channel of synthetic, fully in-memory samples.
#[derive(Clone, Debug, Default)]
pub struct MemoryChannel {
    pub start_sample: u64,
    pub samples: Vec<Complex32>,
    pub gaps: Vec<Range<u64>>,
    pub broken: Vec<Range<u64>>,
    pub metadata: MetadataEntries,
}

impl MemoryChannel {
    pub fn new(start_sample: u64, samples: Vec<Complex32>) -> Self {
        Self {
            start_sample,
            samples,
            ..Default::default()
        }
    }

    pub fn end_sample(&self) -> u64 {
        self.start_sample + self.samples.len() as u64
    }

    /// Reads overlapping `range` report a gap.
    pub fn with_gap(mut self, range: Range<u64>) -> Self {
        self.gaps.push(range);
        self
    }

    /// Reads overlapping `range` fail outright.
    pub fn with_broken(mut self, range: Range<u64>) -> Self {
        self.broken.push(range);
        self
    }

    pub fn with_metadata(mut self, sample: u64, entry: Value) -> Self {
        self.metadata.insert(sample, entry);
        self
    }
}

fn overlaps(ranges: &[Range<u64>], start: u64, end: u64) -> bool {
    ranges.iter().any(|r| r.start < end && start < r.end)
}

/// In-memory capture useful for tests and deterministic playback.
#[derive(Clone, Debug, Default)]
pub struct MemoryCapture {
    pub channels: BTreeMap<String, MemoryChannel>,
    pub metadata_unreadable: bool,
}

impl MemoryCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, name: &str, channel: MemoryChannel) -> Self {
        self.channels.insert(name.to_owned(), channel);
        self
    }
}

#[derive(Clone, Debug)]
pub struct MemoryReader {
    capture: Arc<MemoryCapture>,
}

impl DrfReader for MemoryReader {
    fn channels(&self) -> Vec<String> {
        self.capture.channels.keys().cloned().collect()
    }

    fn bounds(&self, channel: &str) -> Option<(u64, u64)> {
        let channel = self.capture.channels.get(channel)?;
        if channel.samples.is_empty() {
            return None;
        }
        Some((channel.start_sample, channel.end_sample()))
    }

    fn read_vector(
        &self,
        start_sample: u64,
        num_samples: u64,
        channel: &str,
        subchannel: usize,
    ) -> Result<ReadOutcome, String> {
        let data = self
            .capture
            .channels
            .get(channel)
            .ok_or_else(|| format!("no such channel {channel}"))?;
        if subchannel != 0 {
            return Err(format!("subchannel {subchannel} out of range"));
        }
        let end = start_sample + num_samples;
        if overlaps(&data.broken, start_sample, end) {
            return Err(format!("corrupt block in [{start_sample}, {end})"));
        }
        if start_sample < data.start_sample
            || end > data.end_sample()
            || overlaps(&data.gaps, start_sample, end)
        {
            return Ok(ReadOutcome::Gap);
        }
        let offset = (start_sample - data.start_sample) as usize;
        Ok(ReadOutcome::Samples(
            data.samples[offset..offset + num_samples as usize].to_vec(),
        ))
    }

    fn read_metadata(
        &self,
        start_sample: u64,
        end_sample: u64,
        channel: &str,
    ) -> Result<Option<MetadataEntries>, String> {
        if self.capture.metadata_unreadable {
            return Err("metadata directory unreadable".into());
        }
        let Some(data) = self.capture.channels.get(channel) else {
            return Ok(None);
        };
        let entries: MetadataEntries = data
            .metadata
            .range(start_sample..end_sample)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        Ok((!entries.is_empty()).then_some(entries))
    }
}

/// Path-keyed store of in-memory captures and their properties files.
#[derive(Default)]
pub struct MemoryStore {
    captures: HashMap<PathBuf, Arc<MemoryCapture>>,
    properties: HashMap<PathBuf, Map<String, Value>>,
    opened: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capture and a `drf_properties.h5` entry for each of its channels.
    pub fn insert(
        &mut self,
        root: impl Into<PathBuf>,
        capture: MemoryCapture,
        sample_rate_numerator: u64,
        sample_rate_denominator: u64,
    ) {
        let root = root.into();
        for channel in capture.channels.keys() {
            let mut attrs = Map::new();
            attrs.insert("sample_rate_numerator".into(), sample_rate_numerator.into());
            attrs.insert("sample_rate_denominator".into(), sample_rate_denominator.into());
            self.properties
                .insert(root.join(channel).join("drf_properties.h5"), attrs);
        }
        self.captures.insert(root, Arc::new(capture));
    }

    pub fn set_properties(&mut self, path: impl Into<PathBuf>, attrs: Map<String, Value>) {
        self.properties.insert(path.into(), attrs);
    }

    /// Number of readers handed out so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl ReaderFactory for MemoryStore {
    type Reader = MemoryReader;

    fn open(&self, path: &Path) -> Result<MemoryReader, String> {
        let capture = self
            .captures
            .get(path)
            .ok_or_else(|| format!("{} is not a Digital RF directory", path.display()))?;
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryReader {
            capture: Arc::clone(capture),
        })
    }
}

impl PropertiesSource for MemoryStore {
    fn read_properties(&self, path: &Path) -> Result<Map<String, Value>, String> {
        self.properties
            .get(path)
            .cloned()
            .ok_or_else(|| format!("{} does not exist", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> MemoryReader {
        let samples = (0..100).map(|i| Complex32::new(i as f32, 0.0)).collect();
        let channel = MemoryChannel::new(1000, samples)
            .with_gap(1020..1030)
            .with_broken(1090..1095)
            .with_metadata(1000, serde_json::json!({"center_freq": 1.0e9}));
        let mut store = MemoryStore::new();
        store.insert("/cap", MemoryCapture::new().with_channel("ch0", channel), 1000, 1);
        store.open(Path::new("/cap")).unwrap()
    }

    #[test]
    fn reads_within_bounds() {
        let reader = reader();
        assert_eq!(reader.bounds("ch0"), Some((1000, 1100)));
        let ReadOutcome::Samples(s) = reader.read_vector(1000, 10, "ch0", 0).unwrap() else {
            panic!("expected samples");
        };
        assert_eq!(s.len(), 10);
        assert_eq!(s[3].re, 3.0);
    }

    #[test]
    fn gaps_and_failures_are_distinct() {
        let reader = reader();
        assert_eq!(
            reader.read_vector(1015, 10, "ch0", 0).unwrap(),
            ReadOutcome::Gap
        );
        assert!(reader.read_vector(1085, 10, "ch0", 0).is_err());
        assert_eq!(
            reader.read_vector(1095, 10, "ch0", 0).unwrap(),
            ReadOutcome::Gap
        );
    }

    #[test]
    fn metadata_is_range_limited() {
        let reader = reader();
        assert!(reader.read_metadata(1000, 1001, "ch0").unwrap().is_some());
        assert!(reader.read_metadata(1001, 1100, "ch0").unwrap().is_none());
    }
}
