use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigurationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureType {
    DigitalRf,
    RadioHound,
}

impl CaptureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureType::DigitalRf => "drf",
            CaptureType::RadioHound => "rh",
        }
    }
}

impl fmt::Display for CaptureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drf" | "digital_rf" | "digitalrf" => Ok(CaptureType::DigitalRf),
            "rh" | "radiohound" | "radio_hound" => Ok(CaptureType::RadioHound),
            _ => Err(ConfigurationError::UnsupportedCaptureType(s.to_owned())),
        }
    }
}

/// Reference to a recorded capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub uuid: String,
    pub capture_type: CaptureType,
    pub channel: String,
}

impl Capture {
    pub fn new(uuid: impl Into<String>, capture_type: CaptureType, channel: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            capture_type,
            channel: channel.into(),
        }
    }
}

/// A physical file belonging to a capture's channel directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFile {
    pub name: String,
    pub directory: String,
    pub capture_uuid: String,
}

impl BlockFile {
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<String>,
        capture_uuid: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            capture_uuid: capture_uuid.into(),
        }
    }

    pub fn is_data_block(&self) -> bool {
        super::codec::is_canonical(&self.name)
    }
}

/// Metadata index holding one document per capture.
pub trait CaptureIndex {
    /// `Ok(None)` means the document does not exist.
    fn find(&self, index: &str, capture_uuid: &str) -> Result<Option<Value>, String>;
}

/// Lists the files stored for a capture.
pub trait BlockFileCatalog {
    fn list(&self, capture: &Capture) -> Result<Vec<BlockFile>, String>;
}

/// In-memory index keyed by `(index, uuid)`.
#[derive(Default)]
pub struct MemoryIndex {
    documents: HashMap<(String, String), Value>,
    unavailable: bool,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_bounds(&mut self, index: &str, uuid: &str, start_time: i64, end_time: i64) {
        let document = serde_json::json!({
            "search_props": { "start_time": start_time, "end_time": end_time }
        });
        self.insert(index, uuid, document);
    }

    pub fn insert(&mut self, index: &str, uuid: &str, document: Value) {
        self.documents
            .insert((index.to_owned(), uuid.to_owned()), document);
    }

    /// Makes every lookup fail as if the index were unreachable.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }
}

impl CaptureIndex for MemoryIndex {
    fn find(&self, index: &str, capture_uuid: &str) -> Result<Option<Value>, String> {
        if self.unavailable {
            return Err("index unavailable".into());
        }
        Ok(self
            .documents
            .get(&(index.to_owned(), capture_uuid.to_owned()))
            .cloned())
    }
}

/// In-memory catalog keyed by capture uuid.
#[derive(Default)]
pub struct MemoryCatalog {
    files: HashMap<String, Vec<BlockFile>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, capture: &Capture, names: &[&str]) {
        let directory = format!("{}/{}", capture.uuid, capture.channel);
        let entry = self.files.entry(capture.uuid.clone()).or_default();
        entry.extend(
            names
                .iter()
                .map(|name| BlockFile::new(*name, directory.clone(), capture.uuid.clone())),
        );
    }
}

impl BlockFileCatalog for MemoryCatalog {
    fn list(&self, capture: &Capture) -> Result<Vec<BlockFile>, String> {
        Ok(self.files.get(&capture.uuid).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_type_parses_aliases() {
        assert_eq!("DRF".parse::<CaptureType>().unwrap(), CaptureType::DigitalRf);
        assert_eq!("rh".parse::<CaptureType>().unwrap(), CaptureType::RadioHound);
        assert!("sigmf".parse::<CaptureType>().is_err());
    }

    #[test]
    fn data_blocks_are_recognised_by_name() {
        assert!(BlockFile::new("rf@1000.000.h5", "d", "u").is_data_block());
        assert!(!BlockFile::new("drf_properties.h5", "d", "u").is_data_block());
    }
}
