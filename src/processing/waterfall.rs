use std::path::Path;
use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{Result, SourceDataError};
use crate::processing::fft::{PowerBounds, PowerTracker, SliceComputer, WaterfallSlice};
use crate::processing::params::{DigitalRfParameterValidator, DigitalRfParams};
use crate::processing::source::{PropertiesSource, ReaderFactory};

/// Descriptive summary of a channel's waterfall; computable without reading samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterfallMetadata {
    pub center_frequency: f64,
    pub sample_rate: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub total_slices: u64,
    pub slices_processed: usize,
    pub fft_size: usize,
    pub samples_per_slice: u64,
    pub channel: String,
}

impl WaterfallMetadata {
    fn describe(params: &DigitalRfParams, samples_per_slice: u64, slices_processed: usize) -> Self {
        Self {
            center_frequency: params.center_freq(),
            sample_rate: params.sample_rate(),
            min_frequency: params.min_frequency(),
            max_frequency: params.max_frequency(),
            total_slices: params.total_slices(samples_per_slice),
            slices_processed,
            fft_size: params.fft_size(),
            samples_per_slice,
            channel: params.channel().to_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct WaterfallRange {
    pub slices: Vec<WaterfallSlice>,
    pub total_slices: u64,
    pub start_index: u64,
    pub end_index: u64,
    pub metadata: WaterfallMetadata,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConversionMetadata {
    #[serde(flatten)]
    pub waterfall: WaterfallMetadata,
    pub power_bounds: PowerBounds,
    pub slices_skipped: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct FullConversion {
    pub json_data: Vec<WaterfallSlice>,
    pub metadata: ConversionMetadata,
}

impl FullConversion {
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&self.json_data)
            .map_err(|e| SourceDataError::MalformedPayload(e.to_string()).into())
    }
}

/// Slice-oriented access to one capture channel. Every call opens its own reader.
pub struct WaterfallEngine<'a, F: ReaderFactory, P: PropertiesSource> {
    validator: DigitalRfParameterValidator<'a, F, P>,
    config: EngineConfig,
}

impl<'a, F: ReaderFactory, P: PropertiesSource> WaterfallEngine<'a, F, P> {
    pub fn new(readers: &'a F, properties: &'a P, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            validator: DigitalRfParameterValidator::new(readers, properties),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get_metadata(&self, drf_path: &Path, channel: &str) -> Result<WaterfallMetadata> {
        let validated = self
            .validator
            .validate(drf_path, channel, self.config.fft_size)?;
        Ok(WaterfallMetadata::describe(
            &validated.params,
            self.config.samples_per_slice,
            0,
        ))
    }

    /// Slices `[start_index, end_index)` after clamping both ends to the capture.
    pub fn compute_range(
        &self,
        drf_path: &Path,
        channel: &str,
        start_index: i64,
        end_index: i64,
    ) -> Result<WaterfallRange> {
        let validated = self
            .validator
            .validate(drf_path, channel, self.config.fft_size)?;
        let params = &validated.params;
        let samples_per_slice = self.config.samples_per_slice;
        let total_slices = params.total_slices(samples_per_slice);

        let start = start_index.max(0) as u64;
        if start >= total_slices {
            return Ok(WaterfallRange {
                slices: Vec::new(),
                total_slices,
                start_index: start,
                end_index: start,
                metadata: WaterfallMetadata::describe(params, samples_per_slice, 0),
            });
        }
        let end = (end_index.max(0) as u64).clamp(start, total_slices);

        let computer = SliceComputer::with_size(params.fft_size());
        let mut slices = Vec::with_capacity((end - start) as usize);
        let mut failed = 0usize;
        for idx in start..end {
            match computer.process_slice(&validated.reader, params.slice(idx, samples_per_slice))? {
                Some(slice) => slices.push(slice),
                None => failed += 1,
            }
        }
        if failed > 0 {
            warn!("{failed} of {} slices unavailable for {channel} in [{start}, {end})", end - start);
        }
        info!(
            "computed {} waterfall slices for {channel} in [{start}, {end}) of {total_slices}",
            slices.len()
        );
        let metadata = WaterfallMetadata::describe(params, samples_per_slice, slices.len());
        Ok(WaterfallRange {
            slices,
            total_slices,
            start_index: start,
            end_index: end,
            metadata,
        })
    }

    /// Estimates display bounds with the configured margin.
    pub fn estimate_power_bounds(&self, drf_path: &Path, channel: &str) -> Result<Option<PowerBounds>> {
        self.estimate_power_bounds_with_margin(drf_path, channel, self.config.power_bounds_margin)
    }

    /// Samples the first, middle, and last slice; `None` if none of them yields a finite value.
    pub fn estimate_power_bounds_with_margin(
        &self,
        drf_path: &Path,
        channel: &str,
        margin_fraction: f64,
    ) -> Result<Option<PowerBounds>> {
        let validated = self
            .validator
            .validate(drf_path, channel, self.config.fft_size)?;
        let params = &validated.params;
        let samples_per_slice = self.config.samples_per_slice;
        let total_slices = params.total_slices(samples_per_slice);
        if total_slices == 0 {
            return Ok(None);
        }

        let mut indices = vec![0, total_slices / 2, total_slices - 1];
        indices.dedup();
        let computer = SliceComputer::with_size(params.fft_size());
        let mut tracker = PowerTracker::default();
        for idx in indices {
            if let Some(slice) =
                computer.process_slice(&validated.reader, params.slice(idx, samples_per_slice))?
            {
                tracker.observe(&slice.decode_power()?);
            }
        }
        Ok(tracker.bounds_with_margin(margin_fraction))
    }

    /// Every slice from index 0, up to `max_slices`. Fails if no slice could be computed.
    pub fn convert_full(
        &self,
        drf_path: &Path,
        channel: &str,
        max_slices: Option<u64>,
    ) -> Result<FullConversion> {
        let validated = self
            .validator
            .validate(drf_path, channel, self.config.fft_size)?;
        let params = &validated.params;
        let samples_per_slice = self.config.samples_per_slice;
        let total_slices = params.total_slices(samples_per_slice);
        let to_process = max_slices.map_or(total_slices, |m| m.min(total_slices));
        info!("converting {to_process} of {total_slices} slices for {channel}");

        let computer = SliceComputer::with_size(params.fft_size());
        let mut json_data = Vec::with_capacity(to_process as usize);
        let mut tracker = PowerTracker::default();
        let mut skipped = 0usize;
        let started = Instant::now();
        let mut last_report = started;
        for idx in 0..to_process {
            match computer
                .process_slice_with_power(&validated.reader, params.slice(idx, samples_per_slice))?
            {
                Some((slice, power_db)) => {
                    tracker.observe(&power_db);
                    json_data.push(slice);
                }
                None => skipped += 1,
            }
            if last_report.elapsed() >= self.config.progress_interval() {
                last_report = Instant::now();
                info!(
                    "{channel}: {}/{to_process} slices ({skipped} skipped) after {:.1}s",
                    idx + 1,
                    started.elapsed().as_secs_f64()
                );
            }
        }

        let power_bounds = match tracker.bounds() {
            Some(bounds) if !json_data.is_empty() => bounds,
            _ => {
                return Err(SourceDataError::NoUsableSlices {
                    channel: channel.to_owned(),
                    skipped,
                }
                .into())
            }
        };
        if skipped > 0 {
            warn!("{skipped} slices skipped while converting {channel}");
        }
        info!(
            "converted {} slices for {channel} in {:.1}s",
            json_data.len(),
            started.elapsed().as_secs_f64()
        );
        let metadata = ConversionMetadata {
            waterfall: WaterfallMetadata::describe(params, samples_per_slice, json_data.len()),
            power_bounds,
            slices_skipped: skipped,
        };
        Ok(FullConversion {
            json_data,
            metadata,
        })
    }
}
