use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::SecondsFormat;
use log::{debug, warn};
use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceDataError};
use crate::processing::params::WaterfallSliceParams;
use crate::processing::source::{DrfReader, ReadOutcome};

/// Power floor applied before taking the logarithm.
pub const POWER_FLOOR: f32 = 1e-12;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SliceCustomFields {
    pub channel_name: String,
    pub start_sample: u64,
    pub fft_size: usize,
    pub scan_time: f64,
    pub slice_index: u64,
}

/// One power spectrum of the waterfall, ready for JSON transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterfallSlice {
    /// Base64 of little-endian `f32` dB values, DC in the middle.
    pub data: String,
    pub data_type: String,
    pub timestamp: String,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub num_samples: u64,
    pub sample_rate: f64,
    pub center_frequency: f64,
    pub custom_fields: SliceCustomFields,
}

impl WaterfallSlice {
    pub fn decode_power(&self) -> Result<Vec<f32>> {
        let bytes = STANDARD
            .decode(&self.data)
            .map_err(|e| SourceDataError::MalformedPayload(e.to_string()))?;
        if bytes.len() % 4 != 0 {
            return Err(SourceDataError::MalformedPayload(format!(
                "{} bytes is not a whole number of float32 values",
                bytes.len()
            ))
            .into());
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

pub fn encode_power(power_db: &[f32]) -> String {
    let bytes: Vec<u8> = power_db.iter().flat_map(|v| v.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

/// Display range in dB.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerBounds {
    pub min: f64,
    pub max: f64,
}

/// Running min/max over finite values only.
#[derive(Clone, Copy, Debug, Default)]
pub struct PowerTracker {
    range: Option<(f32, f32)>,
}

impl PowerTracker {
    pub fn observe(&mut self, values: &[f32]) {
        for &v in values.iter().filter(|v| v.is_finite()) {
            self.range = Some(match self.range {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }
    }

    pub fn bounds(&self) -> Option<PowerBounds> {
        self.range.map(|(lo, hi)| PowerBounds {
            min: lo as f64,
            max: hi as f64,
        })
    }

    /// Bounds widened on both sides by `margin_fraction` of the observed span.
    pub fn bounds_with_margin(&self, margin_fraction: f64) -> Option<PowerBounds> {
        self.bounds().map(|b| {
            let margin = (b.max - b.min) * margin_fraction;
            PowerBounds {
                min: b.min - margin,
                max: b.max + margin,
            }
        })
    }
}

/// Computes windowless FFT slices for a fixed transform size.
pub struct SliceComputer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl SliceComputer {
    pub fn with_size(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self { fft_size, fft }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Shifted power spectrum in dB. Input is truncated or zero-padded to the FFT size.
    pub fn power_spectrum_db(&self, samples: &[Complex32]) -> Vec<f32> {
        let mut buffer: Vec<Complex32> = samples.iter().copied().take(self.fft_size).collect();
        buffer.resize(self.fft_size, Complex32::new(0.0, 0.0));
        self.fft.process(&mut buffer);
        // fftshift: negative frequencies first.
        buffer.rotate_left(self.fft_size.div_ceil(2));
        buffer
            .iter()
            .map(|c| 10.0 * c.norm_sqr().max(POWER_FLOOR).log10())
            .collect()
    }

    /// `Ok(None)` when the slice is empty or falls into a gap.
    pub fn process_slice<R: DrfReader>(
        &self,
        reader: &R,
        params: WaterfallSliceParams<'_>,
    ) -> Result<Option<WaterfallSlice>> {
        Ok(self
            .process_slice_with_power(reader, params)?
            .map(|(slice, _)| slice))
    }

    /// Same as [`process_slice`](Self::process_slice), also handing back the raw dB values.
    pub fn process_slice_with_power<R: DrfReader>(
        &self,
        reader: &R,
        params: WaterfallSliceParams<'_>,
    ) -> Result<Option<(WaterfallSlice, Vec<f32>)>> {
        let num_samples = params.slice_num_samples();
        if num_samples == 0 {
            return Ok(None);
        }
        let base = params.base();
        let start = params.slice_start_sample();
        let samples = match reader.read_vector(start, num_samples, base.channel(), 0) {
            Ok(ReadOutcome::Samples(samples)) => samples,
            Ok(ReadOutcome::Gap) => {
                debug!(
                    "slice {} of {} falls in a gap at sample {start}",
                    params.slice_idx(),
                    base.channel()
                );
                return Ok(None);
            }
            Err(reason) => {
                return Err(SourceDataError::Read {
                    channel: base.channel().to_owned(),
                    start,
                    reason,
                }
                .into())
            }
        };

        let power_db = self.power_spectrum_db(&samples);
        let sample_rate = base.sample_rate();
        let timestamp = match params.timestamp() {
            Some(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            None => {
                warn!(
                    "slice {} of {} starts at sample {start}, past the representable time range; leaving timestamp empty",
                    params.slice_idx(),
                    base.channel()
                );
                String::new()
            }
        };
        let slice = WaterfallSlice {
            data: encode_power(&power_db),
            data_type: "float32".to_owned(),
            timestamp,
            min_frequency: base.min_frequency(),
            max_frequency: base.max_frequency(),
            num_samples,
            sample_rate,
            center_frequency: base.center_freq(),
            custom_fields: SliceCustomFields {
                channel_name: base.channel().to_owned(),
                start_sample: start,
                fft_size: self.fft_size,
                scan_time: num_samples as f64 / sample_rate,
                slice_index: params.slice_idx(),
            },
        };
        Ok(Some((slice, power_db)))
    }
}
