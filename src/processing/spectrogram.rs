use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use ndarray::Array2;
use rustfft::{num_complex::Complex32, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceDataError, VisualizationError};
use crate::processing::colormap::Colormap;
use crate::processing::fft::{PowerBounds, PowerTracker, POWER_FLOOR};
use crate::processing::params::DigitalRfParameterValidator;
use crate::processing::plot::{render_spectrogram_png, PlotStyle, SpectrogramRaster};
use crate::processing::source::{DrfReader, PropertiesSource, ReadOutcome, ReaderFactory};

/// Largest accepted image width or height, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 16_384;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramParams {
    pub fft_size: usize,
    /// Gaussian window standard deviation, in samples.
    pub std_dev: f64,
    pub hop_size: usize,
    pub colormap: Colormap,
    pub width: u32,
    pub height: u32,
    pub annotated: bool,
}

impl Default for SpectrogramParams {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            std_dev: 100.0,
            hop_size: 500,
            colormap: Colormap::Magma,
            width: 1000,
            height: 600,
            annotated: true,
        }
    }
}

impl SpectrogramParams {
    pub fn validate(&self) -> Result<()> {
        if self.fft_size == 0 {
            return Err(VisualizationError::invalid("fft_size", "must be greater than zero"));
        }
        if self.hop_size == 0 {
            return Err(VisualizationError::invalid("hop_size", "must be greater than zero"));
        }
        if !(self.std_dev.is_finite() && self.std_dev > 0.0) {
            return Err(VisualizationError::invalid(
                "std_dev",
                format!("must be positive, got {}", self.std_dev),
            ));
        }
        if self.width < 100 || self.height < 100 {
            return Err(VisualizationError::invalid(
                "dimensions",
                format!("{}x{} is below the 100x100 minimum", self.width, self.height),
            ));
        }
        if self.width > MAX_IMAGE_DIMENSION || self.height > MAX_IMAGE_DIMENSION {
            return Err(VisualizationError::invalid(
                "dimensions",
                format!(
                    "{}x{} exceeds the {MAX_IMAGE_DIMENSION}x{MAX_IMAGE_DIMENSION} maximum",
                    self.width, self.height
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramMetadata {
    pub center_frequency: f64,
    pub sample_rate: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub fft_size: usize,
    pub channel: String,
    pub total_samples: u64,
    pub hop_size: usize,
    pub std_dev: f64,
    pub colormap: Colormap,
    pub width: u32,
    pub height: u32,
    pub num_frames: usize,
    /// Seconds relative to the first sample.
    pub time_extent: (f64, f64),
    pub power_bounds: PowerBounds,
}

#[derive(Clone, Debug)]
pub struct SpectrogramOutput {
    pub image_path: PathBuf,
    pub metadata: SpectrogramMetadata,
}

/// Symmetric Gaussian window of `len` points.
pub fn gaussian_window(len: usize, std_dev: f64) -> Vec<f32> {
    let mid = (len as f64 - 1.0) / 2.0;
    (0..len)
        .map(|n| {
            let x = (n as f64 - mid) / std_dev;
            (-0.5 * x * x).exp() as f32
        })
        .collect()
}

/// Power in dB per (frequency bin, frame), DC in the middle row.
///
/// Frame `p` is centred on sample `p * hop`; samples outside the signal count as zero.
pub fn stft_power_db(samples: &[Complex32], window: &[f32], hop: usize) -> Array2<f32> {
    let m = window.len();
    if samples.is_empty() || m == 0 || hop == 0 {
        return Array2::zeros((m, 0));
    }
    let frames = (samples.len() - 1) / hop + 1;
    let mid = m / 2;
    let fft = FftPlanner::<f32>::new().plan_fft_forward(m);
    let mut power_db = Array2::zeros((m, frames));
    let mut buffer = vec![Complex32::new(0.0, 0.0); m];
    for p in 0..frames {
        let centre = p * hop;
        for (k, (slot, w)) in buffer.iter_mut().zip(window).enumerate() {
            *slot = (centre + k)
                .checked_sub(mid)
                .and_then(|idx| samples.get(idx))
                .map_or(Complex32::new(0.0, 0.0), |s| *s * *w);
        }
        fft.process(&mut buffer);
        buffer.rotate_left(m.div_ceil(2));
        for (dst, c) in power_db.column_mut(p).iter_mut().zip(&buffer) {
            *dst = 10.0 * c.norm_sqr().max(POWER_FLOOR).log10();
        }
    }
    power_db
}

/// Whole-range spectrogram images. Reads the full channel in a single call.
pub struct SpectrogramEngine<'a, F: ReaderFactory, P: PropertiesSource> {
    validator: DigitalRfParameterValidator<'a, F, P>,
    output_dir: Option<PathBuf>,
}

impl<'a, F: ReaderFactory, P: PropertiesSource> SpectrogramEngine<'a, F, P> {
    pub fn new(readers: &'a F, properties: &'a P) -> Self {
        Self {
            validator: DigitalRfParameterValidator::new(readers, properties),
            output_dir: None,
        }
    }

    /// Images go to the system temp directory unless set.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn generate(
        &self,
        drf_path: &Path,
        channel: &str,
        params: &SpectrogramParams,
    ) -> Result<SpectrogramOutput> {
        params.validate()?;
        let validated = self.validator.validate(drf_path, channel, params.fft_size)?;
        let drf = &validated.params;
        let total = drf.total_samples();

        let samples = match validated
            .reader
            .read_vector(drf.start_sample(), total, channel, 0)
        {
            Ok(ReadOutcome::Samples(samples)) => samples,
            Ok(ReadOutcome::Gap) => {
                return Err(SourceDataError::Read {
                    channel: channel.to_owned(),
                    start: drf.start_sample(),
                    reason: "missing data block inside the requested range".into(),
                }
                .into())
            }
            Err(reason) => {
                return Err(SourceDataError::Read {
                    channel: channel.to_owned(),
                    start: drf.start_sample(),
                    reason,
                }
                .into())
            }
        };

        let window = gaussian_window(params.fft_size, params.std_dev);
        let power_db = stft_power_db(&samples, &window, params.hop_size);
        let num_frames = power_db.ncols();
        let sample_rate = drf.sample_rate();
        let hop_secs = params.hop_size as f64 / sample_rate;
        let time_extent = (-0.5 * hop_secs, (num_frames as f64 - 0.5) * hop_secs);

        let mut tracker = PowerTracker::default();
        if let Some(values) = power_db.as_slice() {
            tracker.observe(values);
        } else {
            tracker.observe(&power_db.iter().copied().collect::<Vec<_>>());
        }
        let floor_db = 10.0 * (POWER_FLOOR as f64).log10();
        let mut power_bounds = tracker.bounds().unwrap_or(PowerBounds {
            min: floor_db,
            max: floor_db,
        });
        if power_bounds.max - power_bounds.min < 1e-6 {
            power_bounds.min -= 1.0;
            power_bounds.max += 1.0;
        }

        let raster = SpectrogramRaster {
            power_db: &power_db,
            time_extent,
            freq_extent: (drf.min_frequency(), drf.max_frequency()),
            db_range: (power_bounds.min, power_bounds.max),
            title: format!("{channel} @ {:.3} MHz", drf.center_freq() / 1e6),
        };
        let style = PlotStyle {
            width: params.width,
            height: params.height,
            colormap: params.colormap,
            annotate: params.annotated,
            ..Default::default()
        };
        let png = render_spectrogram_png(&raster, &style)?;
        let image_path = self.write_image(&png)?;
        info!(
            "rendered {num_frames}-frame spectrogram of {channel} to {}",
            image_path.display()
        );

        Ok(SpectrogramOutput {
            image_path,
            metadata: SpectrogramMetadata {
                center_frequency: drf.center_freq(),
                sample_rate,
                min_frequency: drf.min_frequency(),
                max_frequency: drf.max_frequency(),
                fft_size: params.fft_size,
                channel: channel.to_owned(),
                total_samples: total,
                hop_size: params.hop_size,
                std_dev: params.std_dev,
                colormap: params.colormap,
                width: params.width,
                height: params.height,
                num_frames,
                time_extent,
                power_bounds,
            },
        })
    }

    fn write_image(&self, png: &[u8]) -> Result<PathBuf> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("spectrogram-").suffix(".png");
            b
        };
        let mut file = match &self.output_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(png)?;
        let (_, path) = file.keep().map_err(|e| VisualizationError::Io(e.error))?;
        Ok(path)
    }
}
