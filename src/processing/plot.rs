use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use ndarray::Array2;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{Result, VisualizationError};
use crate::processing::colormap::Colormap;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub foreground: RGBColor,
    pub colormap: Colormap,
    /// Caption, axis labels, and colorbar ticks. Needs a system font.
    pub annotate: bool,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            background: RGBColor(10, 10, 10),
            foreground: WHITE,
            colormap: Colormap::default(),
            annotate: true,
        }
    }
}

/// A dB matrix (frequency rows from low to high, time columns) and the extent it covers.
#[derive(Clone, Debug)]
pub struct SpectrogramRaster<'a> {
    pub power_db: &'a Array2<f32>,
    pub time_extent: (f64, f64),
    /// Hz.
    pub freq_extent: (f64, f64),
    pub db_range: (f64, f64),
    pub title: String,
}

pub fn render_spectrogram_png(raster: &SpectrogramRaster<'_>, style: &PlotStyle) -> Result<Vec<u8>> {
    if raster.power_db.is_empty() {
        return Err(VisualizationError::Plot("spectrogram has no frames".into()));
    }
    if style.width < 100 || style.height < 100 {
        return Err(VisualizationError::Plot(format!(
            "image {}x{} is too small",
            style.width, style.height
        )));
    }
    let len = (style.width as usize)
        .checked_mul(style.height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| {
            VisualizationError::Plot(format!(
                "image {}x{} does not fit in memory",
                style.width, style.height
            ))
        })?;
    let mut buffer = vec![0u8; len];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let bar_width = (style.width / 8).clamp(40, 120);
        let (main, bar) = root.split_horizontally((style.width - bar_width) as i32);
        if style.annotate {
            draw_annotated(&main, &bar, raster, style)?;
        } else {
            paint_raster(&main.margin(10, 10, 10, 10), raster, style.colormap)?;
            paint_gradient(&bar.margin(10, 10, 10, 10), style.colormap)?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn draw_annotated(
    main: &Area<'_>,
    bar: &Area<'_>,
    raster: &SpectrogramRaster<'_>,
    style: &PlotStyle,
) -> Result<()> {
    let text = |size: f64| ("sans-serif", size).into_font().color(&style.foreground);
    let (t0, t1) = raster.time_extent;
    let (f0, f1) = (raster.freq_extent.0 / 1e6, raster.freq_extent.1 / 1e6);
    let mut chart = ChartBuilder::on(main)
        .margin(10)
        .caption(&raster.title, text(20.0))
        .set_label_area_size(LabelAreaPosition::Left, 80)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(t0..t1, f0..f1)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Time (s)")
        .y_desc("Frequency (MHz)")
        .axis_style(style.foreground)
        .label_style(text(13.0))
        .axis_desc_style(text(15.0))
        .draw()?;
    paint_raster(&chart.plotting_area().strip_coord_spec(), raster, style.colormap)?;

    let (lo, hi) = raster.db_range;
    let mut colorbar = ChartBuilder::on(bar)
        .margin_top(40)
        .margin_bottom(55)
        .margin_right(5)
        .set_label_area_size(LabelAreaPosition::Right, 55)
        .build_cartesian_2d(0f64..1f64, lo..hi)?;
    colorbar
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc("Power (dB)")
        .axis_style(style.foreground)
        .label_style(text(12.0))
        .axis_desc_style(text(13.0))
        .draw()?;
    paint_gradient(&colorbar.plotting_area().strip_coord_spec(), style.colormap)
}

/// Nearest-neighbour resample of the matrix onto every pixel of `area`, high frequencies on top.
fn paint_raster(area: &Area<'_>, raster: &SpectrogramRaster<'_>, colormap: Colormap) -> Result<()> {
    let (width, height) = area.dim_in_pixel();
    let (bins, frames) = raster.power_db.dim();
    let (lo, hi) = raster.db_range;
    let span = (hi - lo).max(f64::EPSILON);
    for px in 0..width {
        let col = (px as usize * frames / width as usize).min(frames - 1);
        for py in 0..height {
            let row = bins - 1 - (py as usize * bins / height as usize).min(bins - 1);
            let value = raster.power_db[[row, col]] as f64;
            area.draw_pixel((px as i32, py as i32), &colormap.map((value - lo) / span))?;
        }
    }
    Ok(())
}

fn paint_gradient(area: &Area<'_>, colormap: Colormap) -> Result<()> {
    let (width, height) = area.dim_in_pixel();
    let steps = height.saturating_sub(1).max(1) as f64;
    for py in 0..height {
        let color = colormap.map(1.0 - py as f64 / steps);
        for px in 0..width {
            area.draw_pixel((px as i32, py as i32), &color)?;
        }
    }
    Ok(())
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| VisualizationError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(bins: usize, frames: usize) -> Array2<f32> {
        Array2::from_shape_fn((bins, frames), |(r, c)| (r + c) as f32)
    }

    #[test]
    fn unannotated_render_is_a_png_of_requested_size() {
        let power = ramp(16, 8);
        let raster = SpectrogramRaster {
            power_db: &power,
            time_extent: (0.0, 1.0),
            freq_extent: (-5e5, 5e5),
            db_range: (0.0, 22.0),
            title: "test".into(),
        };
        let style = PlotStyle {
            width: 320,
            height: 200,
            annotate: false,
            ..Default::default()
        };
        let png = render_spectrogram_png(&raster, &style).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 200));

        let rgb = decoded.to_rgb8();
        // Top-left of the raster is the highest bin of the first frame.
        let top = *rgb.get_pixel(12, 12);
        let bottom = *rgb.get_pixel(12, 187);
        assert_ne!(top, bottom);
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let power = Array2::<f32>::zeros((0, 0));
        let raster = SpectrogramRaster {
            power_db: &power,
            time_extent: (0.0, 1.0),
            freq_extent: (0.0, 1.0),
            db_range: (0.0, 1.0),
            title: String::new(),
        };
        assert!(render_spectrogram_png(&raster, &PlotStyle::default()).is_err());
    }

    #[test]
    fn unaddressable_buffer_is_an_error() {
        let power = ramp(4, 4);
        let raster = SpectrogramRaster {
            power_db: &power,
            time_extent: (0.0, 1.0),
            freq_extent: (0.0, 1.0),
            db_range: (0.0, 1.0),
            title: String::new(),
        };
        let style = PlotStyle {
            width: u32::MAX,
            height: u32::MAX,
            annotate: false,
            ..Default::default()
        };
        let err = render_spectrogram_png(&raster, &style).unwrap_err();
        assert!(matches!(err, VisualizationError::Plot(_)));
    }
}
