use std::fmt;
use std::str::FromStr;

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Spectrogram colour scales.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Colormap {
    Viridis,
    Plasma,
    #[default]
    Magma,
    Inferno,
    Turbo,
    Grayscale,
}

// Polynomial fits of the matplotlib maps, lowest order first, one row per channel.
type Fit = [[f64; 6]; 3];

const VIRIDIS: Fit = [
    [0.267, 0.329, 1.451, -1.808, 0.758, 0.0],
    [0.004, 1.513, -0.838, 0.731, -0.466, 0.0],
    [0.329, 1.442, -2.642, 1.963, -0.440, 0.0],
];
const PLASMA: Fit = [
    [0.050, 2.735, -2.811, 1.327, -0.259, 0.0],
    [0.030, 0.259, 2.042, -2.802, 1.429, 0.0],
    [0.528, 1.502, -3.489, 3.003, -0.985, 0.0],
];
const MAGMA: Fit = [
    [0.001, 0.912, 1.287, -1.466, 0.532, 0.0],
    [0.000, 0.188, 1.612, -1.681, 0.859, 0.0],
    [0.014, 1.937, -2.578, 2.079, -0.570, 0.0],
];
const INFERNO: Fit = [
    [0.000, 1.132, 0.737, -0.972, 0.441, 0.0],
    [0.000, 0.142, 1.746, -1.834, 0.926, 0.0],
    [0.016, 1.980, -2.897, 2.182, -0.565, 0.0],
];
const TURBO: Fit = [
    [0.13572, 4.6153, -42.660, 132.13, -152.95, 56.14],
    [0.09140, 2.9243, 1.5424, -26.155, 38.792, -16.29],
    [0.10667, 12.750, -60.582, 132.33, -134.87, 50.36],
];

fn eval(coeffs: &[f64; 6], t: f64) -> u8 {
    let v = coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c);
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

impl Colormap {
    pub const ALL: [Colormap; 6] = [
        Colormap::Viridis,
        Colormap::Plasma,
        Colormap::Magma,
        Colormap::Inferno,
        Colormap::Turbo,
        Colormap::Grayscale,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Colormap::Viridis => "viridis",
            Colormap::Plasma => "plasma",
            Colormap::Magma => "magma",
            Colormap::Inferno => "inferno",
            Colormap::Turbo => "turbo",
            Colormap::Grayscale => "grayscale",
        }
    }

    /// Colour for a value already normalised to `[0, 1]`; out-of-range input is clamped.
    pub fn map(&self, value: f64) -> RGBColor {
        let t = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let fit = match self {
            Colormap::Viridis => &VIRIDIS,
            Colormap::Plasma => &PLASMA,
            Colormap::Magma => &MAGMA,
            Colormap::Inferno => &INFERNO,
            Colormap::Turbo => &TURBO,
            Colormap::Grayscale => {
                let v = (t * 255.0) as u8;
                return RGBColor(v, v, v);
            }
        };
        RGBColor(eval(&fit[0], t), eval(&fit[1], t), eval(&fit[2], t))
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Colormap {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if matches!(wanted.as_str(), "gray" | "grey" | "greys") {
            return Ok(Colormap::Grayscale);
        }
        Colormap::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| ConfigurationError::InvalidParameter {
                name: "colormap",
                reason: format!("unknown colormap {s:?}"),
            })
    }
}

impl TryFrom<String> for Colormap {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Viridis".parse::<Colormap>().unwrap(), Colormap::Viridis);
        assert_eq!("grey".parse::<Colormap>().unwrap(), Colormap::Grayscale);
        assert!("jet".parse::<Colormap>().is_err());
    }

    #[test]
    fn deserializes_through_the_same_parser() {
        let parsed: Vec<Colormap> =
            serde_json::from_str(r#"["Viridis", "TURBO", "grey", "magma"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![Colormap::Viridis, Colormap::Turbo, Colormap::Grayscale, Colormap::Magma]
        );
        assert!(serde_json::from_str::<Colormap>(r#""jet""#).is_err());
        assert_eq!(serde_json::to_string(&Colormap::Inferno).unwrap(), r#""inferno""#);
    }

    #[test]
    fn grayscale_spans_black_to_white() {
        assert_eq!(Colormap::Grayscale.map(0.0), RGBColor(0, 0, 0));
        assert_eq!(Colormap::Grayscale.map(1.0), RGBColor(255, 255, 255));
        assert_eq!(Colormap::Grayscale.map(7.0), RGBColor(255, 255, 255));
    }

    #[test]
    fn magma_brightens_with_power() {
        let lum = |c: RGBColor| c.0 as u32 + c.1 as u32 + c.2 as u32;
        let dark = Colormap::Magma.map(0.0);
        let bright = Colormap::Magma.map(1.0);
        assert!(lum(bright) > lum(dark));
        assert_eq!(Colormap::Magma.map(f64::NAN), dark);
    }
}
