use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which optical signal is derived from the ROI channel means.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetChannel {
    /// Green-to-red ratio, the dual-mode signal of TMB catalysis.
    #[serde(rename = "G/R")]
    GreenRed,
    /// Green-to-blue ratio. Declared by the data model, no formula specified.
    #[serde(rename = "G/B")]
    GreenBlue,
    /// Raw mean intensity. Declared by the data model, no formula specified.
    #[serde(rename = "Intensity")]
    Intensity,
}

impl TargetChannel {
    /// Derive the scalar signal from the ROI channel means.
    ///
    /// A red mean of exactly zero maps to a signal of zero, the assay's
    /// detection-floor convention.
    ///
    /// # Errors
    /// [`Error::UnsupportedChannel`] for the declared-but-unspecified
    /// variants; their formulas are not guessed.
    pub fn derive(self, r: f64, g: f64, _b: f64) -> Result<f64> {
        match self {
            Self::GreenRed => Ok(if r == 0.0 { 0.0 } else { g / r }),
            Self::GreenBlue | Self::Intensity => Err(Error::UnsupportedChannel(self)),
        }
    }
}

impl fmt::Display for TargetChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::GreenRed => "G/R",
            Self::GreenBlue => "G/B",
            Self::Intensity => "Intensity",
        };
        f.write_str(label)
    }
}

/// Preprocessing settings for one extraction call.
///
/// There is no process-wide default: every call to
/// [`crate::extract::extract`] receives its own immutable copy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Gaussian denoising radius in pixels; 0 disables smoothing.
    pub blur_radius: f64,
    /// Fraction of each linear dimension kept by the centered crop, in (0, 1].
    pub roi_size: f64,
    /// Signal derivation applied to the ROI channel means.
    pub target_channel: TargetChannel,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            blur_radius: 2.0,
            roi_size: 0.5,
            target_channel: TargetChannel::GreenRed,
        }
    }
}

impl ExtractionConfig {
    /// Check the constraints before any pixel work is done.
    ///
    /// # Errors
    /// [`Error::InvalidConfig`] when `roi_size` falls outside `(0, 1]` or
    /// `blur_radius` is negative or non-finite.
    pub fn validate(&self) -> Result<()> {
        if !(self.roi_size > 0.0 && self.roi_size <= 1.0) {
            return Err(Error::InvalidConfig {
                reason: format!("roi_size {} outside (0, 1]", self.roi_size),
            });
        }
        if !(self.blur_radius >= 0.0 && self.blur_radius.is_finite()) {
            return Err(Error::InvalidConfig {
                reason: format!("blur_radius {} must be finite and >= 0", self.blur_radius),
            });
        }
        Ok(())
    }

    /// Load and validate settings from a TOML file.
    ///
    /// # Errors
    /// Propagates read failures, parse failures and constraint violations.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.into(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| Error::Config {
            path: path.into(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}
