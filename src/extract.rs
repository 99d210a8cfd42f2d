//! Deterministic extraction of the optical signal from an assay photograph.
//!
//! The pipeline is decode, Gaussian denoise, centered region-of-interest
//! crop, per-channel mean reduction, then signal derivation. Each call is
//! independent: no state survives between extractions and nothing touches
//! the network.

use std::fs;
use std::path::Path;

use image::{imageops, RgbImage};
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::sample::Sample;
use crate::{Error, Result};

/// Channel means over a region of interest, 0-255 scale.
#[derive(Clone, Copy, Debug)]
pub struct ChannelMeans {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Extract a [`Sample`] from raw image bytes.
///
/// `name` identifies the source in results and error messages; it carries no
/// computational meaning.
///
/// # Errors
/// [`Error::InvalidConfig`] before any pixel work when the settings violate
/// their constraints, [`Error::Decode`] when the bytes are not a decodable
/// raster, [`Error::UnsupportedChannel`] for channels without a specified
/// signal formula.
#[allow(clippy::cast_possible_truncation)]
pub fn extract(bytes: &[u8], name: &str, config: &ExtractionConfig) -> Result<Sample> {
    config.validate()?;

    let decoded = image::load_from_memory(bytes).map_err(|source| Error::Decode {
        name: name.to_owned(),
        source,
    })?;
    let mut rgb = decoded.to_rgb8();

    if config.blur_radius > 0.0 {
        rgb = imageops::blur(&rgb, config.blur_radius as f32);
    }

    let means = roi_means(&rgb, config.roi_size);
    let ratio = config.target_channel.derive(means.r, means.g, means.b)?;

    debug!(
        name,
        r = means.r,
        g = means.g,
        b = means.b,
        ratio,
        "extracted optical signal"
    );

    Ok(Sample::new(name, means.r, means.g, means.b, ratio))
}

/// Extract a [`Sample`] from an image file, named after the file.
///
/// # Errors
/// As [`extract`], plus [`Error::Io`] when the file cannot be read.
pub fn extract_file(path: &Path, config: &ExtractionConfig) -> Result<Sample> {
    let bytes = fs::read(path).map_err(|source| Error::Io {
        path: path.into(),
        source,
    })?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    extract(&bytes, &name, config)
}

/// Centered crop rectangle as `(x0, y0, width, height)`.
///
/// Dimensions are `round(dim * roi_size)` clamped to at least one pixel;
/// margins split evenly with the left/top margin taking the floor.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn roi_rect(width: u32, height: u32, roi_size: f64) -> (u32, u32, u32, u32) {
    let crop_w = ((f64::from(width) * roi_size).round() as u32).clamp(1, width);
    let crop_h = ((f64::from(height) * roi_size).round() as u32).clamp(1, height);
    let x0 = (width - crop_w) / 2;
    let y0 = (height - crop_h) / 2;
    (x0, y0, crop_w, crop_h)
}

fn roi_means(image: &RgbImage, roi_size: f64) -> ChannelMeans {
    let (x0, y0, crop_w, crop_h) = roi_rect(image.width(), image.height(), roi_size);

    let mut sum = [0.0_f64; 3];
    for y in y0..y0 + crop_h {
        for x in x0..x0 + crop_w {
            let pixel = image.get_pixel(x, y);
            sum[0] += f64::from(pixel[0]);
            sum[1] += f64::from(pixel[1]);
            sum[2] += f64::from(pixel[2]);
        }
    }

    let count = f64::from(crop_w) * f64::from(crop_h);
    ChannelMeans {
        r: sum[0] / count,
        g: sum[1] / count,
        b: sum[2] / count,
    }
}
