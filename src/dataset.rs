//! Batch ingestion of calibration photographs.
//!
//! Two entry points: scan a directory of images, auto-labeling from file
//! names, or follow a CSV manifest with explicit labels. Both reduce to a
//! sequence of independent [`crate::extract::extract_file`] calls.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::Deserialize;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::extract::extract_file;
use crate::sample::{concentration_from_name, Sample};
use crate::{Error, Result};

/// Extensions recognised when scanning a directory for assay photographs.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Load every assay photograph in `dir`, auto-labeling from file names.
///
/// File names carrying a number (`100cfu.jpg`, `2.5-dilution.png`) become
/// labeled training candidates; other images load unlabeled. Files without a
/// recognised image extension are skipped. Entries are processed in name
/// order so results do not depend on directory iteration order.
///
/// Callers intending to train should keep at least three labeled images;
/// that floor is policy, the engine itself only demands two.
///
/// # Errors
/// Filesystem failures and undecodable images abort the load; the error
/// names the offending path.
pub fn load_dir(dir: &Path, config: &ExtractionConfig) -> Result<Vec<Sample>> {
    let entries = fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.into(),
        source,
    })?;

    let mut samples = Vec::new();
    let paths = entries
        .map_ok(|entry| entry.path())
        .collect::<::std::result::Result<Vec<_>, _>>()
        .map_err(|source| Error::Io {
            path: dir.into(),
            source,
        })?;

    for path in paths.into_iter().sorted() {
        if !has_image_extension(&path) {
            continue;
        }
        let mut sample = extract_file(&path, config)?;
        if let Some(concentration) = concentration_from_name(&sample.name) {
            sample.concentration = Some(concentration);
        }
        samples.push(sample);
    }

    debug!(count = samples.len(), dir = %dir.display(), "loaded calibration directory");
    Ok(samples)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map_or(false, |ext| {
            IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
}

#[derive(Deserialize)]
struct Row {
    image: PathBuf,
    concentration: Option<f64>,
}

/// Load the samples listed in a CSV manifest of `image,concentration` rows.
///
/// Image paths resolve relative to the manifest's directory. An explicit
/// concentration overrides any number embedded in the file name; an empty
/// field falls back to the file-name label, and failing that the sample
/// stays unlabeled.
///
/// # Errors
/// Malformed CSV rows fail with [`Error::Manifest`]; extraction failures
/// propagate as in [`load_dir`].
pub fn load_manifest(path: &Path, config: &ExtractionConfig) -> Result<Vec<Sample>> {
    let raw = fs::read(path).map_err(|source| Error::Io {
        path: path.into(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(&raw[..]);
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut samples = Vec::new();
    for row in reader.deserialize() {
        let row: Row = row.map_err(|source| Error::Manifest {
            path: path.into(),
            source,
        })?;
        let mut sample = extract_file(&base.join(&row.image), config)?;
        sample.concentration = row
            .concentration
            .or_else(|| concentration_from_name(&sample.name));
        samples.push(sample);
    }

    debug!(count = samples.len(), manifest = %path.display(), "loaded manifest");
    Ok(samples)
}
