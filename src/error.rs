use std::path::PathBuf;

use crate::config::TargetChannel;

/// Failures of the numeric pipeline.
///
/// Collaborator (generative-AI) failures are deliberately absent: they live
/// in [`crate::advisor::AdvisorError`] and stop at the fallback wrappers
/// instead of propagating into extraction or fitting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input bytes could not be interpreted as a raster image.
    #[error("could not decode image `{name}`")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    /// An extraction setting violates its constraints.
    #[error("invalid extraction config: {reason}")]
    InvalidConfig { reason: String },

    /// The configured channel has no specified signal formula.
    #[error("no signal derivation implemented for channel {0}")]
    UnsupportedChannel(TargetChannel),

    /// A sample entered the fit without a ground-truth concentration.
    #[error("sample `{name}` has no concentration label")]
    MissingLabel { name: String },

    #[error("not enough samples: have {have}, need at least {need}")]
    NotEnoughSamples { have: usize, need: usize },

    /// The data cannot determine a unique calibration line.
    #[error("degenerate fit: {reason}")]
    DegenerateFit { reason: String },

    /// Inverse prediction was requested against a flat calibration line.
    #[error("calibration line has zero slope and cannot be inverted")]
    DegenerateModel,

    #[error("train fraction {0} must lie strictly between 0 and 1")]
    InvalidTrainFraction(f64),

    #[error("failed to read `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest `{path}`")]
    Manifest {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed config `{path}`")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
