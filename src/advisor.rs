//! Capability interface for the generative-AI collaborators.
//!
//! Two advisory calls sit next to the numeric pipeline: an image-quality
//! check and a natural-language report. Both are slow, remote and
//! non-deterministic, so they live behind a trait with explicit failure
//! fallbacks; nothing here can invalidate an already-computed prediction.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calibration::Model;
use crate::sample::Sample;

/// Failures of a collaborator call.
///
/// Deliberately a separate type from [`crate::Error`]: advisor failures stop
/// at the fallback wrappers below and never enter the numeric pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("advisor not available: {0}")]
    NotAvailable(String),

    #[error("advisor timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("invalid advisor response: {0}")]
    InvalidResponse(String),

    #[error("advisor backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Poor,
    Unknown,
}

/// Structured verdict of the image-quality check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub quality: Quality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

impl QualityVerdict {
    /// Verdict substituted when the collaborator cannot be reached.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            quality: Quality::Unknown,
            issue: Some("AI check failed".to_owned()),
        }
    }
}

/// Fallback text substituted when report generation fails.
pub const REPORT_FALLBACK: &str = "Could not generate AI report.";

/// A generative-AI collaborator that can vet assay photographs and narrate
/// prediction results.
pub trait Advisor {
    /// Assess lighting evenness and blur of an assay photograph.
    ///
    /// # Errors
    /// Transport, timeout and malformed-response failures surface as
    /// [`AdvisorError`]; callers on the display path should go through
    /// [`quality_or_unknown`] instead.
    fn check_quality(&self, image: &[u8]) -> ::std::result::Result<QualityVerdict, AdvisorError>;

    /// Short natural-language interpretation of a predicted sample.
    ///
    /// # Errors
    /// As [`Advisor::check_quality`]; display paths should use
    /// [`report_or_fallback`].
    fn generate_report(
        &self,
        model: &Model,
        sample: &Sample,
    ) -> ::std::result::Result<String, AdvisorError>;
}

/// Quality check that never fails: collaborator errors become an explicit
/// `unknown` verdict.
pub fn quality_or_unknown<A: Advisor + ?Sized>(advisor: &A, image: &[u8]) -> QualityVerdict {
    match advisor.check_quality(image) {
        Ok(verdict) => verdict,
        Err(error) => {
            warn!(%error, "image quality check degraded to unknown");
            QualityVerdict::unknown()
        }
    }
}

/// Report generation that never fails: collaborator errors become the fixed
/// fallback text.
pub fn report_or_fallback<A: Advisor + ?Sized>(
    advisor: &A,
    model: &Model,
    sample: &Sample,
) -> String {
    match advisor.generate_report(model, sample) {
        Ok(report) => report,
        Err(error) => {
            warn!(%error, "report generation degraded to fallback");
            REPORT_FALLBACK.to_owned()
        }
    }
}

/// Deterministic advisor for tests and offline runs: canned verdict and
/// report, optionally a simulated failure.
#[derive(Debug, Default)]
pub struct MockAdvisor {
    verdict: Option<QualityVerdict>,
    report: Option<String>,
    failing: bool,
}

impl MockAdvisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verdict(mut self, verdict: QualityVerdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    #[must_use]
    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    /// Make every call fail, for exercising the fallback paths.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

impl Advisor for MockAdvisor {
    fn check_quality(&self, _image: &[u8]) -> ::std::result::Result<QualityVerdict, AdvisorError> {
        if self.failing {
            return Err(AdvisorError::NotAvailable("simulated outage".to_owned()));
        }
        Ok(self.verdict.clone().unwrap_or(QualityVerdict {
            quality: Quality::Good,
            issue: None,
        }))
    }

    fn generate_report(
        &self,
        _model: &Model,
        _sample: &Sample,
    ) -> ::std::result::Result<String, AdvisorError> {
        if self.failing {
            return Err(AdvisorError::NotAvailable("simulated outage".to_owned()));
        }
        Ok(self
            .report
            .clone()
            .unwrap_or_else(|| "Mock report".to_owned()))
    }
}
