//! Gemini implementation of the advisor interface.
//!
//! Talks to the `generateContent` endpoint with a bounded timeout. The
//! quality check ships the photograph inline and asks for a structured JSON
//! verdict; the report call is plain text in, plain text out.

use std::time::Duration;

use base64::Engine;
use serde_json::json;

use crate::advisor::{Advisor, AdvisorError, QualityVerdict};
use crate::calibration::Model;
use crate::sample::Sample;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const QUALITY_PROMPT: &str = "Check this image for a scientific colorimetric test. \
    Is the lighting even? Is the image blurry? \
    Answer in JSON format: { \"quality\": \"good\" | \"poor\", \"issue\": \"...\" }";

/// Client for the Gemini `generateContent` API.
#[derive(Debug)]
pub struct GeminiAdvisor {
    base_url: String,
    api_key: String,
    model_name: String,
    timeout: Duration,
}

impl GeminiAdvisor {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: API_BASE.to_owned(),
            api_key: api_key.into(),
            model_name: DEFAULT_MODEL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Read the API key from `GEMINI_API_KEY`.
    ///
    /// # Errors
    /// [`AdvisorError::NotAvailable`] when the variable is unset, so callers
    /// can degrade to the fallback values instead of panicking at startup.
    pub fn from_env() -> ::std::result::Result<Self, AdvisorError> {
        std::env::var("GEMINI_API_KEY")
            .map(Self::new)
            .map_err(|_| AdvisorError::NotAvailable("GEMINI_API_KEY is not set".to_owned()))
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point the client at a different host, e.g. a local stub in tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[allow(clippy::cast_possible_truncation)]
    fn generate(&self, body: &serde_json::Value) -> ::std::result::Result<String, AdvisorError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model_name, self.api_key
        );

        let response = ureq::post(&url)
            .timeout(self.timeout)
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(|error| match error {
                ureq::Error::Status(code, response) => {
                    let body = response.into_string().unwrap_or_default();
                    AdvisorError::Backend(format!("API error {code}: {body}"))
                }
                ureq::Error::Transport(transport) => {
                    let message = transport.to_string();
                    if message.contains("timeout") || message.contains("timed out") {
                        AdvisorError::Timeout {
                            elapsed_ms: self.timeout.as_millis() as u64,
                        }
                    } else {
                        AdvisorError::NotAvailable(format!("transport error: {message}"))
                    }
                }
            })?;

        let json: serde_json::Value = response
            .into_json()
            .map_err(|error| AdvisorError::InvalidResponse(error.to_string()))?;

        json.get("candidates")
            .and_then(|candidates| candidates.get(0))
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.get(0))
            .and_then(|part| part.get("text"))
            .and_then(|text| text.as_str())
            .map(str::to_owned)
            .ok_or_else(|| AdvisorError::InvalidResponse("missing text in response".to_owned()))
    }
}

impl Advisor for GeminiAdvisor {
    fn check_quality(&self, image: &[u8]) -> ::std::result::Result<QualityVerdict, AdvisorError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let body = json!({
            "contents": [{
                "parts": [
                    { "inline_data": { "mime_type": "image/jpeg", "data": encoded } },
                    { "text": QUALITY_PROMPT },
                ],
            }],
            "generationConfig": { "responseMimeType": "application/json" },
        });

        let text = self.generate(&body)?;
        serde_json::from_str(&text)
            .map_err(|error| AdvisorError::InvalidResponse(error.to_string()))
    }

    fn generate_report(
        &self,
        model: &Model,
        sample: &Sample,
    ) -> ::std::result::Result<String, AdvisorError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": report_prompt(model, sample) }] }],
        });
        self.generate(&body)
    }
}

fn report_prompt(model: &Model, sample: &Sample) -> String {
    format!(
        "You are a food safety expert. A dual-mode fluorescence/colorimetric \
         detection test for foodborne pathogens (nanomaterial TMB catalysis) has \
         been analyzed.\n\
         - The detection uses RGB analysis converted to a G/R ratio.\n\
         - A linear calibration model was trained with R-squared = {r_squared:.3}.\n\
         - Sample G/R ratio = {ratio:.3}.\n\
         - Predicted pathogen concentration = {concentration:.2} CFU/mL.\n\
         In under 150 words: comment on the reliability given the R-squared \
         score, explain the significance of the G/R ratio (green fluorescence \
         against the red reference), and conclude whether the sample is likely \
         contaminated (any detected concentration above zero).",
        r_squared = model.r_squared,
        ratio = sample.ratio,
        concentration = sample.predicted_concentration.unwrap_or(0.0),
    )
}
