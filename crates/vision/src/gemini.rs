//! Gemini REST adapter.

use crate::{Result, RetryPolicy, VisionError, VisionModelClient, VlmAnalysis};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    /// Reads the API key from `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY").map_err(|_| VisionError::MissingApiKey)?;
        Self::new(api_key)
    }

    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(VisionError::MissingApiKey);
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request_once(&self, png_bytes: &[u8], prompt: &str) -> Result<VlmAnalysis> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.model, self.api_key
        );
        let body = json!({
            "contents": [{
                "parts": [
                    {"text": prompt},
                    {"inline_data": {
                        "mime_type": "image/png",
                        "data": BASE64.encode(png_bytes),
                    }},
                ]
            }],
            "generationConfig": {
                "candidateCount": 1,
                "temperature": 0.1,
                "maxOutputTokens": 2048,
                "responseMimeType": "application/json",
            }
        });

        let response = self.http.post(&url).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(VisionError::BadResponse(format!(
                "HTTP {}: {}",
                status,
                detail.chars().take(300).collect::<String>()
            )));
        }

        let envelope: Value = response.json()?;
        let text = envelope
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| VisionError::BadResponse("no candidate text".to_string()))?;

        let analysis: VlmAnalysis = serde_json::from_str(text)?;
        log::info!(
            "[Gemini] analysis ok, type={:?}, entities={}",
            analysis.document_type,
            analysis.entities.len()
        );
        Ok(analysis)
    }
}

impl VisionModelClient for GeminiClient {
    fn analyze(&self, png_bytes: &[u8], prompt: &str) -> Result<VlmAnalysis> {
        for attempt in 1..=self.retry.max_attempts {
            match self.request_once(png_bytes, prompt) {
                Ok(analysis) => return Ok(analysis),
                Err(VisionError::MissingApiKey) => return Err(VisionError::MissingApiKey),
                Err(err) => {
                    log::warn!("[Gemini] attempt {} failed: {}", attempt, err);
                    if attempt < self.retry.max_attempts {
                        std::thread::sleep(self.retry.backoff);
                    }
                }
            }
        }
        Err(VisionError::Unavailable {
            attempts: self.retry.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new(String::new()),
            Err(VisionError::MissingApiKey)
        ));
    }

    #[test]
    fn candidate_text_extraction_path() {
        let envelope: Value = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"document_type\":\"facture\",\"entities\":[]}"}]}}]}"#,
        )
        .unwrap();
        let text = envelope
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .unwrap();
        let analysis: VlmAnalysis = serde_json::from_str(text).unwrap();
        assert_eq!(analysis.document_type.as_deref(), Some("facture"));
    }
}
