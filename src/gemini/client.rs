//! One-shot generation and speech synthesis over the REST API

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use super::retry::{RetryPolicy, with_retry};
use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, exam_schema,
    lesson_script_schema, lesson_summary_schema,
};
use crate::classroom::TeacherService;
use crate::config::{Config, ModelConfig};
use crate::curriculum::{Lesson, Unit};
use crate::error::ApiError;
use crate::lesson::{ExamQuestion, LessonSummary, TeachingMode, TeachingStep, parse_structured};
use crate::voice::{AudioBuffer, OUTPUT_SAMPLE_RATE, decode_base64, decode_pcm};
use crate::{Result, prompt};

/// Client for the generative-language REST API
pub struct GeminiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    models: ModelConfig,
    voice_name: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = SecretString::from(config.require_api_key()?.to_string());
        let http = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            http,
            api_key,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            models: config.models.clone(),
            voice_name: config.voice.voice_name.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Single `generateContent` attempt
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let error = ApiError::classify(status, &body);
            tracing::debug!(model, status, kind = ?error.kind, "generateContent failed");
            return Err(error.into());
        }

        Ok(response.json().await?)
    }

    /// `generateContent` with a fresh rate-limit retry budget
    async fn generate_with_retry(
        &self,
        label: &str,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let this = self;
        with_retry(&self.retry, label, move || this.generate(model, request)).await
    }

    /// Generate JSON constrained by `schema`
    ///
    /// An empty or malformed payload yields `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails after retries
    pub async fn generate_json<T>(
        &self,
        label: &str,
        prompt: String,
        schema: serde_json::Value,
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let request = GenerateContentRequest {
            contents: vec![Content::text(prompt)],
            generation_config: Some(GenerationConfig::json(schema)),
        };

        let response = self
            .generate_with_retry(label, &self.models.text, &request)
            .await?;
        Ok(parse_structured(response.text().as_deref(), label))
    }

    /// Synthesize `text` into 24 kHz mono speech
    ///
    /// Returns `Ok(None)` when the service returns no usable audio.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails after retries
    pub async fn synthesize(&self, text: &str) -> Result<Option<AudioBuffer>> {
        let request = GenerateContentRequest {
            contents: vec![Content::text(text)],
            generation_config: Some(GenerationConfig::audio(&self.voice_name)),
        };

        let response = self
            .generate_with_retry("speech", &self.models.tts, &request)
            .await?;

        let Some(blob) = response.inline_data() else {
            tracing::warn!("speech synthesis returned no audio");
            return Ok(None);
        };

        let sample_rate = blob
            .mime_type
            .as_deref()
            .and_then(sample_rate_from_mime)
            .unwrap_or(OUTPUT_SAMPLE_RATE);

        match decode_base64(&blob.data).and_then(|bytes| decode_pcm(&bytes, sample_rate, 1)) {
            Ok(buffer) => {
                tracing::debug!(
                    frames = buffer.frame_count(),
                    sample_rate,
                    "synthesized speech"
                );
                Ok(Some(buffer))
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable speech payload");
                Ok(None)
            }
        }
    }
}

/// Extract `rate=N` from a MIME descriptor like `audio/L16;codec=pcm;rate=24000`
fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|p| p.trim().strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
}

#[async_trait]
impl TeacherService for GeminiClient {
    async fn generate_lesson_script(
        &self,
        unit: &Unit,
        lesson: &Lesson,
        mode: TeachingMode,
    ) -> Result<Vec<TeachingStep>> {
        self.generate_json(
            "lesson script",
            prompt::lesson_script(unit, lesson, mode),
            lesson_script_schema(),
        )
        .await
    }

    async fn generate_summary(&self, lesson: &Lesson) -> Result<LessonSummary> {
        self.generate_json(
            "lesson summary",
            prompt::lesson_summary(lesson),
            lesson_summary_schema(),
        )
        .await
    }

    async fn generate_exam(&self, unit: &Unit) -> Result<Vec<ExamQuestion>> {
        self.generate_json("exam", prompt::unit_exam(unit), exam_schema())
            .await
    }

    async fn speak(&self, text: &str) -> Result<Option<AudioBuffer>> {
        self.synthesize(text).await
    }
}
