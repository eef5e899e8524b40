//! HTTP client for the external speech provider: transcription,
//! translation, loudness-based gender inference and synthesis.

mod error;
mod gender;

pub use error::Error;
pub use gender::{GENDER_RMS_CUTOFF_DB, LoudnessFrame, LoudnessReport, classify_gender};

use std::path::Path;

use redub_pipeline::capability::{CapError, SpeechIntel};
use redub_pipeline::types::{Emotion, Gender, Segment};

const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
const DEFAULT_TRANSLATION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TTS_MODEL: &str = "gpt-4o-mini-tts";

/// Prompt-level contract: the engine returns only the spoken line, so no
/// syntactic post-processing beyond trimming is needed.
const TRANSLATION_SYSTEM_PROMPT: &str = "You are a professional dubbing translator. \
    Translate the spoken Chinese line into natural spoken English. \
    Reply with the spoken English line only: no notes, no commentary, no quotation marks.";

pub struct SpeechClient {
    api_base: String,
    api_key: String,
    transcription_model: String,
    translation_model: String,
    tts_model: String,
    client: reqwest::Client,
}

#[derive(Default)]
pub struct SpeechClientBuilder {
    api_base: Option<String>,
    api_key: Option<String>,
    transcription_model: Option<String>,
    translation_model: Option<String>,
    tts_model: Option<String>,
}

impl SpeechClientBuilder {
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = Some(model.into());
        self
    }

    pub fn translation_model(mut self, model: impl Into<String>) -> Self {
        self.translation_model = Some(model.into());
        self
    }

    pub fn tts_model(mut self, model: impl Into<String>) -> Self {
        self.tts_model = Some(model.into());
        self
    }

    pub fn build(self) -> SpeechClient {
        SpeechClient {
            api_base: self
                .api_base
                .map(|b| b.trim_end_matches('/').to_string())
                .expect("api_base is required"),
            api_key: self.api_key.unwrap_or_default(),
            transcription_model: self
                .transcription_model
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            translation_model: self
                .translation_model
                .unwrap_or_else(|| DEFAULT_TRANSLATION_MODEL.to_string()),
            tts_model: self.tts_model.unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    segments: Vec<TranscriptionSegment>,
}

#[derive(serde::Deserialize)]
struct TranscriptionSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    speaker: Option<String>,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(serde::Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl SpeechClient {
    pub fn builder() -> SpeechClientBuilder {
        SpeechClientBuilder::default()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api { status, body })
    }

    async fn audio_form(
        &self,
        audio: &Path,
        mime: &str,
    ) -> Result<reqwest::multipart::Form, Error> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)?;
        Ok(reqwest::multipart::Form::new().part("file", part))
    }

    /// Transcribe an audio file into ordered segments. Ordering by start
    /// time is the provider's contract and is not re-validated.
    pub async fn transcribe(
        &self,
        audio: &Path,
        language_hint: &str,
    ) -> Result<Vec<Segment>, Error> {
        let form = self
            .audio_form(audio, "audio/wav")
            .await?
            .text("model", self.transcription_model.clone())
            .text("language", language_hint.to_string())
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(self.url("/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let body: TranscriptionResponse = Self::check(response).await?.json().await?;

        Ok(body
            .segments
            .into_iter()
            .map(|s| Segment {
                start_secs: s.start,
                end_secs: s.end,
                text: s.text,
                speaker: s.speaker,
            })
            .collect())
    }

    /// Translate one spoken line. The system prompt pins the engine to
    /// spoken content only.
    pub async fn translate(&self, text: &str) -> Result<String, Error> {
        let body = serde_json::json!({
            "model": self.translation_model,
            "messages": [
                { "role": "system", "content": TRANSLATION_SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let response = self
            .client
            .post(self.url("/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let body: ChatResponse = Self::check(response).await?.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or(Error::MissingField("choices[0].message.content"))
    }

    /// Infer a binary gender label from a short clip via the provider's
    /// loudness report.
    ///
    /// Never fails: any error (transport, provider, empty report) falls
    /// back to the documented default of [`Gender::Male`] so one noisy
    /// segment cannot fail the whole dub.
    pub async fn detect_gender(&self, clip: &Path) -> Gender {
        match self.loudness_report(clip).await {
            Ok(report) => classify_gender(&report.frames),
            Err(error) => {
                tracing::warn!(error = %error, "loudness_analysis_failed_using_default");
                Gender::default()
            }
        }
    }

    async fn loudness_report(&self, clip: &Path) -> Result<LoudnessReport, Error> {
        let form = self.audio_form(clip, "audio/wav").await?;
        let response = self
            .client
            .post(self.url("/audio/analysis"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Synthesize speech into `out` (24 kHz mono mp3). The emotion tag is
    /// passed as a best-effort instruction.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        emotion: Emotion,
        out: &Path,
    ) -> Result<(), Error> {
        let mut body = serde_json::json!({
            "model": self.tts_model,
            "input": text,
            "voice": voice,
            "response_format": "mp3",
        });
        if let Some(instruction) = emotion.instruction() {
            body["instructions"] = instruction.into();
        }

        let response = self
            .client
            .post(self.url("/audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;
        tokio::fs::write(out, &bytes).await?;
        Ok(())
    }
}

impl SpeechIntel for SpeechClient {
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: &str,
    ) -> Result<Vec<Segment>, CapError> {
        Ok(SpeechClient::transcribe(self, audio, language_hint).await?)
    }

    async fn translate(&self, text: &str) -> Result<String, CapError> {
        Ok(SpeechClient::translate(self, text).await?)
    }

    async fn detect_gender(&self, clip: &Path) -> Result<Gender, CapError> {
        Ok(SpeechClient::detect_gender(self, clip).await)
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        emotion: Emotion,
        out: &Path,
    ) -> Result<(), CapError> {
        SpeechClient::synthesize(self, text, voice, emotion, out).await?;
        Ok(())
    }
}
