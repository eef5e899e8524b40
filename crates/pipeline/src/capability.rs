//! Capability seams the pipeline is generic over.
//!
//! The controller and reconstructor only ever talk to these two traits,
//! so the whole dub sequence is testable with recording mocks and the
//! concrete adapters (`redub-media`, `redub-speech`) stay swappable.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::types::{Emotion, Gender, Segment};

pub type CapError = Box<dyn std::error::Error + Send + Sync>;

/// External media-processing binary, invoked with a fixed argument
/// grammar. Implementations do not retry; retries belong to the caller.
pub trait MediaExec: Send + Sync {
    /// Pull the audio stream out of a media file, into `out`.
    fn extract_audio(
        &self,
        source: &Path,
        out: &Path,
    ) -> impl Future<Output = Result<(), CapError>> + Send;

    /// Generate mono silence of the given duration at `out`.
    ///
    /// A no-op returning `Ok(None)` when `duration_secs <= 0`.
    fn synthesize_silence(
        &self,
        duration_secs: f64,
        out: &Path,
    ) -> impl Future<Output = Result<Option<PathBuf>, CapError>> + Send;

    /// Lossless copy-cut of `[start_secs, end_secs]` from an audio file.
    fn extract_clip(
        &self,
        source: &Path,
        start_secs: f64,
        end_secs: f64,
        out: &Path,
    ) -> impl Future<Output = Result<(), CapError>> + Send;

    /// Stream-copy concatenation preserving input order. All inputs must
    /// share compatible codec parameters.
    fn concatenate(
        &self,
        clips: &[PathBuf],
        out: &Path,
    ) -> impl Future<Output = Result<(), CapError>> + Send;

    /// Mix the original audio (attenuated) under the dubbed track, keep
    /// the video stream untouched, truncate to the shorter stream.
    fn remix(
        &self,
        source: &Path,
        dubbed: &Path,
        out: &Path,
    ) -> impl Future<Output = Result<(), CapError>> + Send;
}

/// External speech capabilities: transcription, translation, gender
/// inference and synthesis.
pub trait SpeechIntel: Send + Sync {
    /// Transcribe an audio file. Segments are ordered by start time as
    /// contract, not re-validated here.
    fn transcribe(
        &self,
        audio: &Path,
        language_hint: &str,
    ) -> impl Future<Output = Result<Vec<Segment>, CapError>> + Send;

    /// Translate source-language spoken text into natural target-language
    /// spoken text, with meta-commentary stripped at the engine level.
    fn translate(&self, text: &str) -> impl Future<Output = Result<String, CapError>> + Send;

    /// Infer a binary gender label from a short audio clip.
    fn detect_gender(&self, clip: &Path)
    -> impl Future<Output = Result<Gender, CapError>> + Send;

    /// Synthesize speech for `text` in the given voice, writing audio to
    /// `out`. The emotion tag is best-effort.
    fn synthesize(
        &self,
        text: &str,
        voice: &str,
        emotion: Emotion,
        out: &Path,
    ) -> impl Future<Output = Result<(), CapError>> + Send;
}
