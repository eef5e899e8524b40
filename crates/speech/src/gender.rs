//! Loudness-statistics gender heuristic.
//!
//! The provider reports short-window RMS levels for a clip; the average
//! level against a fixed decibel cutoff picks the label. Coarse by
//! design: it only has to keep one speaker's voice pool stable.

use redub_pipeline::types::Gender;

/// Average window RMS below this level classifies as female.
pub const GENDER_RMS_CUTOFF_DB: f32 = -16.0;

#[derive(Debug, serde::Deserialize)]
pub struct LoudnessReport {
    #[serde(default)]
    pub frames: Vec<LoudnessFrame>,
}

#[derive(Debug, serde::Deserialize)]
pub struct LoudnessFrame {
    pub rms_db: f32,
}

/// Classify from reported windows. An empty report yields the documented
/// default rather than an error.
pub fn classify_gender(frames: &[LoudnessFrame]) -> Gender {
    if frames.is_empty() {
        return Gender::default();
    }
    let mean = frames.iter().map(|f| f.rms_db).sum::<f32>() / frames.len() as f32;
    if mean < GENDER_RMS_CUTOFF_DB {
        Gender::Female
    } else {
        Gender::Male
    }
}
