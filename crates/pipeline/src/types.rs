/// A transcribed, time-bounded span of source speech.
///
/// Produced once by the transcription step and immutable afterwards.
/// Segments arrive ordered by start time; the reconstructor trusts that
/// ordering and never re-sorts.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
    #[serde(default)]
    pub speaker: Option<String>,
}

impl Segment {
    /// Speaker label for this segment, falling back to a per-index
    /// synthetic label when the transcription engine supplied none.
    pub fn speaker_label(&self, index: usize) -> String {
        match &self.speaker {
            Some(label) => label.clone(),
            None => format!("speaker-{index}"),
        }
    }
}

/// Inferred vocal gender, binary by design.
///
/// The `Default` impl is the documented fallback when detection fails:
/// a single noisy segment must never fail the whole dub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Emotion tag for synthesis, selected by a lexical heuristic on the
/// original-language text. Best-effort: the synthesis engine may or may
/// not honor it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emotion {
    Energetic,
    Firm,
    Neutral,
}

impl Emotion {
    /// Synthesis instruction for this tag, `None` for neutral delivery.
    pub fn instruction(&self) -> Option<&'static str> {
        match self {
            Emotion::Energetic => Some("Speak with high energy and excitement."),
            Emotion::Firm => Some("Speak in a firm, assertive tone."),
            Emotion::Neutral => None,
        }
    }
}

/// Per-job cached state for one speaker label.
///
/// Gender is detected once on first encounter and never re-detected.
/// The rotation index advances on every voice assignment so one speaker
/// cycles through the same-gender pool instead of reusing one voice.
#[derive(Debug, Clone)]
pub struct SpeakerProfile {
    pub gender: Gender,
    pub rotation: usize,
}

impl SpeakerProfile {
    pub fn new(gender: Gender) -> Self {
        Self {
            gender,
            rotation: 0,
        }
    }
}
