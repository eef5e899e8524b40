//! Deterministic voice assignment and emotion selection.

use std::collections::HashMap;

use crate::types::{Emotion, Gender, SpeakerProfile};

/// Fixed same-gender voice pools. Assignment order within a pool is the
/// reproducibility contract: the Nth assignment for a speaker is always
/// `pool[N % len]`.
const MALE_VOICES: [&str; 4] = ["onyx", "echo", "ash", "alloy"];
const FEMALE_VOICES: [&str; 4] = ["nova", "shimmer", "coral", "sage"];

fn pool(gender: Gender) -> &'static [&'static str] {
    match gender {
        Gender::Male => &MALE_VOICES,
        Gender::Female => &FEMALE_VOICES,
    }
}

/// Per-job registry of speaker profiles keyed by speaker label.
#[derive(Debug, Default)]
pub struct SpeakerRegistry {
    profiles: HashMap<String, SpeakerProfile>,
}

impl SpeakerRegistry {
    /// Cached gender for a label, if this label was seen before.
    pub fn gender_of(&self, label: &str) -> Option<Gender> {
        self.profiles.get(label).map(|p| p.gender)
    }

    /// Cache the detected gender for a label. First write wins; gender is
    /// never re-detected within a job.
    pub fn register(&mut self, label: &str, gender: Gender) {
        self.profiles
            .entry(label.to_string())
            .or_insert_with(|| SpeakerProfile::new(gender));
    }

    /// Next voice for a registered speaker, advancing its rotation.
    pub fn assign_voice(&mut self, label: &str) -> Option<&'static str> {
        let profile = self.profiles.get_mut(label)?;
        let voices = pool(profile.gender);
        let voice = voices[profile.rotation % voices.len()];
        profile.rotation += 1;
        Some(voice)
    }
}

/// Lexical emotion heuristic on the original-language text, evaluated
/// before translation. Exclamation takes priority over question mark.
/// Full-width `！`/`？` count because the source text is Chinese.
pub fn classify_emotion(source_text: &str) -> Emotion {
    if source_text.contains(['!', '！']) {
        Emotion::Energetic
    } else if source_text.contains(['?', '？']) {
        Emotion::Firm
    } else {
        Emotion::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_exclamation_wins() {
        assert_eq!(classify_emotion("你好!"), Emotion::Energetic);
        assert_eq!(classify_emotion("真的吗?!"), Emotion::Energetic);
        assert_eq!(classify_emotion("太棒了！"), Emotion::Energetic);
    }

    #[test]
    fn emotion_question_without_exclamation() {
        assert_eq!(classify_emotion("你好?"), Emotion::Firm);
        assert_eq!(classify_emotion("去哪里？"), Emotion::Firm);
    }

    #[test]
    fn emotion_neutral_otherwise() {
        assert_eq!(classify_emotion("你好"), Emotion::Neutral);
        assert_eq!(classify_emotion(""), Emotion::Neutral);
    }

    #[test]
    fn rotation_cycles_through_pool_in_order() {
        let mut registry = SpeakerRegistry::default();
        registry.register("a", Gender::Male);

        let assigned: Vec<_> = (0..6).map(|_| registry.assign_voice("a").unwrap()).collect();
        assert_eq!(assigned, ["onyx", "echo", "ash", "alloy", "onyx", "echo"]);
    }

    #[test]
    fn pools_are_disjoint_per_gender() {
        let mut registry = SpeakerRegistry::default();
        registry.register("m", Gender::Male);
        registry.register("f", Gender::Female);

        assert_eq!(registry.assign_voice("m"), Some("onyx"));
        assert_eq!(registry.assign_voice("f"), Some("nova"));
        assert_eq!(registry.assign_voice("f"), Some("shimmer"));
        // rotation is per speaker, not global
        assert_eq!(registry.assign_voice("m"), Some("echo"));
    }

    #[test]
    fn register_is_first_write_wins() {
        let mut registry = SpeakerRegistry::default();
        registry.register("a", Gender::Female);
        registry.register("a", Gender::Male);
        assert_eq!(registry.gender_of("a"), Some(Gender::Female));
    }

    #[test]
    fn assign_voice_unknown_speaker_is_none() {
        let mut registry = SpeakerRegistry::default();
        assert_eq!(registry.assign_voice("ghost"), None);
    }
}
