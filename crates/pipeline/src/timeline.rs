//! Timeline reconstruction: the ordered interleaving of synthesized
//! silence and synthesized speech that makes up the dub track.

use std::path::{Path, PathBuf};

use crate::capability::{CapError, MediaExec, SpeechIntel};
use crate::types::{Gender, Segment};
use crate::voice::{SpeakerRegistry, classify_emotion};

/// Progress bounds for the per-segment loop. Everything before the loop
/// (extraction, transcription) lands below the start; concatenation and
/// remix land above the end.
pub const SEGMENT_PROGRESS_START: i8 = 15;
pub const SEGMENT_PROGRESS_END: i8 = 70;

/// Linear progress position after `completed` of `total` segments.
pub fn segment_progress(completed: usize, total: usize) -> i8 {
    if total == 0 {
        return SEGMENT_PROGRESS_END;
    }
    let span = (SEGMENT_PROGRESS_END - SEGMENT_PROGRESS_START) as f64;
    let fraction = completed as f64 / total as f64;
    SEGMENT_PROGRESS_START + (span * fraction) as i8
}

/// Walk the ordered segments once, filling every positive inter-segment
/// gap with silence and synthesizing one speech clip per segment.
///
/// Returns the timeline: clip paths in exact source chronology. Segments
/// are processed strictly one at a time; serial synthesis is what keeps
/// voice-rotation order deterministic without a merge step.
///
/// Overlapping segments (negative gap) are clamped to a zero gap rather
/// than reaching the media adapter with a negative duration. Silence
/// after the final segment is not reconstructed.
pub async fn reconstruct<M, S>(
    media: &M,
    speech: &S,
    segments: &[Segment],
    full_audio: &Path,
    work_dir: &Path,
    mut on_progress: impl FnMut(i8),
) -> Result<Vec<PathBuf>, CapError>
where
    M: MediaExec,
    S: SpeechIntel,
{
    let mut entries = Vec::with_capacity(segments.len() * 2);
    let mut speakers = SpeakerRegistry::default();
    let mut last_end = 0.0_f64;
    let total = segments.len();

    for (index, segment) in segments.iter().enumerate() {
        let gap = (segment.start_secs - last_end).max(0.0);
        if gap > 0.0 {
            let out = work_dir.join(format!("gap_{index}.mp3"));
            if let Some(path) = media.synthesize_silence(gap, &out).await? {
                entries.push(path);
            }
        }

        let label = segment.speaker_label(index);
        if speakers.gender_of(&label).is_none() {
            let gender = match sample_gender(media, speech, segment, full_audio, work_dir, index)
                .await
            {
                Ok(gender) => gender,
                Err(error) => {
                    tracing::warn!(
                        speaker = %label,
                        error = %error,
                        "gender_detection_failed_using_default"
                    );
                    Gender::default()
                }
            };
            speakers.register(&label, gender);
        }

        let translated = speech.translate(&segment.text).await?;
        let emotion = classify_emotion(&segment.text);
        let voice = speakers
            .assign_voice(&label)
            .ok_or("speaker registered but missing from registry")?;

        let out = work_dir.join(format!("seg_{index}.mp3"));
        speech.synthesize(&translated, voice, emotion, &out).await?;
        entries.push(out);

        tracing::debug!(
            segment = index,
            speaker = %label,
            voice = %voice,
            emotion = ?emotion,
            gap_secs = gap,
            "segment_dubbed"
        );

        last_end = segment.end_secs;
        on_progress(segment_progress(index + 1, total));
    }

    Ok(entries)
}

/// Cut the segment's exact sub-range out of the full extracted audio and
/// run gender detection on it. Only called for a label's first segment.
async fn sample_gender<M, S>(
    media: &M,
    speech: &S,
    segment: &Segment,
    full_audio: &Path,
    work_dir: &Path,
    index: usize,
) -> Result<Gender, CapError>
where
    M: MediaExec,
    S: SpeechIntel,
{
    let clip = work_dir.join(format!("gender_{index}.wav"));
    media
        .extract_clip(full_audio, segment.start_secs, segment.end_secs, &clip)
        .await?;
    speech.detect_gender(&clip).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_progress_spans_bounds() {
        assert_eq!(segment_progress(0, 4), SEGMENT_PROGRESS_START);
        assert_eq!(segment_progress(4, 4), SEGMENT_PROGRESS_END);
        assert_eq!(segment_progress(1, 1), SEGMENT_PROGRESS_END);
    }

    #[test]
    fn segment_progress_is_monotone() {
        let total = 37;
        let mut last = 0;
        for completed in 0..=total {
            let pct = segment_progress(completed, total);
            assert!(pct >= last, "progress went backwards at {completed}");
            last = pct;
        }
    }
}
