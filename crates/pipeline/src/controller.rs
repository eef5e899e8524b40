//! End-to-end dub sequencing: extract, transcribe, reconstruct, glue,
//! remix, publish. One invocation per job, strictly sequential stages.

use std::path::Path;

use crate::capability::{CapError, MediaExec, SpeechIntel};
use crate::timeline;
use crate::tracker::JobTracker;

const PROGRESS_EXTRACTED: i8 = 10;
const PROGRESS_TRANSCRIBED: i8 = timeline::SEGMENT_PROGRESS_START;
const PROGRESS_CONCATENATED: i8 = 80;
const PROGRESS_REMIXED: i8 = 95;

const SOURCE_LANGUAGE: &str = "zh";

/// Run one dub job to its terminal state.
///
/// Never returns an error: any stage failure is mapped to the tracker's
/// failure sentinel so the job's outcome is always observable through
/// polling. Intermediate files live in a per-job temp dir that is removed
/// on success and failure alike; the artifact is written to `output_dir`
/// as `{job_id}.mp4` and survives until downloaded.
pub async fn run<M, S>(
    job_id: &str,
    source_video: &Path,
    media: &M,
    speech: &S,
    tracker: &JobTracker,
    output_dir: &Path,
) where
    M: MediaExec,
    S: SpeechIntel,
{
    tracing::info!(job_id = %job_id, "dub_pipeline_started");

    let artifact = output_dir.join(format!("{job_id}.mp4"));

    match run_stages(job_id, source_video, media, speech, tracker, &artifact).await {
        Ok(()) => {
            tracing::info!(job_id = %job_id, "dub_pipeline_completed");
        }
        Err(error) => {
            tracing::error!(job_id = %job_id, error = %error, "dub_pipeline_failed");
            tracker.fail(job_id);
            // a failed remix must not leave a partial artifact behind
            let _ = tokio::fs::remove_file(&artifact).await;
        }
    }
}

async fn run_stages<M, S>(
    job_id: &str,
    source_video: &Path,
    media: &M,
    speech: &S,
    tracker: &JobTracker,
    artifact: &Path,
) -> Result<(), CapError>
where
    M: MediaExec,
    S: SpeechIntel,
{
    // Dropped on every exit path, taking all intermediates with it.
    let work_dir = tempfile::Builder::new().prefix("redub_job_").tempdir()?;

    let audio = work_dir.path().join("source.wav");
    media.extract_audio(source_video, &audio).await?;
    tracker.update(job_id, PROGRESS_EXTRACTED);

    let segments = speech.transcribe(&audio, SOURCE_LANGUAGE).await?;
    if segments.is_empty() {
        return Err("transcription produced no speech segments".into());
    }
    tracing::info!(job_id = %job_id, segments = segments.len(), "transcription_done");
    tracker.update(job_id, PROGRESS_TRANSCRIBED);

    let entries = timeline::reconstruct(media, speech, &segments, &audio, work_dir.path(), |pct| {
        tracker.update(job_id, pct)
    })
    .await?;

    let dubbed = work_dir.path().join("dub.mp3");
    media.concatenate(&entries, &dubbed).await?;
    tracker.update(job_id, PROGRESS_CONCATENATED);

    media.remix(source_video, &dubbed, artifact).await?;
    tracker.update(job_id, PROGRESS_REMIXED);

    tracker.complete(job_id, artifact.to_path_buf());
    Ok(())
}
