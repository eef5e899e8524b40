use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures_util::Stream;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use redub_pipeline::{controller, tracker};

use crate::error::{Result, RouteError};
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(1);
const ARTIFACT_FILENAME: &str = "dubbed.mp4";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dub", post(submit))
        .route("/dub/{job_id}/events", get(events))
        .route("/dub/{job_id}/download", get(download))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(serde::Serialize)]
struct SubmitResponse {
    job_id: String,
}

/// Accept one uploaded video and start the dub pipeline for it as a
/// supervised background task. Returns the job id immediately; outcome is
/// observable only through the progress stream.
async fn submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>> {
    let mut source: Option<tempfile::NamedTempFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| RouteError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("video") {
            continue;
        }
        let file = tempfile::Builder::new()
            .prefix("redub_upload_")
            .suffix(".mp4")
            .tempfile()
            .map_err(|e| RouteError::Internal(e.to_string()))?;
        let handle = file
            .as_file()
            .try_clone()
            .map_err(|e| RouteError::Internal(e.to_string()))?;
        let mut writer = tokio::fs::File::from_std(handle);
        // chunk at a time so a large upload never sits in memory whole
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| RouteError::BadRequest(e.to_string()))?
        {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| RouteError::Internal(e.to_string()))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| RouteError::Internal(e.to_string()))?;
        source = Some(file);
    }

    let source = source.ok_or_else(|| {
        RouteError::BadRequest("missing multipart field: video".to_string())
    })?;

    let job_id = uuid::Uuid::new_v4().to_string();

    // Create before spawning so early pollers never race a missing entry.
    state.tracker.create(&job_id);
    tracing::info!(job_id = %job_id, "dub_job_submitted");

    let task_state = state.clone();
    let task_job_id = job_id.clone();
    tokio::spawn(async move {
        controller::run(
            &task_job_id,
            source.path(),
            task_state.media.as_ref(),
            task_state.speech.as_ref(),
            &task_state.tracker,
            &task_state.output_dir,
        )
        .await;
        // the uploaded source is removed here, on success and failure alike
        drop(source);
    });

    Ok(Json(SubmitResponse { job_id }))
}

/// Server-push progress: emits the current percentage once per second and
/// closes itself after a terminal value (100 or -1).
async fn events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    if state.tracker.progress(&job_id).is_none() {
        return Err(RouteError::NotFound);
    }

    let job_tracker = state.tracker.clone();
    let stream = async_stream::stream! {
        let mut interval = tokio::time::interval(PROGRESS_POLL_INTERVAL);
        loop {
            interval.tick().await;
            // entry can disappear mid-stream if the artifact is downloaded
            let Some(percent) = job_tracker.progress(&job_id) else {
                break;
            };
            yield Ok(Event::default().data(percent.to_string()));
            if percent >= tracker::COMPLETE || percent < 0 {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// One-shot artifact download. The tracker entries are retired and the file
/// deleted only once the artifact is open for reading; a failed open leaves
/// the job intact so the client can retry. A second successful attempt is
/// a 404.
async fn download(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<Response> {
    let path = state.tracker.output(&job_id).ok_or(RouteError::NotFound)?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| RouteError::Internal(format!("artifact unreadable: {e}")))?;
    let bytes = file
        .metadata()
        .await
        .map_err(|e| RouteError::Internal(format!("artifact unreadable: {e}")))?
        .len();

    // lost a race against a concurrent download of the same job
    if state.tracker.fetch_and_retire(&job_id).is_none() {
        return Err(RouteError::NotFound);
    }

    // the open handle keeps the unlinked file readable while it streams out
    if let Err(error) = tokio::fs::remove_file(&path).await {
        tracing::warn!(job_id = %job_id, error = %error, "artifact_cleanup_failed");
    }
    tracing::info!(job_id = %job_id, bytes, "dub_artifact_delivered");

    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_LENGTH, bytes.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{ARTIFACT_FILENAME}\""),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use redub_media::{FfmpegExec, FfmpegLocator};
    use redub_pipeline::JobTracker;
    use redub_speech::SpeechClient;

    use super::*;

    fn test_state(output_dir: &std::path::Path, ffmpeg: &std::path::Path) -> AppState {
        AppState {
            tracker: JobTracker::new(),
            media: Arc::new(FfmpegExec::new(FfmpegLocator::Path(ffmpeg.to_path_buf())).unwrap()),
            speech: Arc::new(
                SpeechClient::builder()
                    .api_base("http://127.0.0.1:9")
                    .api_key("test")
                    .build(),
            ),
            output_dir: Arc::new(output_dir.to_path_buf()),
        }
    }

    async fn get_download(state: AppState, job_id: &str) -> Response {
        router(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/dub/{job_id}/download"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unreadable_artifact_keeps_the_job_collectable() {
        let out_dir = tempfile::tempdir().unwrap();
        let ffmpeg = tempfile::NamedTempFile::new().unwrap();
        let state = test_state(out_dir.path(), ffmpeg.path());

        let artifact = out_dir.path().join("job.mp4");
        state.tracker.create("job");
        state.tracker.complete("job", artifact.clone());

        // the file is not there yet, delivery fails
        let response = get_download(state.clone(), "job").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // the job survived the failed attempt
        assert_eq!(state.tracker.progress("job"), Some(tracker::COMPLETE));

        // once the artifact is readable, a retry succeeds
        std::fs::write(&artifact, b"dubbed").unwrap();
        let response = get_download(state.clone(), "job").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!artifact.exists());
    }

    #[tokio::test]
    async fn second_download_is_not_found() {
        let out_dir = tempfile::tempdir().unwrap();
        let ffmpeg = tempfile::NamedTempFile::new().unwrap();
        let state = test_state(out_dir.path(), ffmpeg.path());

        let artifact = out_dir.path().join("job.mp4");
        std::fs::write(&artifact, b"dubbed").unwrap();
        state.tracker.create("job");
        state.tracker.complete("job", artifact);

        let response = get_download(state.clone(), "job").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get_download(state, "job").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
