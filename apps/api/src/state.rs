use std::path::PathBuf;
use std::sync::Arc;

use redub_media::FfmpegExec;
use redub_pipeline::JobTracker;
use redub_speech::SpeechClient;

#[derive(Clone)]
pub struct AppState {
    pub tracker: JobTracker,
    pub media: Arc<FfmpegExec>,
    pub speech: Arc<SpeechClient>,
    pub output_dir: Arc<PathBuf>,
}
