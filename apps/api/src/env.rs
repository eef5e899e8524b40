use std::sync::OnceLock;

use serde::Deserialize;

fn default_port() -> u16 {
    4000
}

#[derive(Deserialize)]
pub struct Env {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of the speech provider (transcription, translation,
    /// loudness analysis, synthesis).
    pub speech_api_base: String,
    pub speech_api_key: String,

    /// Explicit ffmpeg binary path; falls back to a PATH lookup.
    #[serde(default)]
    pub ffmpeg_path: Option<String>,

    /// Where completed dub artifacts are written until downloaded.
    #[serde(default)]
    pub output_dir: Option<String>,
}

static ENV: OnceLock<Env> = OnceLock::new();

pub fn env() -> &'static Env {
    ENV.get_or_init(|| {
        let _ = dotenvy::dotenv();
        envy::from_env().expect("Failed to load environment")
    })
}
