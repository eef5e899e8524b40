mod env;
mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::{
    cors::{self, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::prelude::*;

use redub_media::{FfmpegExec, FfmpegLocator};
use redub_pipeline::JobTracker;
use redub_speech::SpeechClient;

use env::env;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,tower_http=debug")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = env();

    // Fatal initialization errors: refuse to start rather than fail jobs
    // one by one.
    let locator = match &env.ffmpeg_path {
        Some(path) => FfmpegLocator::Path(PathBuf::from(path)),
        None => FfmpegLocator::System,
    };
    let media = FfmpegExec::new(locator)?;

    let speech = SpeechClient::builder()
        .api_base(env.speech_api_base.as_str())
        .api_key(env.speech_api_key.as_str())
        .build();

    let output_dir = env
        .output_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("redub-artifacts"));
    std::fs::create_dir_all(&output_dir)?;

    let state = AppState {
        tracker: JobTracker::new(),
        media: Arc::new(media),
        speech: Arc::new(speech),
        output_dir: Arc::new(output_dir),
    };

    let app = routes::router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods(cors::Any)
                .allow_headers(cors::Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], env.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
