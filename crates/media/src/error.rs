#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ffmpeg binary not found: {0}")]
    BinaryNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("ffmpeg exited with status {status:?}: {stderr}")]
    CommandFailed {
        status: Option<i32>,
        stderr: String,
    },
}
