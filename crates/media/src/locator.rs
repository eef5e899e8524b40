use std::path::PathBuf;

use crate::Error;

/// Where to find the ffmpeg binary. Injected into [`crate::FfmpegExec`]
/// so deployments can pin a path, point an env var at one, or fall back
/// to the system search path, without parallel code paths.
#[derive(Debug, Clone)]
pub enum FfmpegLocator {
    /// An explicit binary path.
    Path(PathBuf),
    /// `ffmpeg` looked up on the system `PATH`.
    System,
}

impl FfmpegLocator {
    pub fn resolve(&self) -> Result<PathBuf, Error> {
        match self {
            FfmpegLocator::Path(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(Error::BinaryNotFound(path.display().to_string()))
                }
            }
            FfmpegLocator::System => which::which("ffmpeg")
                .map_err(|e| Error::BinaryNotFound(format!("ffmpeg on PATH: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_must_exist() {
        let missing = FfmpegLocator::Path(PathBuf::from("/definitely/not/here/ffmpeg"));
        assert!(matches!(missing.resolve(), Err(Error::BinaryNotFound(_))));

        let file = tempfile::NamedTempFile::new().unwrap();
        let found = FfmpegLocator::Path(file.path().to_path_buf());
        assert_eq!(found.resolve().unwrap(), file.path());
    }
}
