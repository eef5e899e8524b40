//! ffmpeg invocations behind the pipeline's media seam.
//!
//! Each operation is one subprocess run with a fixed argument grammar.
//! No retries here: a nonzero exit aborts the enclosing pipeline stage.

mod error;
mod locator;

pub use error::Error;
pub use locator::FfmpegLocator;

use std::path::{Path, PathBuf};

use redub_pipeline::capability::{CapError, MediaExec};

/// Sample rate for synthesized silence; must match what the speech
/// provider emits so concatenation can stream-copy.
const SILENCE_SAMPLE_RATE: u32 = 24_000;
/// Attenuation applied to the original audio under the dub.
const BACKGROUND_LEVEL: &str = "0.15";

const STDERR_TAIL_BYTES: usize = 600;

/// Executes ffmpeg with the binary resolved once at construction.
/// Resolution failure is a fatal initialization error, not a per-job one.
#[derive(Debug, Clone)]
pub struct FfmpegExec {
    binary: PathBuf,
}

impl FfmpegExec {
    pub fn new(locator: FfmpegLocator) -> Result<Self, Error> {
        let binary = locator.resolve()?;
        tracing::info!(binary = %binary.display(), "ffmpeg_resolved");
        Ok(Self { binary })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run(&self, args: Vec<String>) -> Result<(), Error> {
        tracing::debug!(args = ?args, "ffmpeg_invocation");

        let output = tokio::process::Command::new(&self.binary)
            .args(&args)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut tail_start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
            while !stderr.is_char_boundary(tail_start) {
                tail_start += 1;
            }
            return Err(Error::CommandFailed {
                status: output.status.code(),
                stderr: stderr[tail_start..].to_string(),
            });
        }
        Ok(())
    }

    /// Pull the audio stream only, as mono 16 kHz PCM.
    pub async fn extract_audio(&self, source: &Path, out: &Path) -> Result<(), Error> {
        self.run(extract_audio_args(source, out)).await
    }

    /// Generate mono silence. No-op when the duration is not positive.
    pub async fn synthesize_silence(
        &self,
        duration_secs: f64,
        out: &Path,
    ) -> Result<Option<PathBuf>, Error> {
        if duration_secs <= 0.0 {
            return Ok(None);
        }
        self.run(silence_args(duration_secs, out)).await?;
        Ok(Some(out.to_path_buf()))
    }

    /// Copy-cut a bounded sub-range out of an audio file.
    pub async fn extract_clip(
        &self,
        source: &Path,
        start_secs: f64,
        end_secs: f64,
        out: &Path,
    ) -> Result<(), Error> {
        self.run(clip_args(source, start_secs, end_secs, out)).await
    }

    /// Stream-copy concatenation via the concat demuxer, preserving
    /// input order.
    pub async fn concatenate(&self, clips: &[PathBuf], out: &Path) -> Result<(), Error> {
        let list_path = out.with_extension("list.txt");
        tokio::fs::write(&list_path, concat_list(clips)).await?;
        let result = self.run(concat_args(&list_path, out)).await;
        let _ = tokio::fs::remove_file(&list_path).await;
        result
    }

    /// Mix the attenuated original audio under the dubbed track; video
    /// stream is copied untouched, output ends with the shorter stream.
    pub async fn remix(&self, source: &Path, dubbed: &Path, out: &Path) -> Result<(), Error> {
        self.run(remix_args(source, dubbed, out)).await
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn secs_arg(secs: f64) -> String {
    format!("{secs:.3}")
}

fn extract_audio_args(source: &Path, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(source),
        "-vn".into(),
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        "16000".into(),
        "-c:a".into(),
        "pcm_s16le".into(),
        path_arg(out),
    ]
}

fn silence_args(duration_secs: f64, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        format!("anullsrc=r={SILENCE_SAMPLE_RATE}:cl=mono"),
        "-t".into(),
        secs_arg(duration_secs),
        "-c:a".into(),
        "libmp3lame".into(),
        "-b:a".into(),
        "64k".into(),
        path_arg(out),
    ]
}

fn clip_args(source: &Path, start_secs: f64, end_secs: f64, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(source),
        "-ss".into(),
        secs_arg(start_secs),
        "-to".into(),
        secs_arg(end_secs),
        "-c".into(),
        "copy".into(),
        path_arg(out),
    ]
}

fn concat_args(list_path: &Path, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        path_arg(list_path),
        "-c".into(),
        "copy".into(),
        path_arg(out),
    ]
}

fn remix_args(source: &Path, dubbed: &Path, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(source),
        "-i".into(),
        path_arg(dubbed),
        "-filter_complex".into(),
        format!("[0:a]volume={BACKGROUND_LEVEL}[bg];[bg][1:a]amix=inputs=2:duration=shortest[mix]"),
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "[mix]".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        path_arg(out),
    ]
}

/// Concat demuxer list file body. Single quotes in paths are escaped the
/// way the demuxer expects (`'\''`).
fn concat_list(clips: &[PathBuf]) -> String {
    let mut list = String::new();
    for clip in clips {
        let escaped = clip.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{escaped}'\n"));
    }
    list
}

impl MediaExec for FfmpegExec {
    async fn extract_audio(&self, source: &Path, out: &Path) -> Result<(), CapError> {
        FfmpegExec::extract_audio(self, source, out).await?;
        Ok(())
    }

    async fn synthesize_silence(
        &self,
        duration_secs: f64,
        out: &Path,
    ) -> Result<Option<PathBuf>, CapError> {
        Ok(FfmpegExec::synthesize_silence(self, duration_secs, out).await?)
    }

    async fn extract_clip(
        &self,
        source: &Path,
        start_secs: f64,
        end_secs: f64,
        out: &Path,
    ) -> Result<(), CapError> {
        FfmpegExec::extract_clip(self, source, start_secs, end_secs, out).await?;
        Ok(())
    }

    async fn concatenate(&self, clips: &[PathBuf], out: &Path) -> Result<(), CapError> {
        FfmpegExec::concatenate(self, clips, out).await?;
        Ok(())
    }

    async fn remix(&self, source: &Path, dubbed: &Path, out: &Path) -> Result<(), CapError> {
        FfmpegExec::remix(self, source, dubbed, out).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_exec() -> (tempfile::NamedTempFile, FfmpegExec) {
        let fake_binary = tempfile::NamedTempFile::new().unwrap();
        let exec = FfmpegExec::new(FfmpegLocator::Path(fake_binary.path().to_path_buf())).unwrap();
        (fake_binary, exec)
    }

    #[tokio::test]
    async fn silence_with_non_positive_duration_is_a_no_op() {
        let (_guard, exec) = fake_exec();
        assert!(
            exec.synthesize_silence(0.0, Path::new("/tmp/out.mp3"))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            exec.synthesize_silence(-1.5, Path::new("/tmp/out.mp3"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn extract_audio_drops_video_and_downmixes() {
        let args = extract_audio_args(Path::new("/in/v.mp4"), Path::new("/out/a.wav"));
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args[args.len() - 1], "/out/a.wav");
        let ar = args.iter().position(|a| a == "-ar").unwrap();
        assert_eq!(args[ar + 1], "16000");
    }

    #[test]
    fn silence_args_carry_duration_and_mono_source() {
        let args = silence_args(1.25, Path::new("/out/gap.mp3"));
        assert!(args.contains(&"anullsrc=r=24000:cl=mono".to_string()));
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "1.250");
    }

    #[test]
    fn clip_args_are_copy_cut() {
        let args = clip_args(Path::new("/a.wav"), 2.0, 5.5, Path::new("/c.wav"));
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let to = args.iter().position(|a| a == "-to").unwrap();
        assert_eq!(args[ss + 1], "2.000");
        assert_eq!(args[to + 1], "5.500");
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
    }

    #[test]
    fn remix_attenuates_background_and_copies_video() {
        let args = remix_args(
            Path::new("/v.mp4"),
            Path::new("/d.mp3"),
            Path::new("/o.mp4"),
        );
        let filter = args
            .iter()
            .find(|a| a.contains("volume="))
            .expect("no filtergraph");
        assert!(filter.contains("volume=0.15"));
        assert!(filter.contains("duration=shortest"));
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
    }

    #[test]
    fn concat_list_preserves_order_and_escapes_quotes() {
        let clips = vec![
            PathBuf::from("/t/seg_0.mp3"),
            PathBuf::from("/t/it's.mp3"),
            PathBuf::from("/t/gap_1.mp3"),
        ];
        let list = concat_list(&clips);
        assert_eq!(
            list,
            "file '/t/seg_0.mp3'\nfile '/t/it'\\''s.mp3'\nfile '/t/gap_1.mp3'\n"
        );
    }
}
