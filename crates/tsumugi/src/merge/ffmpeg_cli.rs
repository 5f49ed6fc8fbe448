use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use super::Remuxer;
use crate::error::{TsumugiError, TsumugiResult};

/// [Remuxer] running the `ffmpeg` CLI with stream copy.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRemuxer {
    /// Explicit ffmpeg binary. Looked up in `PATH` when unset.
    ffmpeg: Option<PathBuf>,
}

impl FfmpegRemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: Some(ffmpeg.into()),
        }
    }

    fn binary(&self) -> TsumugiResult<PathBuf> {
        match &self.ffmpeg {
            Some(ffmpeg) => Ok(ffmpeg.clone()),
            None => Ok(which::which("ffmpeg")?),
        }
    }

    async fn run<I, S>(&self, args: I) -> TsumugiResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let ffmpeg = self.binary()?;
        let mut command = Command::new(&ffmpeg);
        command
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(args)
            .stdin(Stdio::null());
        tracing::debug!("Running {command:?}");

        let output = command.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TsumugiError::ExternalTool(format!(
                "{} exited with {}: {}",
                ffmpeg.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Remuxer for FfmpegRemuxer {
    async fn decrypt(&self, key: &str, input: &Path, output: &Path) -> TsumugiResult<()> {
        tracing::debug!("Decrypting {} with ffmpeg CLI...", input.display());

        self.run([
            OsStr::new("-decryption_key"),
            OsStr::new(key),
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-c"),
            OsStr::new("copy"),
            output.as_os_str(),
        ])
        .await
    }

    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> TsumugiResult<()> {
        tracing::debug!("Merging with ffmpeg CLI...");

        self.run([
            OsStr::new("-i"),
            video.as_os_str(),
            OsStr::new("-i"),
            audio.as_os_str(),
            OsStr::new("-c:v"),
            OsStr::new("copy"),
            OsStr::new("-c:a"),
            OsStr::new("copy"),
            output.as_os_str(),
        ])
        .await?;

        // remove merged tracks
        tokio::fs::remove_file(video).await?;
        tokio::fs::remove_file(audio).await?;

        Ok(())
    }
}
