use std::{future::Future, path::Path};

use crate::error::TsumugiResult;

mod ffmpeg_cli;

pub use ffmpeg_cli::FfmpegRemuxer;

/// External tool that turns assembled tracks into final files, without re-encoding.
pub trait Remuxer: Send + Sync {
    /// Decrypt `input` with the hex encoded `key` into `output`.
    fn decrypt(
        &self,
        key: &str,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = TsumugiResult<()>> + Send;

    /// Mux a video and an audio track into `output`. Both inputs are removed on success.
    fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> impl Future<Output = TsumugiResult<()>> + Send;
}
