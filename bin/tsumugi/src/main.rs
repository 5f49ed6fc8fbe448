use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{bail, Context};
use clap::Parser;
use fake_user_agent::get_chrome_rua;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use tsumugi::{
    dash::SegmentCountMode, decrypt::DecryptionKey, pipeline::TrackOutcome,
    DashDownloaderBuilder, HttpClient,
};

#[derive(Parser, Debug, Clone)]
#[clap(name = "tsumugi", version, about)]
pub struct TsumugiArgs {
    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Threads limit
    #[clap(long, default_value = "5")]
    threads: NonZeroU32,

    /// Attempts for each segment and for the manifest
    #[clap(long, default_value = "3")]
    retries: u32,

    /// Seconds to wait after the first failed attempt, growing linearly
    #[clap(long, default_value = "2")]
    retry_delay: u64,

    /// Timeout seconds for each manifest/segment request.
    #[clap(long, default_value = "30")]
    timeout: u64,

    /// Output directory for master_video.mp4, master_audio.mp4 and the merged file
    #[clap(short, long, default_value = ".")]
    output: PathBuf,

    /// Temporary file path
    #[clap(long, env = "TEMP")]
    temp_dir: Option<PathBuf>,

    /// Hex content key. Tracks are decrypted with ffmpeg when set.
    #[clap(short, long, env = "TSUMUGI_KEY", hide_env_values = true)]
    key: Option<DecryptionKey>,

    /// Compute the segment count from each track's own SegmentTemplate
    /// instead of the first AdaptationSet's.
    #[clap(long)]
    per_track_segments: bool,

    /// HTTP Header used to download
    ///
    /// Custom header. eg. "Cookie: xxxxx".
    #[clap(short = 'H', long)]
    headers: Vec<String>,

    /// User agent. A random Chrome user agent is used if omitted.
    #[clap(long)]
    user_agent: Option<String>,

    /// MPD manifest url
    url: String,
}

impl TsumugiArgs {
    fn client(&self) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();
        for header in &self.headers {
            let Some((key, value)) = header.split_once(':') else {
                bail!("Invalid header: {header}");
            };
            headers.insert(
                HeaderName::from_str(key.trim()).context("Invalid header name")?,
                HeaderValue::from_str(value.trim()).context("Invalid header value")?,
            );
        }

        let user_agent = match &self.user_agent {
            Some(user_agent) => user_agent.clone(),
            None => get_chrome_rua().to_string(),
        };

        Ok(HttpClient::new(
            Client::builder()
                .default_headers(headers)
                .user_agent(user_agent),
        )?)
    }

    fn work_dir(&self) -> anyhow::Result<Option<PathBuf>> {
        let Some(temp_dir) = &self.temp_dir else {
            return Ok(None);
        };
        if !temp_dir.exists() {
            tracing::error!("Temporary path directory does not exist.");
            bail!("Temporary path directory does not exist.");
        }

        let temp_dir = temp_dir.canonicalize()?;
        tracing::info!("Temporary path sets to {}", temp_dir.display());
        Ok(Some(temp_dir.join(format!("tsumugi_{}", std::process::id()))))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let mut builder = DashDownloaderBuilder::new()
            .client(self.client()?)
            .concurrency(self.threads)
            .retries(self.retries)
            .retry_delay(Duration::from_secs(self.retry_delay))
            .timeout(Duration::from_secs(self.timeout))
            .key(self.key.clone())
            .output_dir(&self.output);
        if let Some(work_dir) = self.work_dir()? {
            builder = builder.work_dir(work_dir);
        }
        if self.per_track_segments {
            builder = builder.segment_count_mode(SegmentCountMode::PerTrack);
        }

        let report = builder.download(&self.url).await?;
        for track in &report.tracks {
            let content_type = track.content_type.as_deref().unwrap_or("unknown");
            match &track.outcome {
                TrackOutcome::Completed {
                    output,
                    missing_segments,
                } if missing_segments.is_empty() => {
                    tracing::info!("[{content_type}] saved to {}", output.display());
                }
                TrackOutcome::Completed {
                    output,
                    missing_segments,
                } => {
                    tracing::warn!(
                        "[{content_type}] saved to {} with {} missing segments: {missing_segments:?}",
                        output.display(),
                        missing_segments.len()
                    );
                }
                TrackOutcome::Failed(e) => {
                    tracing::error!("[{content_type}] track {} failed: {e}", track.index);
                }
            }
        }
        if let Some(merged) = &report.merged {
            tracing::info!("Merged into {}", merged.display());
        }

        let failed = report.failed_tracks();
        if failed > 0 {
            bail!("{failed} of {} tracks failed", report.tracks.len());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = TsumugiArgs::parse();

    let default_level = if args.verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    args.run().await
}
