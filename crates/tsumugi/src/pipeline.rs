use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::fs;
use url::Url;

use crate::{
    dash::{
        model::{AdaptationSet, Manifest, Representation},
        plan::{build_plan, indexed_segment_ranges, template_segment_count, SegmentPlan},
        select::{best_representation, content_type},
        url::{base_url, remove_duplicate_path_segments},
        SegmentCountMode,
    },
    decrypt::DecryptionKey,
    download::{AssemblyReport, ParallelAssembler, SegmentTask, SequentialAssembler},
    error::{TsumugiError, TsumugiResult},
    fetch::{Fetcher, RetryPolicy},
    merge::{FfmpegRemuxer, Remuxer},
    mp4::find_sidx,
    util::{base62, http::HttpClient, path::segment_file_name},
};

/// One AdaptationSet, resolved to the Representation that will be downloaded.
#[derive(Debug, Clone)]
pub struct TrackJob {
    pub index: usize,
    pub content_type: String,
    pub representation: Representation,
    pub plan: SegmentPlan,
    /// Final file name in the output directory, `master_<type>.mp4`.
    pub output_name: String,
}

#[derive(Debug)]
pub enum TrackOutcome {
    Completed {
        output: PathBuf,
        /// Positions of template segments that could not be downloaded.
        missing_segments: Vec<usize>,
    },
    Failed(TsumugiError),
}

#[derive(Debug)]
pub struct TrackReport {
    pub index: usize,
    pub content_type: Option<String>,
    pub outcome: TrackOutcome,
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub tracks: Vec<TrackReport>,
    pub merged: Option<PathBuf>,
}

impl DownloadReport {
    pub fn failed_tracks(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| matches!(t.outcome, TrackOutcome::Failed(_)))
            .count()
    }
}

pub struct DashDownloader<R = FfmpegRemuxer>
where
    R: Remuxer,
{
    fetcher: Fetcher,
    concurrency: NonZeroU32,
    key: Option<DecryptionKey>,
    output_dir: PathBuf,
    work_dir: PathBuf,
    count_mode: SegmentCountMode,
    remuxer: R,
}

impl<R> DashDownloader<R>
where
    R: Remuxer,
{
    /// Download every track of the manifest at `url` into the output directory.
    ///
    /// Manifest level problems fail the whole run. Anything that goes wrong inside a track is
    /// recorded in the report and the next track is processed.
    pub async fn download(&self, url: &str) -> TsumugiResult<DownloadReport> {
        let url = remove_duplicate_path_segments(url)?;
        tracing::info!("Fetching manifest {url}");
        let manifest = Manifest::parse(&self.fetcher.fetch_text(&url).await?)?;
        if manifest.is_dynamic() {
            tracing::warn!(
                "Live (dynamic) MPD is not supported, downloading it as a static presentation."
            );
        }

        let duration = manifest.duration_secs()?;
        if duration <= 0. {
            return Err(TsumugiError::InvalidDuration(format!("{duration}s")));
        }

        let adaptations = manifest.adaptations();
        let first = adaptations.first().ok_or(TsumugiError::NoAdaptationSet)?;
        let reference = best_representation(&first.representations)
            .map(|i| &first.representations[i])
            .ok_or(TsumugiError::NoRepresentation)?;
        let segment_count = template_segment_count(duration, first, reference)?;

        tracing::info!(
            "Media Codec: {}",
            reference.codecs.as_deref().unwrap_or("unknown")
        );
        if let Some(sample_rate) = &reference.audio_sampling_rate {
            tracing::info!("Sample Rate: {sample_rate} Hz");
        }
        tracing::info!("Duration: {duration}s, {segment_count} segment(s) per track");

        let base = base_url(&url, manifest.base_url.as_deref())?;
        fs::create_dir_all(&self.work_dir).await?;
        fs::create_dir_all(&self.output_dir).await?;

        let mut report = DownloadReport::default();
        for (index, adaptation) in adaptations.iter().enumerate() {
            let job = match self.prepare_track(index, adaptation, duration, segment_count, &base) {
                Ok(job) => job,
                Err(e) => {
                    tracing::error!("Error Downloading Track {index}: {e}");
                    report.tracks.push(TrackReport {
                        index,
                        content_type: None,
                        outcome: TrackOutcome::Failed(e),
                    });
                    continue;
                }
            };

            let outcome = match self.download_track(&job).await {
                Ok((output, assembly)) => TrackOutcome::Completed {
                    output,
                    missing_segments: assembly.failed,
                },
                Err(e) => {
                    tracing::error!("Error Downloading {} Track: {e}", job.content_type);
                    TrackOutcome::Failed(e)
                }
            };
            report.tracks.push(TrackReport {
                index,
                content_type: Some(job.content_type),
                outcome,
            });
        }

        if adaptations.len() == 2 {
            report.merged = self.merge_tracks(first).await;
        }

        tracing::info!("Cleaning up temporary files...");
        if let Err(e) = fs::remove_dir_all(&self.work_dir).await {
            tracing::warn!("Failed to remove {}: {e}", self.work_dir.display());
        }

        Ok(report)
    }

    /// Pick the Representation of `adaptation` and decide how its segments are addressed.
    fn prepare_track(
        &self,
        index: usize,
        adaptation: &AdaptationSet,
        duration: f64,
        segment_count: u64,
        base: &Url,
    ) -> TsumugiResult<TrackJob> {
        let representation = best_representation(&adaptation.representations)
            .map(|i| &adaptation.representations[i])
            .ok_or(TsumugiError::NoRepresentation)?;
        let content_type = content_type(adaptation, representation);
        tracing::info!(
            "Processing {content_type} track, representation {}...",
            representation.id()
        );

        let count = match self.count_mode {
            SegmentCountMode::Global => segment_count,
            SegmentCountMode::PerTrack => {
                template_segment_count(duration, adaptation, representation)?
            }
        };

        Ok(TrackJob {
            index,
            plan: build_plan(base, adaptation, representation, count)?,
            output_name: format!("master_{content_type}.mp4"),
            content_type,
            representation: representation.clone(),
        })
    }

    async fn download_track(&self, job: &TrackJob) -> TsumugiResult<(PathBuf, AssemblyReport)> {
        let assembled = self
            .work_dir
            .join(format!("{:02}_{}", job.index, job.output_name));
        if fs::try_exists(&assembled).await? {
            fs::remove_file(&assembled).await?;
        }

        let assembly = self.assemble(job, &assembled).await?;
        let output = self.finalize(job, &assembled).await?;
        Ok((output, assembly))
    }

    async fn assemble(&self, job: &TrackJob, assembled: &Path) -> TsumugiResult<AssemblyReport> {
        match &job.plan {
            SegmentPlan::Template(plan) => {
                let init_url = plan.init_url()?;
                tracing::info!("Downloading init file: {init_url}");
                self.fetcher.download(&init_url, assembled).await?;

                let tasks = plan
                    .segments()?
                    .into_iter()
                    .enumerate()
                    .map(|(i, segment)| SegmentTask {
                        path: self
                            .work_dir
                            .join(segment_file_name(job.index, i, &segment.name)),
                        url: segment.url,
                    })
                    .collect();
                ParallelAssembler::new(self.fetcher.clone(), self.concurrency)
                    .assemble(tasks, assembled)
                    .await
            }
            SegmentPlan::Indexed(plan) => {
                let index = self.fetcher.fetch_range(&plan.url, plan.index_range).await?;
                let sidx = find_sidx(&index)?;
                let ranges = indexed_segment_ranges(&sidx, plan.index_range.offset)?;
                tracing::info!("Track Segments: {}", ranges.len());

                let init = self.fetcher.fetch_range(&plan.url, plan.init_range).await?;
                fs::write(assembled, &init).await?;

                SequentialAssembler::new(self.fetcher.clone())
                    .assemble(&plan.url, &ranges, assembled)
                    .await
            }
            SegmentPlan::Single(url) => {
                tracing::info!("Downloading init file: {url}");
                self.fetcher.download(url, assembled).await?;
                Ok(AssemblyReport {
                    total: 1,
                    failed: Vec::new(),
                })
            }
        }
    }

    /// Decrypt or copy the assembled track into the output directory.
    async fn finalize(&self, job: &TrackJob, assembled: &Path) -> TsumugiResult<PathBuf> {
        let output = self.output_dir.join(&job.output_name);
        match &self.key {
            Some(key) => {
                self.remuxer
                    .decrypt(&key.to_hex(), assembled, &output)
                    .await?
            }
            None => {
                fs::copy(assembled, &output).await?;
            }
        }

        tracing::info!("{} track saved to {}", job.content_type, output.display());
        Ok(output)
    }

    /// Mux `master_video.mp4` and `master_audio.mp4` into `<kid>_master.mp4`.
    async fn merge_tracks(&self, first: &AdaptationSet) -> Option<PathBuf> {
        let video = self.output_dir.join("master_video.mp4");
        let audio = self.output_dir.join("master_audio.mp4");
        if !video.exists() || !audio.exists() {
            tracing::warn!("Skip merging: audio or video track is missing.");
            return None;
        }

        let Some(kid) = first.default_kid() else {
            tracing::warn!("Skip merging: no default_KID in the first AdaptationSet.");
            return None;
        };
        let output = self.output_dir.join(merged_file_name(kid));

        tracing::info!("Merging audio and video tracks...");
        match self.remuxer.merge(&video, &audio, &output).await {
            Ok(()) => {
                tracing::info!("Merged into {}", output.display());
                Some(output)
            }
            Err(e) => {
                tracing::error!("Failed to merge tracks: {e}");
                None
            }
        }
    }
}

/// `<kid8>_master.mp4`, where `kid8` is the first 8 base62 digits of the key ID text.
pub fn merged_file_name(kid: &str) -> String {
    let encoded = base62::encode(kid.as_bytes());
    let short: String = encoded.chars().take(8).collect();
    format!("{short}_master.mp4")
}

pub struct DashDownloaderBuilder<R = FfmpegRemuxer> {
    client: Option<HttpClient>,
    concurrency: NonZeroU32,
    retries: u32,
    retry_delay: Duration,
    timeout: Duration,
    key: Option<DecryptionKey>,
    output_dir: PathBuf,
    work_dir: Option<PathBuf>,
    count_mode: SegmentCountMode,
    remuxer: R,
}

impl DashDownloaderBuilder<FfmpegRemuxer> {
    pub fn new() -> Self {
        Self {
            client: None,
            concurrency: NonZeroU32::new(5).unwrap(),
            retries: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            key: None,
            output_dir: PathBuf::from("."),
            work_dir: None,
            count_mode: SegmentCountMode::Global,
            remuxer: FfmpegRemuxer::new(),
        }
    }
}

impl Default for DashDownloaderBuilder<FfmpegRemuxer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> DashDownloaderBuilder<R>
where
    R: Remuxer,
{
    pub fn client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn concurrency(mut self, concurrency: NonZeroU32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn key(mut self, key: Option<DecryptionKey>) -> Self {
        self.key = key;
        self
    }

    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Staging directory for segments and assembled tracks. It is removed after the run.
    ///
    /// Defaults to `<output>/downloads`.
    pub fn work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    pub fn segment_count_mode(mut self, count_mode: SegmentCountMode) -> Self {
        self.count_mode = count_mode;
        self
    }

    pub fn remuxer<R2>(self, remuxer: R2) -> DashDownloaderBuilder<R2>
    where
        R2: Remuxer,
    {
        DashDownloaderBuilder {
            client: self.client,
            concurrency: self.concurrency,
            retries: self.retries,
            retry_delay: self.retry_delay,
            timeout: self.timeout,
            key: self.key,
            output_dir: self.output_dir,
            work_dir: self.work_dir,
            count_mode: self.count_mode,
            remuxer,
        }
    }

    pub fn build(self) -> DashDownloader<R> {
        let fetcher = Fetcher::new(self.client.unwrap_or_default())
            .with_retry_policy(RetryPolicy::new(self.retries, self.retry_delay))
            .with_timeout(self.timeout);
        let work_dir = self
            .work_dir
            .unwrap_or_else(|| self.output_dir.join("downloads"));

        DashDownloader {
            fetcher,
            concurrency: self.concurrency,
            key: self.key,
            output_dir: self.output_dir,
            work_dir,
            count_mode: self.count_mode,
            remuxer: self.remuxer,
        }
    }

    pub async fn download(self, url: &str) -> TsumugiResult<DownloadReport> {
        self.build().download(url).await
    }
}
