use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::{mpsc, Semaphore},
};

use super::{AssemblyReport, SegmentFetch, SegmentTask};
use crate::error::{TsumugiError, TsumugiResult};

/// Downloads the segments of one track concurrently, then appends them to the track file in
/// their original order.
///
/// Every segment owns its staging file and its slot in the result list, so workers never share
/// state. Nothing is appended before the last worker has finished.
pub struct ParallelAssembler<F>
where
    F: SegmentFetch,
{
    fetcher: F,
    concurrency: NonZeroU32,
    permits: Arc<Semaphore>,
}

impl<F> ParallelAssembler<F>
where
    F: SegmentFetch,
{
    pub fn new(fetcher: F, concurrency: NonZeroU32) -> Self {
        let permits = Arc::new(Semaphore::new(concurrency.get() as usize));
        Self {
            fetcher,
            concurrency,
            permits,
        }
    }

    /// Fetch all `segments` and append them to `output`, which usually already holds the init
    /// segment. Failed segments are left out of `output` and listed in the report.
    pub async fn assemble(
        &self,
        segments: Vec<SegmentTask>,
        output: &Path,
    ) -> TsumugiResult<AssemblyReport> {
        let total = segments.len();
        tracing::info!(
            "Downloading {total} segments with {} thread(s).",
            self.concurrency.get()
        );

        let downloaded = Arc::new(AtomicUsize::new(0));
        let (error_sender, mut error_receiver) = mpsc::channel(total.max(1));

        let mut workers = Vec::with_capacity(total);
        for (index, segment) in segments.into_iter().enumerate() {
            // the semaphore lives as long as `self` and is never closed
            let permit = self.permits.clone().acquire_owned().await.unwrap();
            let fetcher = self.fetcher.clone();
            let errors = error_sender.clone();
            let downloaded = downloaded.clone();

            workers.push(tokio::spawn(async move {
                let result = fetcher.download(&segment.url, &segment.path).await;
                drop(permit);

                match result {
                    Ok(_) => {
                        let downloaded = downloaded.fetch_add(1, Ordering::Relaxed) + 1;
                        let percentage = downloaded as f32 / total as f32 * 100.;
                        tracing::info!(
                            "Processing {} finished. ({downloaded} / {total} or {percentage:.2}%)",
                            segment.path.display()
                        );
                        Some(segment.path)
                    }
                    Err(e) => {
                        _ = errors.try_send((index, e));
                        None
                    }
                }
            }));
        }
        drop(error_sender);

        // barrier: every slot is settled before anything is written
        let slots: Vec<Option<PathBuf>> = futures::future::join_all(workers)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, joined)| {
                joined.unwrap_or_else(|e| {
                    tracing::error!("Segment worker {index} aborted: {e}");
                    None
                })
            })
            .collect();

        while let Some((index, e)) = error_receiver.recv().await {
            tracing::error!("Error downloading segment {index}: {e}");
        }

        let mut report = AssemblyReport {
            total,
            failed: Vec::new(),
        };
        let mut track = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output)
            .await?;
        for (index, slot) in slots.into_iter().enumerate() {
            let Some(path) = slot else {
                report.failed.push(index);
                continue;
            };

            if let Err(e) = append_file(&mut track, &path).await {
                tracing::warn!("Failed to append {}: {e}", path.display());
                report.failed.push(index);
            }
            _ = fs::remove_file(&path).await;
        }
        track.flush().await?;

        if !report.is_complete() {
            tracing::error!(
                "{} of {total} segments are missing from {}",
                report.failed.len(),
                output.display()
            );
        }
        Ok(report)
    }
}

pub(crate) async fn append_file(track: &mut File, path: &Path) -> TsumugiResult<u64> {
    let mut segment = File::open(path).await?;
    tokio::io::copy(&mut segment, track)
        .await
        .map_err(TsumugiError::IOError)
}
