use std::path::Path;

use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use url::Url;

use super::{AssemblyReport, SegmentFetch};
use crate::{error::TsumugiResult, ByteRange};

/// Appends byte ranges of one indexed file to the track, one request at a time.
pub struct SequentialAssembler<F>
where
    F: SegmentFetch,
{
    fetcher: F,
}

impl<F> SequentialAssembler<F>
where
    F: SegmentFetch,
{
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Any failed range aborts the track.
    pub async fn assemble(
        &self,
        url: &Url,
        ranges: &[ByteRange],
        output: &Path,
    ) -> TsumugiResult<AssemblyReport> {
        let total = ranges.len();
        let mut track = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output)
            .await?;

        for (index, range) in ranges.iter().enumerate() {
            let bytes = self.fetcher.fetch_range(url, *range).await?;
            track.write_all(&bytes).await?;
            tracing::debug!(
                "Segment {} ({}) appended. ({} / {total})",
                index + 1,
                range.to_http_range(),
                index + 1
            );
        }
        track.flush().await?;

        Ok(AssemblyReport {
            total,
            failed: Vec::new(),
        })
    }
}
