use std::{future::Future, path::Path, path::PathBuf};

use bytes::Bytes;
use url::Url;

use crate::{error::TsumugiResult, ByteRange};

pub mod parallel;
pub mod sequencial;

pub use parallel::ParallelAssembler;
pub use sequencial::SequentialAssembler;

/// Network side of track assembly.
///
/// Implemented by [crate::fetch::Fetcher]; tests substitute their own.
pub trait SegmentFetch: Clone + Send + Sync + 'static {
    /// Download `url` to `path`, retrying as configured. Returns the number of bytes written.
    fn download(&self, url: &Url, path: &Path) -> impl Future<Output = TsumugiResult<u64>> + Send;

    /// Read one byte range of `url`.
    fn fetch_range(
        &self,
        url: &Url,
        range: ByteRange,
    ) -> impl Future<Output = TsumugiResult<Bytes>> + Send;
}

/// One segment of a track and the staging file it is downloaded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTask {
    pub url: Url,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub total: usize,
    /// Positions of the segments missing from the assembled file.
    pub failed: Vec<usize>,
}

impl AssemblyReport {
    pub fn succeeded(&self) -> usize {
        self.total - self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
