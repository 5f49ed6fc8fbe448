//! Segment downloader for static MPEG-DASH manifests.
//!
//! ```text
//! ┌──────────────┐   best Representation   ┌──────────────────┐
//! │              ├─────────────────────────►   SegmentPlan    │
//! │   Manifest   │                         │                  │
//! │              │                         │ Template/Indexed │
//! └──────────────┘                         └────────┬─────────┘
//!                                                   │
//!        ┌──────────────────────────────────────────┘
//!        │
//! ┌──────▼──────────┐   [Semaphore(5)]   ┌──────────────────┐
//! │                 ├───── Segment 1 ────►                  │
//! │    Assembler    ├───── Segment 2 ────►     Fetcher      │
//! │                 ├───── Segment N ────►                  │
//! │ slots[0..N]     ◄────────────────────┤  retry, .tmp,    │
//! │ append in order │      barrier       │  integrity       │
//! └──────┬──────────┘                    └──────────────────┘
//!        │ master_<type>.mp4
//! ┌──────▼──────────┐
//! │     Remuxer     │ decrypt / merge
//! └─────────────────┘
//! ```

pub mod dash;
pub mod decrypt;
pub mod download;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod mp4;
pub mod pipeline;
pub mod util;

pub use pipeline::{DashDownloader, DashDownloaderBuilder, DownloadReport};

pub use error::{TsumugiError, TsumugiResult};
pub use util::http::HttpClient;
pub use util::range::ByteRange;
