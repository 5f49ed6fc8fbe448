//! # MPEG-DASH manifest interpretation
//!
//! Only static (VoD) manifests are handled. The first Period is read, and for every
//! AdaptationSet the Representation with the highest bandwidth is downloaded.
//!
//! A track is addressed in one of three ways, see [`plan::SegmentPlan`]:
//!
//! *   `SegmentTemplate` with `@media`: numbered segments, counted from the presentation
//!     duration and the template's `@duration` / `@timescale`.
//! *   `SegmentBase` with `@indexRange`: a single file whose `sidx` box lists the segment sizes.
//! *   Neither: the file named by `@initialization` or `BaseURL` is the whole track.

pub mod duration;
pub mod model;
pub mod plan;
pub mod select;
pub mod template;
pub mod url;

pub use model::Manifest;
pub use plan::{SegmentCountMode, SegmentPlan};
