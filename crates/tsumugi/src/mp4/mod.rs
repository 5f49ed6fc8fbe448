//! Minimal ISO base media file format reading: top-level box scanning and the segment index.

pub mod boxes;
pub mod sidx;

pub use boxes::{find_box, read_box_header, BoxHeader};
pub use sidx::{find_sidx, SidxInfo};
