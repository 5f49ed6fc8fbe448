use std::str::FromStr;

use crate::error::TsumugiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self { offset, length }
    }

    /// Build a range from inclusive `first..=last` byte positions.
    pub fn inclusive(first: u64, last: u64) -> Self {
        Self {
            offset: first,
            length: Some(last - first + 1),
        }
    }

    /// Position of the last byte covered by this range, if bounded.
    pub fn last_byte(&self) -> Option<u64> {
        self.length
            .and_then(|length| length.checked_sub(1))
            .and_then(|length| self.offset.checked_add(length))
    }

    pub fn to_http_range(&self) -> String {
        if let Some(last) = self.last_byte() {
            format!("bytes={}-{}", self.offset, last)
        } else {
            format!("bytes={}-", self.offset)
        }
    }
}

/// The byte range shall be expressed and formatted as a byte-range-spec as defined in
/// IETF RFC 7233:2014, subclause 2.1. `SegmentBase@indexRange` and `Initialization@range`
/// always carry both ends, so an open range is rejected here.
impl FromStr for ByteRange {
    type Err = TsumugiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TsumugiError::InvalidByteRange(s.to_string());

        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let first_byte_pos = start.trim().parse::<u64>().map_err(|_| invalid())?;
        let last_byte_pos = end.trim().parse::<u64>().map_err(|_| invalid())?;
        if last_byte_pos < first_byte_pos {
            return Err(invalid());
        }

        // 0-500 means 501 bytes
        let length = (last_byte_pos - first_byte_pos)
            .checked_add(1)
            .ok_or_else(invalid)?;
        Ok(ByteRange::new(first_byte_pos, Some(length)))
    }
}
