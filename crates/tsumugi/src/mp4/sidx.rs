use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use super::boxes::{find_box, BoxHeader};
use crate::error::{TsumugiError, TsumugiResult};

/// Decoded Segment Index Box (ISO/IEC 14496-12 8.16.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidxInfo {
    pub version: u8,
    pub reference_id: u32,
    pub timescale: u32,
    pub earliest_presentation_time: u64,
    /// Distance from the end of the sidx box to the first referenced byte.
    pub first_offset: u64,
    /// `referenced_size` of each reference, reference type bit removed.
    pub reference_sizes: Vec<u32>,
    pub box_size: u64,
    /// Where the sidx box starts within the buffer it was found in.
    pub box_offset: usize,
}

/// Find the first top-level `sidx` box in `buf` and decode it.
pub fn find_sidx(buf: &[u8]) -> TsumugiResult<SidxInfo> {
    let header = find_box(buf, b"sidx")?
        .ok_or_else(|| TsumugiError::BoxParse("sidx box not found".to_string()))?;
    parse_sidx(buf, &header)
}

pub fn parse_sidx(buf: &[u8], header: &BoxHeader) -> TsumugiResult<SidxInfo> {
    let data = buf
        .get(header.payload_offset()..header.end_offset())
        .ok_or_else(|| TsumugiError::BoxParse("sidx box outside of buffer".to_string()))?;

    let truncated = |_: std::io::Error| {
        TsumugiError::BoxParse(format!("truncated sidx box at offset {}", header.offset))
    };
    let mut reader = Cursor::new(data);

    let version = reader.read_u8().map_err(truncated)?;
    let _flags = reader.read_u24::<BigEndian>().map_err(truncated)?;
    let reference_id = reader.read_u32::<BigEndian>().map_err(truncated)?;
    let timescale = reader.read_u32::<BigEndian>().map_err(truncated)?;

    let (earliest_presentation_time, first_offset) = if version == 0 {
        (
            reader.read_u32::<BigEndian>().map_err(truncated)? as u64,
            reader.read_u32::<BigEndian>().map_err(truncated)? as u64,
        )
    } else {
        (
            reader.read_u64::<BigEndian>().map_err(truncated)?,
            reader.read_u64::<BigEndian>().map_err(truncated)?,
        )
    };

    let _reserved = reader.read_u16::<BigEndian>().map_err(truncated)?;
    let reference_count = reader.read_u16::<BigEndian>().map_err(truncated)?;

    let mut reference_sizes = Vec::with_capacity(reference_count as usize);
    for _ in 0..reference_count {
        let reference = reader.read_u32::<BigEndian>().map_err(truncated)?;
        // subsegment_duration, starts_with_SAP, SAP_type and SAP_delta_time
        let _ = reader.read_u64::<BigEndian>().map_err(truncated)?;
        reference_sizes.push(reference & 0x7FFF_FFFF);
    }

    tracing::debug!(
        "sidx v{version}: timescale {timescale}, first offset {first_offset}, {} references",
        reference_sizes.len()
    );

    Ok(SidxInfo {
        version,
        reference_id,
        timescale,
        earliest_presentation_time,
        first_offset,
        reference_sizes,
        box_size: header.size,
        box_offset: header.offset,
    })
}
