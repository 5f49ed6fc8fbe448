use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{TsumugiError, TsumugiResult};

/// Header of one top-level ISO-BMFF box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub box_type: [u8; 4],
    /// Offset of the first header byte within the scanned buffer.
    pub offset: usize,
    /// 8, or 16 with a 64-bit `largesize` field.
    pub header_len: usize,
    /// Total box size, header included.
    pub size: u64,
}

impl BoxHeader {
    pub fn type_str(&self) -> String {
        String::from_utf8_lossy(&self.box_type).into_owned()
    }

    pub fn payload_offset(&self) -> usize {
        self.offset + self.header_len
    }

    pub fn end_offset(&self) -> usize {
        self.offset + self.size as usize
    }
}

fn truncated(offset: usize) -> TsumugiError {
    TsumugiError::BoxParse(format!("truncated box header at offset {offset}"))
}

/// Decode the box header starting at `offset`, checking that the whole box fits in `buf`.
pub fn read_box_header(buf: &[u8], offset: usize) -> TsumugiResult<BoxHeader> {
    let remaining = buf.len().saturating_sub(offset);
    if remaining < 8 {
        return Err(truncated(offset));
    }

    let mut reader = Cursor::new(&buf[offset..]);
    let size32 = reader.read_u32::<BigEndian>()?;
    let mut box_type = [0u8; 4];
    box_type.copy_from_slice(&buf[offset + 4..offset + 8]);
    reader.set_position(8);

    let (size, header_len) = if size32 == 1 {
        let size64 = reader
            .read_u64::<BigEndian>()
            .map_err(|_| truncated(offset))?;
        (size64, 16)
    } else {
        (size32 as u64, 8)
    };

    let header = BoxHeader {
        box_type,
        offset,
        header_len,
        size,
    };
    if size < header_len as u64 {
        return Err(TsumugiError::BoxParse(format!(
            "box '{}' at offset {offset} has invalid size {size}",
            header.type_str()
        )));
    }
    if size > remaining as u64 {
        return Err(TsumugiError::BoxParse(format!(
            "box '{}' at offset {offset} declares {size} bytes, only {remaining} available",
            header.type_str()
        )));
    }

    tracing::trace!("Box '{}' at offset {offset}, size {size}", header.type_str());
    Ok(header)
}

/// Walk the top-level boxes of `buf` and return the first one of type `box_type`.
pub fn find_box(buf: &[u8], box_type: &[u8; 4]) -> TsumugiResult<Option<BoxHeader>> {
    let mut offset = 0;
    while offset < buf.len() {
        let header = read_box_header(buf, offset)?;
        if &header.box_type == box_type {
            return Ok(Some(header));
        }
        offset = header.end_offset();
    }

    Ok(None)
}
