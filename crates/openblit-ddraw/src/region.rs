//! Clip region byte encoding.
//!
//! Region data is the legacy layout: a 32-byte header (size, type, rect
//! count, payload size, bounding rect) followed by the rectangles, all
//! little-endian.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use openblit_common::{DdError, DdResult, Rect};

pub const REGION_HEADER_SIZE: usize = 32;
const RECT_SIZE: usize = 16;
const REGION_RECTANGLES: u32 = 1;

/// Byte size of a region holding `rect_count` rectangles.
pub const fn region_size(rect_count: usize) -> usize {
    REGION_HEADER_SIZE + rect_count * RECT_SIZE
}

fn write_rect(out: &mut Vec<u8>, rect: &Rect) {
    out.write_i32::<LittleEndian>(rect.left).unwrap();
    out.write_i32::<LittleEndian>(rect.top).unwrap();
    out.write_i32::<LittleEndian>(rect.right).unwrap();
    out.write_i32::<LittleEndian>(rect.bottom).unwrap();
}

fn read_rect(cursor: &mut Cursor<&[u8]>) -> DdResult<Rect> {
    let mut next = || {
        cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| DdError::InvalidArgument)
    };
    Ok(Rect {
        left: next()?,
        top: next()?,
        right: next()?,
        bottom: next()?,
    })
}

/// Encode a bounding rect plus rectangle list into region bytes.
pub fn encode_region(bound: Rect, rects: &[Rect]) -> Vec<u8> {
    let mut out = Vec::with_capacity(region_size(rects.len()));
    out.write_u32::<LittleEndian>(REGION_HEADER_SIZE as u32).unwrap();
    out.write_u32::<LittleEndian>(REGION_RECTANGLES).unwrap();
    out.write_u32::<LittleEndian>(rects.len() as u32).unwrap();
    out.write_u32::<LittleEndian>((rects.len() * RECT_SIZE) as u32).unwrap();
    write_rect(&mut out, &bound);
    for rect in rects {
        write_rect(&mut out, rect);
    }
    out
}

/// Decode region bytes back into the bounding rect and rectangle list.
pub fn decode_region(bytes: &[u8]) -> DdResult<(Rect, Vec<Rect>)> {
    if bytes.len() < REGION_HEADER_SIZE {
        return Err(DdError::InvalidArgument);
    }
    let mut cursor = Cursor::new(bytes);
    let header_size = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| DdError::InvalidArgument)?;
    let kind = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| DdError::InvalidArgument)?;
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| DdError::InvalidArgument)? as usize;
    let _payload = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| DdError::InvalidArgument)?;

    if header_size != REGION_HEADER_SIZE as u32 || kind != REGION_RECTANGLES {
        return Err(DdError::InvalidArgument);
    }
    if bytes.len() < region_size(count) {
        return Err(DdError::InvalidArgument);
    }

    let bound = read_rect(&mut cursor)?;
    let mut rects = Vec::with_capacity(count);
    for _ in 0..count {
        rects.push(read_rect(&mut cursor)?);
    }
    Ok((bound, rects))
}
