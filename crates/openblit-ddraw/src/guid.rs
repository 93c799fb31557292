//! Interface identifiers.
//!
//! GUIDs are stored as their 16-byte little-endian wire layout, the same
//! packing the legacy API compares with. The constants below are the real
//! identifiers of the interface generations this shim recognizes.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    pub const fn from_parts(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        let a = d1.to_le_bytes();
        let b = d2.to_le_bytes();
        let c = d3.to_le_bytes();
        Guid([
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], d4[0], d4[1], d4[2], d4[3], d4[4],
            d4[5], d4[6], d4[7],
        ])
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        let d1 = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        let d2 = u16::from_le_bytes([b[4], b[5]]);
        let d3 = u16::from_le_bytes([b[6], b[7]]);
        write!(
            f,
            "{{{d1:08X}-{d2:04X}-{d3:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub const IID_IUNKNOWN: Guid = Guid::from_parts(
    0x0000_0000,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const IID_IDIRECTDRAW: Guid = Guid::from_parts(
    0x6C14_DB80,
    0xA733,
    0x11CE,
    [0xA5, 0x21, 0x00, 0x20, 0xAF, 0x0B, 0xE5, 0x60],
);

pub const IID_IDIRECTDRAW2: Guid = Guid::from_parts(
    0xB3A6_F3E0,
    0x2B43,
    0x11CF,
    [0xA2, 0xDE, 0x00, 0xAA, 0x00, 0xB9, 0x33, 0x56],
);

pub const IID_IDIRECTDRAW4: Guid = Guid::from_parts(
    0x9C59_509A,
    0x39BD,
    0x11D1,
    [0x8C, 0x4A, 0x00, 0xC0, 0x4F, 0xD9, 0x30, 0xC5],
);

pub const IID_IDIRECTDRAW7: Guid = Guid::from_parts(
    0x15E6_5EC0,
    0x3B9C,
    0x11D2,
    [0xB9, 0x2F, 0x00, 0x60, 0x97, 0x97, 0xEA, 0x5B],
);

pub const IID_IDIRECTDRAWSURFACE: Guid = Guid::from_parts(
    0x6C14_DB81,
    0xA733,
    0x11CE,
    [0xA5, 0x21, 0x00, 0x20, 0xAF, 0x0B, 0xE5, 0x60],
);

pub const IID_IDIRECTDRAWSURFACE2: Guid = Guid::from_parts(
    0x5780_5885,
    0x6EEC,
    0x11CF,
    [0x94, 0x41, 0xA8, 0x23, 0x03, 0xC1, 0x0E, 0x27],
);

pub const IID_IDIRECTDRAWSURFACE3: Guid = Guid::from_parts(
    0xDA04_4E00,
    0x69B2,
    0x11D0,
    [0xA1, 0xD5, 0x00, 0xAA, 0x00, 0xB8, 0xDF, 0xBB],
);

pub const IID_IDIRECTDRAWSURFACE4: Guid = Guid::from_parts(
    0x0B2B_8630,
    0xAD35,
    0x11D0,
    [0x8E, 0xA6, 0x00, 0x60, 0x97, 0x97, 0xEA, 0x5B],
);

pub const IID_IDIRECTDRAWSURFACE7: Guid = Guid::from_parts(
    0x0667_5A80,
    0x3B9B,
    0x11D2,
    [0xB9, 0x2F, 0x00, 0x60, 0x97, 0x97, 0xEA, 0x5B],
);

pub const IID_IDIRECTDRAWPALETTE: Guid = Guid::from_parts(
    0x6C14_DB84,
    0xA733,
    0x11CE,
    [0xA5, 0x21, 0x00, 0x20, 0xAF, 0x0B, 0xE5, 0x60],
);

pub const IID_IDIRECTDRAWCLIPPER: Guid = Guid::from_parts(
    0x6C14_DB85,
    0xA733,
    0x11CE,
    [0xA5, 0x21, 0x00, 0x20, 0xAF, 0x0B, 0xE5, 0x60],
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout_is_little_endian() {
        // First dword of IID_IDirectDraw is 6C14DB80; LE packing puts the
        // low byte first.
        assert_eq!(&IID_IDIRECTDRAW.0[..4], &[0x80, 0xDB, 0x14, 0x6C]);
    }

    #[test]
    fn display_format() {
        assert_eq!(
            IID_IDIRECTDRAW7.to_string(),
            "{15E65EC0-3B9C-11D2-B92F-00609797EA5B}"
        );
    }

    #[test]
    fn identifiers_are_distinct() {
        let all = [
            IID_IUNKNOWN,
            IID_IDIRECTDRAW,
            IID_IDIRECTDRAW2,
            IID_IDIRECTDRAW4,
            IID_IDIRECTDRAW7,
            IID_IDIRECTDRAWSURFACE,
            IID_IDIRECTDRAWSURFACE2,
            IID_IDIRECTDRAWSURFACE3,
            IID_IDIRECTDRAWSURFACE4,
            IID_IDIRECTDRAWSURFACE7,
            IID_IDIRECTDRAWPALETTE,
            IID_IDIRECTDRAWCLIPPER,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
