//! Capability bitmasks, descriptors, and operation flag records.
//!
//! The bit values match the legacy ABI so descriptors round-trip the way
//! hosted applications expect.

use openblit_raster::PixelFormat;

macro_rules! bitmask {
    ($(#[$meta:meta])* $name:ident { $($(#[$cmeta:meta])* $const_name:ident = $value:expr;)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
        pub struct $name(u32);

        impl $name {
            pub const NONE: Self = Self(0);
            $($(#[$cmeta])* pub const $const_name: Self = Self($value);)*

            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn with(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            pub const fn without(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitmask! {
    /// Surface capability bits.
    SurfaceCaps {
        BACK_BUFFER = 0x0000_0004;
        COMPLEX = 0x0000_0008;
        FLIP = 0x0000_0010;
        OFFSCREEN_PLAIN = 0x0000_0040;
        PRIMARY = 0x0000_0200;
        SYSTEM_MEMORY = 0x0000_0800;
        VIDEO_MEMORY = 0x0000_4000;
    }
}

bitmask! {
    /// Cooperative level bits.
    CoopFlags {
        FULLSCREEN = 0x0000_0001;
        ALLOW_REBOOT = 0x0000_0002;
        NO_WINDOW_CHANGES = 0x0000_0004;
        NORMAL = 0x0000_0008;
        EXCLUSIVE = 0x0000_0010;
        ALLOW_MODE_X = 0x0000_0040;
        SET_FOCUS_WINDOW = 0x0000_0080;
    }
}

bitmask! {
    /// Which fields of a surface descriptor are meaningful.
    DescFlags {
        CAPS = 0x0000_0001;
        HEIGHT = 0x0000_0002;
        WIDTH = 0x0000_0004;
        PITCH = 0x0000_0008;
        BACK_BUFFER_COUNT = 0x0000_0020;
        PIXEL_FORMAT = 0x0000_1000;
        REFRESH_RATE = 0x0004_0000;
    }
}

bitmask! {
    /// Palette capability bits.
    PaletteCaps {
        FOUR_BIT = 0x0000_0001;
        EIGHT_BIT = 0x0000_0004;
        ALLOW_256 = 0x0000_0040;
    }
}

impl PaletteCaps {
    /// Entry count implied by the capability bits.
    pub fn entry_count(self) -> usize {
        if self.contains(PaletteCaps::EIGHT_BIT) {
            256
        } else {
            16
        }
    }
}

/// Legacy descriptor sizes accepted by `create_surface`. The values are the
/// byte sizes of the two generations of the on-wire descriptor.
pub const SURFACE_DESC_SIZE: u32 = 108;
pub const SURFACE_DESC2_SIZE: u32 = 124;

/// Surface creation descriptor. `size` must name one of the two accepted
/// legacy layouts; `Default` fills in the current one.
#[derive(Debug, Clone)]
pub struct SurfaceDesc {
    pub size: u32,
    pub flags: DescFlags,
    pub caps: SurfaceCaps,
    pub width: u32,
    pub height: u32,
    pub pitch: usize,
    pub back_buffer_count: u32,
    pub bpp: u32,
    pub refresh_rate: u32,
}

impl Default for SurfaceDesc {
    fn default() -> Self {
        Self {
            size: SURFACE_DESC2_SIZE,
            flags: DescFlags::NONE,
            caps: SurfaceCaps::NONE,
            width: 0,
            height: 0,
            pitch: 0,
            back_buffer_count: 0,
            bpp: 0,
            refresh_rate: 0,
        }
    }
}

impl SurfaceDesc {
    /// Descriptor for a primary surface with an optional flip chain.
    pub fn primary(back_buffers: u32) -> Self {
        let mut desc = SurfaceDesc {
            flags: DescFlags::CAPS,
            caps: SurfaceCaps::PRIMARY,
            ..Default::default()
        };
        if back_buffers > 0 {
            desc.flags |= DescFlags::BACK_BUFFER_COUNT;
            desc.caps |= SurfaceCaps::FLIP | SurfaceCaps::COMPLEX;
            desc.back_buffer_count = back_buffers;
        }
        desc
    }

    /// Descriptor for a plain off-screen surface.
    pub fn offscreen(width: u32, height: u32, bpp: u32) -> Self {
        SurfaceDesc {
            flags: DescFlags::CAPS | DescFlags::WIDTH | DescFlags::HEIGHT | DescFlags::PIXEL_FORMAT,
            caps: SurfaceCaps::OFFSCREEN_PLAIN | SurfaceCaps::SYSTEM_MEMORY,
            width,
            height,
            bpp,
            ..Default::default()
        }
    }
}

/// A recorded virtual display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub refresh: u32,
}

/// Display mode report, as emitted by `get_display_mode` and mode
/// enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayModeDesc {
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub refresh: u32,
    pub pitch: usize,
    pub format: PixelFormat,
}

/// Width/height/depth constraints for mode enumeration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeFilter {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bpp: Option<u32>,
}

impl ModeFilter {
    pub fn matches(&self, width: u32, height: u32, bpp: u32) -> bool {
        self.width.map_or(true, |w| w == width)
            && self.height.map_or(true, |h| h == height)
            && self.bpp.map_or(true, |b| b == bpp)
    }
}

/// Synthetic device capability report.
#[derive(Debug, Clone, Copy)]
pub struct DriverCaps {
    pub blit: bool,
    pub color_fill: bool,
    pub stretch: bool,
    pub color_key: bool,
    pub palette: bool,
    pub vid_mem_total: u32,
    pub vid_mem_free: u32,
    pub surface_caps: SurfaceCaps,
}

impl DriverCaps {
    pub fn synthetic() -> Self {
        Self {
            blit: true,
            color_fill: true,
            stretch: true,
            color_key: true,
            palette: true,
            vid_mem_total: 64 * 1024 * 1024,
            vid_mem_free: 64 * 1024 * 1024,
            surface_caps: SurfaceCaps::BACK_BUFFER
                | SurfaceCaps::FLIP
                | SurfaceCaps::OFFSCREEN_PLAIN
                | SurfaceCaps::PRIMARY
                | SurfaceCaps::SYSTEM_MEMORY,
        }
    }
}

/// Synthetic device identity.
#[derive(Debug, Clone)]
pub struct DeviceIdentifier {
    pub driver: String,
    pub description: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub sub_sys_id: u32,
    pub revision: u32,
}

impl DeviceIdentifier {
    pub fn synthetic() -> Self {
        Self {
            driver: "openblit".to_string(),
            description: "OpenBlit Display Compatibility Layer".to_string(),
            vendor_id: 0,
            device_id: 0,
            sub_sys_id: 0,
            revision: 0,
        }
    }
}

/// A color key range; keyed blits compare against `low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorKey {
    pub low: u32,
    pub high: u32,
}

impl ColorKey {
    pub const fn single(value: u32) -> Self {
        Self { low: value, high: value }
    }
}

/// Which color key a get/set call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKeySelect {
    SourceBlt,
    DestBlt,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LockFlags {
    pub read_only: bool,
    pub write_only: bool,
    pub wait: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BltFlags {
    pub color_fill: bool,
    pub key_src: bool,
    pub key_dest: bool,
    pub wait: bool,
}

/// Extra blit parameters; only the fill color is honored.
#[derive(Debug, Clone, Copy, Default)]
pub struct BltFx {
    pub fill_color: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BltFastFlags {
    pub src_color_key: bool,
    pub dest_color_key: bool,
    pub wait: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlipFlags {
    pub no_vsync: bool,
    pub wait: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmask_operations() {
        let caps = SurfaceCaps::PRIMARY | SurfaceCaps::FLIP;
        assert!(caps.contains(SurfaceCaps::PRIMARY));
        assert!(caps.contains(SurfaceCaps::FLIP));
        assert!(!caps.contains(SurfaceCaps::BACK_BUFFER));
        assert!(caps.intersects(SurfaceCaps::FLIP));

        let caps = caps.without(SurfaceCaps::PRIMARY).with(SurfaceCaps::BACK_BUFFER);
        assert!(!caps.contains(SurfaceCaps::PRIMARY));
        assert!(caps.contains(SurfaceCaps::BACK_BUFFER));
    }

    #[test]
    fn primary_descriptor_with_chain() {
        let desc = SurfaceDesc::primary(1);
        assert!(desc.caps.contains(SurfaceCaps::PRIMARY));
        assert!(desc.caps.contains(SurfaceCaps::FLIP));
        assert!(desc.flags.contains(DescFlags::BACK_BUFFER_COUNT));
        assert_eq!(desc.back_buffer_count, 1);
        assert_eq!(desc.size, SURFACE_DESC2_SIZE);
    }

    #[test]
    fn palette_entry_counts() {
        assert_eq!(PaletteCaps::EIGHT_BIT.entry_count(), 256);
        assert_eq!(PaletteCaps::FOUR_BIT.entry_count(), 16);
    }

    #[test]
    fn mode_filter() {
        let f = ModeFilter { width: Some(640), bpp: Some(8), ..Default::default() };
        assert!(f.matches(640, 480, 8));
        assert!(!f.matches(800, 600, 8));
        assert!(!f.matches(640, 480, 16));
        assert!(ModeFilter::default().matches(1, 2, 3));
    }
}
