//! Raster core of OpenBlit: pixel formats, the indexed palette table, owned
//! surface buffers, and the rectangle blit operators. Everything here is
//! host-free and fully synchronous.

pub mod blit;
pub mod buffer;
pub mod format;
pub mod palette;

pub use buffer::SurfaceBuffer;
pub use format::PixelFormat;
pub use palette::{PaletteEntry, PaletteTable, PALETTE_SIZE};
