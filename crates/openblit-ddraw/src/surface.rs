//! Reference-counted pixel surface.
//!
//! A surface owns its pixel bytes, a lock micro-state, optional attachments
//! (back buffer, palette, clipper), color keys, and keyed private data.
//! Writes reach the screen when the surface is the primary: unlock, the blit
//! operators, releasing a DC, and flips all end in a present.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info, trace, warn};

use openblit_common::{DdError, DdResult, Rect};
use openblit_raster::{blit, PixelFormat, SurfaceBuffer};

use crate::caps::{
    BltFastFlags, BltFlags, BltFx, ColorKey, ColorKeySelect, DescFlags, FlipFlags, LockFlags,
    SurfaceCaps, SurfaceDesc, SURFACE_DESC2_SIZE, SURFACE_DESC_SIZE,
};
use crate::clipper::ClipperObject;
use crate::display::DisplayContext;
use crate::guid::{Guid, IID_IUNKNOWN};
use crate::iface::{RefCount, SurfaceVersion};
use crate::palette::PaletteObject;
use crate::OuterUnknown;

/// Lock grant: geometry plus the byte offset of the locked rect's first
/// pixel inside the surface bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockDesc {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
    pub caps: SurfaceCaps,
    pub offset: usize,
}

/// A materialized drawing bitmap handed out by `get_dc`. While outstanding,
/// the surface bytes are not authoritative; `release_dc` copies the bitmap
/// back.
pub struct SurfaceDc {
    token: u64,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    bytes: Vec<u8>,
}

impl SurfaceDc {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

struct SurfaceState {
    lock: Option<Rect>,
    back_buffer: Option<Arc<SurfaceObject>>,
    palette: Option<Arc<PaletteObject>>,
    clipper: Option<Arc<ClipperObject>>,
    src_key: Option<ColorKey>,
    dest_key: Option<ColorKey>,
    dc_token: Option<u64>,
    next_dc_token: u64,
    private_data: HashMap<Guid, Vec<u8>>,
}

pub struct SurfaceObject {
    self_ref: Weak<SurfaceObject>,
    display: Weak<DisplayContext>,
    refs: RefCount,
    version: Mutex<SurfaceVersion>,
    caps: SurfaceCaps,
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: usize,
    uniqueness: AtomicU32,
    priority: AtomicU32,
    lod: AtomicU32,
    pixels: Mutex<SurfaceBuffer>,
    state: Mutex<SurfaceState>,
}

impl SurfaceObject {
    pub(crate) fn create(
        display: &Arc<DisplayContext>,
        desc: &SurfaceDesc,
        outer: Option<&OuterUnknown>,
    ) -> DdResult<Arc<SurfaceObject>> {
        if outer.is_some() {
            warn!("surface creation with aggregation requested");
            return Err(DdError::NoAggregation);
        }
        if desc.size != SURFACE_DESC_SIZE && desc.size != SURFACE_DESC2_SIZE {
            warn!(size = desc.size, "unexpected surface descriptor size");
            return Err(DdError::InvalidArgument);
        }

        let mut caps = if desc.flags.contains(DescFlags::CAPS) {
            desc.caps
        } else {
            SurfaceCaps::NONE
        };
        let is_primary = caps.contains(SurfaceCaps::PRIMARY);
        let (game_w, game_h, game_bpp) = display.game_mode();

        let mut width = if desc.flags.contains(DescFlags::WIDTH) {
            desc.width
        } else if is_primary {
            game_w
        } else {
            0
        };
        let mut height = if desc.flags.contains(DescFlags::HEIGHT) {
            desc.height
        } else if is_primary {
            game_h
        } else {
            0
        };
        let mut bpp = if desc.flags.contains(DescFlags::PIXEL_FORMAT) {
            desc.bpp
        } else if is_primary {
            game_bpp
        } else {
            0
        };
        if width == 0 {
            width = 640;
        }
        if height == 0 {
            height = 480;
        }
        if bpp == 0 {
            bpp = 8;
        }

        let format = PixelFormat::from_bpp(bpp).ok_or_else(|| {
            warn!(bpp, "unsupported surface depth");
            DdError::InvalidArgument
        })?;

        if is_primary && display.primary().is_some() {
            warn!("a primary surface already exists");
            return Err(DdError::InvalidArgument);
        }

        let buffer = SurfaceBuffer::new(width, height, format)?;
        let stride = buffer.stride();

        // Eagerly build the flip chain. Only one back buffer is ever
        // created, no matter how many the descriptor asks for.
        let mut back_buffer = None;
        if desc.flags.contains(DescFlags::BACK_BUFFER_COUNT) && desc.back_buffer_count > 0 {
            let child_desc = SurfaceDesc {
                size: desc.size,
                flags: DescFlags::CAPS
                    | DescFlags::WIDTH
                    | DescFlags::HEIGHT
                    | DescFlags::PIXEL_FORMAT,
                caps: caps.without(SurfaceCaps::PRIMARY).with(SurfaceCaps::BACK_BUFFER),
                width,
                height,
                bpp,
                ..Default::default()
            };
            back_buffer = Some(Self::create(display, &child_desc, None)?);
            caps |= SurfaceCaps::FLIP;
            debug!("created back buffer for flip chain");
        }

        let surface = Arc::new_cyclic(|self_ref| SurfaceObject {
            self_ref: self_ref.clone(),
            display: Arc::downgrade(display),
            refs: RefCount::new(),
            version: Mutex::new(SurfaceVersion::V7),
            caps,
            format,
            width,
            height,
            stride,
            uniqueness: AtomicU32::new(0),
            priority: AtomicU32::new(0),
            lod: AtomicU32::new(0),
            pixels: Mutex::new(buffer),
            state: Mutex::new(SurfaceState {
                lock: None,
                back_buffer,
                palette: None,
                clipper: None,
                src_key: None,
                dest_key: None,
                dc_token: None,
                next_dc_token: 0,
                private_data: HashMap::new(),
            }),
        });

        if is_primary {
            display.register_primary(&surface);
            info!(width, height, bpp, "created primary surface");
        } else {
            debug!(width, height, bpp, "created surface");
        }
        Ok(surface)
    }

    // ------------------------------------------------------------------
    // Identity and reference counting
    // ------------------------------------------------------------------

    fn self_arc(&self) -> DdResult<Arc<SurfaceObject>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| DdError::generic("surface detached"))
    }

    pub fn query_interface(&self, iid: &Guid) -> DdResult<Arc<SurfaceObject>> {
        if *iid == IID_IUNKNOWN {
            let this = self.self_arc()?;
            self.refs.add_ref();
            return Ok(this);
        }
        match SurfaceVersion::from_iid(iid) {
            Some(version) => {
                let this = self.self_arc()?;
                *self.version.lock().unwrap() = version;
                self.refs.add_ref();
                Ok(this)
            }
            None => Err(DdError::NoInterface),
        }
    }

    pub fn add_ref(&self) -> u32 {
        self.refs.add_ref()
    }

    pub fn release(&self) -> u32 {
        let remaining = self.refs.release();
        if remaining == 0 {
            self.destroy();
        }
        remaining
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.count()
    }

    pub fn apparent_version(&self) -> SurfaceVersion {
        *self.version.lock().unwrap()
    }

    fn destroy(&self) {
        debug!("surface destroyed");
        let (back, palette, clipper) = {
            let mut state = self.state.lock().unwrap();
            state.dc_token = None;
            state.lock = None;
            (
                state.back_buffer.take(),
                state.palette.take(),
                state.clipper.take(),
            )
        };
        if let Some(back) = back {
            back.release();
        }
        if let Some(palette) = palette {
            palette.release();
        }
        if let Some(clipper) = clipper {
            clipper.release();
        }
        if self.caps.contains(SurfaceCaps::PRIMARY) {
            if let Some(display) = self.display.upgrade() {
                display.clear_primary(self);
            }
        }
    }

    // ------------------------------------------------------------------
    // Geometry accessors
    // ------------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn get_pixel_format(&self) -> PixelFormat {
        self.format
    }

    pub fn get_caps(&self) -> SurfaceCaps {
        self.caps
    }

    pub fn is_primary(&self) -> bool {
        self.caps.contains(SurfaceCaps::PRIMARY)
    }

    pub fn get_surface_desc(&self) -> SurfaceDesc {
        let back_buffers = if self.state.lock().unwrap().back_buffer.is_some() {
            1
        } else {
            0
        };
        SurfaceDesc {
            size: SURFACE_DESC2_SIZE,
            flags: DescFlags::CAPS
                | DescFlags::WIDTH
                | DescFlags::HEIGHT
                | DescFlags::PITCH
                | DescFlags::PIXEL_FORMAT,
            caps: self.caps,
            width: self.width,
            height: self.height,
            pitch: self.stride,
            back_buffer_count: back_buffers,
            bpp: self.format.bits_per_pixel(),
            refresh_rate: 0,
        }
    }

    // ------------------------------------------------------------------
    // Lock protocol
    // ------------------------------------------------------------------

    /// Enter the single-writer lock. The returned descriptor points at the
    /// first pixel of the locked rect via `offset`.
    pub fn lock(&self, rect: Option<Rect>, _flags: LockFlags) -> DdResult<LockDesc> {
        let mut state = self.state.lock().unwrap();
        if state.lock.is_some() {
            trace!("lock attempted while surface is busy");
            return Err(DdError::SurfaceBusy);
        }

        let bounds = Rect::of_extent(self.width, self.height);
        let region = match rect {
            None => bounds,
            Some(r) => {
                if !r.is_well_formed() || r.intersect(&bounds) != r {
                    trace!(?r, "malformed lock rectangle");
                    return Err(DdError::InvalidArgument);
                }
                r
            }
        };
        state.lock = Some(region);

        let offset =
            region.top as usize * self.stride + region.left as usize * self.format.bytes_per_pixel();
        Ok(LockDesc {
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
            caps: self.caps,
            offset,
        })
    }

    /// Leave the locked state; writes become visible and the primary is
    /// presented.
    pub fn unlock(&self, _rect: Option<Rect>) -> DdResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.lock.take().is_none() {
                trace!("unlock attempted while not locked");
                return Err(DdError::NotLocked);
            }
        }
        self.uniqueness.fetch_add(1, Ordering::AcqRel);
        self.present_if_primary()
    }

    pub fn locked_rect(&self) -> Option<Rect> {
        self.state.lock().unwrap().lock
    }

    /// Read access to the pixel bytes.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&SurfaceBuffer) -> R) -> R {
        f(&self.pixels.lock().unwrap())
    }

    /// Write access to the pixel bytes; the lock protocol is the caller's
    /// contract, not enforced here.
    pub fn with_pixels_mut<R>(&self, f: impl FnOnce(&mut SurfaceBuffer) -> R) -> R {
        f(&mut self.pixels.lock().unwrap())
    }

    // ------------------------------------------------------------------
    // Blit operators
    // ------------------------------------------------------------------

    pub fn blt(
        &self,
        dst_rect: Option<Rect>,
        src: Option<&Arc<SurfaceObject>>,
        src_rect: Option<Rect>,
        flags: BltFlags,
        fx: Option<&BltFx>,
    ) -> DdResult<()> {
        let dst_rect = dst_rect.unwrap_or_else(|| Rect::of_extent(self.width, self.height));

        if flags.color_fill {
            let fx = fx.ok_or(DdError::InvalidArgument)?;
            {
                let mut pixels = self.pixels.lock().unwrap();
                blit::fill(&mut pixels, dst_rect, fx.fill_color)?;
            }
            self.uniqueness.fetch_add(1, Ordering::AcqRel);
            return self.present_if_primary();
        }

        if let Some(src) = src {
            let src_rect = src_rect.unwrap_or_else(|| Rect::of_extent(src.width, src.height));
            let key = if flags.key_src {
                src.state.lock().unwrap().src_key.map(|k| k.low)
            } else {
                None
            };

            if std::ptr::eq(self as *const _, Arc::as_ptr(src)) {
                let mut pixels = self.pixels.lock().unwrap();
                blit::copy_within(&mut pixels, dst_rect, src_rect, key)?;
            } else {
                // Destination pixels first, then source; blits are
                // single-threaded by contract.
                let mut dst_pixels = self.pixels.lock().unwrap();
                let src_pixels = src.pixels.lock().unwrap();
                blit::copy(&mut dst_pixels, dst_rect, &src_pixels, src_rect, key)?;
            }
            self.uniqueness.fetch_add(1, Ordering::AcqRel);
            return self.present_if_primary();
        }

        Ok(())
    }

    /// Convenience blit: destination rect derived from a point and the
    /// source extent.
    pub fn blt_fast(
        &self,
        x: u32,
        y: u32,
        src: &Arc<SurfaceObject>,
        src_rect: Option<Rect>,
        trans: BltFastFlags,
    ) -> DdResult<()> {
        let src_rect = src_rect.unwrap_or_else(|| Rect::of_extent(src.width, src.height));
        let dst_rect = Rect::new(
            x as i32,
            y as i32,
            x as i32 + src_rect.width(),
            y as i32 + src_rect.height(),
        );
        let flags = BltFlags {
            key_src: trans.src_color_key,
            key_dest: trans.dest_color_key,
            ..Default::default()
        };
        self.blt(Some(dst_rect), Some(src), Some(src_rect), flags, None)
    }

    /// Exchange pixel ownership with the attached back buffer, present, and
    /// gate on the approximated vertical blank.
    pub fn flip(&self, flags: FlipFlags) -> DdResult<()> {
        let back = self.state.lock().unwrap().back_buffer.clone();
        if let Some(back) = back {
            let mut front_pixels = self.pixels.lock().unwrap();
            let mut back_pixels = back.pixels.lock().unwrap();
            front_pixels.swap_contents(&mut back_pixels);
        }

        self.present_if_primary()?;

        if !flags.no_vsync {
            if let Some(display) = self.display.upgrade() {
                let presenter = display.presenter();
                if presenter.vsync_enabled() {
                    presenter.vsync_gate();
                }
            }
        }
        Ok(())
    }

    fn present_if_primary(&self) -> DdResult<()> {
        if !self.is_primary() {
            return Ok(());
        }
        let Some(display) = self.display.upgrade() else {
            return Ok(());
        };
        let palette = self.state.lock().unwrap().palette.clone();
        let pixels = self.pixels.lock().unwrap();
        match &palette {
            Some(pal) => {
                let table = pal.table();
                display.presenter().present(&pixels, Some(&table))
            }
            None => display.presenter().present(&pixels, None),
        }
    }

    // ------------------------------------------------------------------
    // Attachments
    // ------------------------------------------------------------------

    pub fn get_attached_surface(&self, caps: SurfaceCaps) -> DdResult<Arc<SurfaceObject>> {
        let state = self.state.lock().unwrap();
        match &state.back_buffer {
            Some(back) if caps.contains(SurfaceCaps::BACK_BUFFER) => {
                back.add_ref();
                Ok(Arc::clone(back))
            }
            _ => Err(DdError::NotFound),
        }
    }

    /// Legacy surfaces accept explicit attach/detach calls; the flip chain
    /// here is fixed at creation, so these are accepted no-ops.
    pub fn add_attached_surface(&self, _surface: &Arc<SurfaceObject>) -> DdResult<()> {
        Ok(())
    }

    pub fn delete_attached_surface(&self, _surface: &Arc<SurfaceObject>) -> DdResult<()> {
        Ok(())
    }

    pub fn enum_attached_surfaces(
        &self,
        cb: &mut dyn FnMut(&Arc<SurfaceObject>, &SurfaceDesc) -> bool,
    ) -> DdResult<()> {
        let back = self.state.lock().unwrap().back_buffer.clone();
        if let Some(back) = back {
            let desc = back.get_surface_desc();
            cb(&back, &desc);
        }
        Ok(())
    }

    pub fn set_palette(&self, palette: Option<&Arc<PaletteObject>>) -> DdResult<()> {
        let old = {
            let mut state = self.state.lock().unwrap();
            match palette {
                Some(pal) => {
                    pal.add_ref();
                    state.palette.replace(Arc::clone(pal))
                }
                None => state.palette.take(),
            }
        };
        if let Some(old) = old {
            old.release();
        }
        Ok(())
    }

    pub fn get_palette(&self) -> DdResult<Arc<PaletteObject>> {
        let state = self.state.lock().unwrap();
        match &state.palette {
            Some(pal) => {
                pal.add_ref();
                Ok(Arc::clone(pal))
            }
            None => Err(DdError::NoPaletteAttached),
        }
    }

    pub fn set_clipper(&self, clipper: Option<&Arc<ClipperObject>>) -> DdResult<()> {
        let old = {
            let mut state = self.state.lock().unwrap();
            match clipper {
                Some(clip) => {
                    clip.add_ref();
                    state.clipper.replace(Arc::clone(clip))
                }
                None => state.clipper.take(),
            }
        };
        if let Some(old) = old {
            old.release();
        }
        Ok(())
    }

    pub fn get_clipper(&self) -> DdResult<Arc<ClipperObject>> {
        let state = self.state.lock().unwrap();
        match &state.clipper {
            Some(clip) => {
                clip.add_ref();
                Ok(Arc::clone(clip))
            }
            None => Err(DdError::NoClipperAttached),
        }
    }

    pub fn get_dd_interface(&self) -> DdResult<Arc<DisplayContext>> {
        match self.display.upgrade() {
            Some(display) => {
                display.add_ref();
                Ok(display)
            }
            None => Err(DdError::generic("display context released")),
        }
    }

    // ------------------------------------------------------------------
    // Color keys
    // ------------------------------------------------------------------

    pub fn set_color_key(&self, select: ColorKeySelect, key: Option<ColorKey>) -> DdResult<()> {
        let mut state = self.state.lock().unwrap();
        match select {
            ColorKeySelect::SourceBlt => state.src_key = key,
            ColorKeySelect::DestBlt => state.dest_key = key,
        }
        Ok(())
    }

    pub fn get_color_key(&self, select: ColorKeySelect) -> DdResult<ColorKey> {
        let state = self.state.lock().unwrap();
        let key = match select {
            ColorKeySelect::SourceBlt => state.src_key,
            ColorKeySelect::DestBlt => state.dest_key,
        };
        key.ok_or(DdError::NoColorKey)
    }

    // ------------------------------------------------------------------
    // DC interop
    // ------------------------------------------------------------------

    /// Materialize a drawing bitmap holding a copy of the surface bytes.
    pub fn get_dc(&self) -> DdResult<SurfaceDc> {
        let token = {
            let mut state = self.state.lock().unwrap();
            if state.dc_token.is_some() {
                trace!("second DC requested while one is outstanding");
                return Err(DdError::DcAlreadyCreated);
            }
            state.next_dc_token += 1;
            state.dc_token = Some(state.next_dc_token);
            state.next_dc_token
        };

        let pixels = self.pixels.lock().unwrap();
        Ok(SurfaceDc {
            token,
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
            bytes: pixels.bytes().to_vec(),
        })
    }

    /// Copy the (possibly modified) bitmap bytes back and present.
    pub fn release_dc(&self, dc: SurfaceDc) -> DdResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            match state.dc_token {
                Some(token) if token == dc.token => state.dc_token = None,
                _ => return Err(DdError::InvalidArgument),
            }
        }
        {
            let mut pixels = self.pixels.lock().unwrap();
            if dc.bytes.len() != pixels.bytes().len() {
                return Err(DdError::InvalidArgument);
            }
            pixels.bytes_mut().copy_from_slice(&dc.bytes);
        }
        self.uniqueness.fetch_add(1, Ordering::AcqRel);
        self.present_if_primary()
    }

    // ------------------------------------------------------------------
    // Private data
    // ------------------------------------------------------------------

    /// Store keyed bytes; an empty payload erases the entry.
    pub fn set_private_data(&self, tag: Guid, data: &[u8]) -> DdResult<()> {
        let mut state = self.state.lock().unwrap();
        if data.is_empty() {
            state.private_data.remove(&tag);
        } else {
            state.private_data.insert(tag, data.to_vec());
        }
        Ok(())
    }

    /// Copy stored bytes into `out`, returning the byte count.
    pub fn get_private_data(&self, tag: &Guid, out: &mut [u8]) -> DdResult<usize> {
        let state = self.state.lock().unwrap();
        let data = state.private_data.get(tag).ok_or(DdError::NotFound)?;
        if out.len() < data.len() {
            return Err(DdError::MoreData { required: data.len() });
        }
        out[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    pub fn free_private_data(&self, tag: &Guid) -> DdResult<()> {
        self.state.lock().unwrap().private_data.remove(tag);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scalar state
    // ------------------------------------------------------------------

    pub fn get_uniqueness_value(&self) -> u32 {
        self.uniqueness.load(Ordering::Acquire)
    }

    pub fn change_uniqueness_value(&self) {
        self.uniqueness.fetch_add(1, Ordering::AcqRel);
    }

    pub fn set_priority(&self, priority: u32) {
        self.priority.store(priority, Ordering::Release);
    }

    pub fn get_priority(&self) -> u32 {
        self.priority.load(Ordering::Acquire)
    }

    pub fn set_lod(&self, lod: u32) {
        self.lod.store(lod, Ordering::Release);
    }

    pub fn get_lod(&self) -> u32 {
        self.lod.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Fixed answers and unsupported paths
    // ------------------------------------------------------------------

    pub fn is_lost(&self) -> DdResult<()> {
        Ok(())
    }

    pub fn restore(&self) -> DdResult<()> {
        Ok(())
    }

    pub fn get_blt_status(&self, _flags: u32) -> DdResult<()> {
        Ok(())
    }

    pub fn get_flip_status(&self, _flags: u32) -> DdResult<()> {
        Ok(())
    }

    pub fn page_lock(&self, _flags: u32) -> DdResult<()> {
        Ok(())
    }

    pub fn page_unlock(&self, _flags: u32) -> DdResult<()> {
        Ok(())
    }

    /// Creation is the initialization in this implementation.
    pub fn initialize(&self) -> DdResult<()> {
        Err(DdError::AlreadyInitialized)
    }

    pub fn set_surface_desc(&self, _desc: &SurfaceDesc) -> DdResult<()> {
        Err(DdError::Unsupported)
    }

    pub fn blt_batch(&self) -> DdResult<()> {
        Err(DdError::Unsupported)
    }

    pub fn add_overlay_dirty_rect(&self, _rect: Rect) -> DdResult<()> {
        Err(DdError::Unsupported)
    }

    pub fn update_overlay(&self) -> DdResult<()> {
        Err(DdError::Unsupported)
    }

    pub fn update_overlay_display(&self) -> DdResult<()> {
        Err(DdError::Unsupported)
    }

    pub fn update_overlay_z_order(&self) -> DdResult<()> {
        Err(DdError::Unsupported)
    }

    pub fn enum_overlay_z_orders(&self) -> DdResult<()> {
        Err(DdError::Unsupported)
    }

    pub fn get_overlay_position(&self) -> DdResult<(i32, i32)> {
        Err(DdError::Unsupported)
    }

    pub fn set_overlay_position(&self, _x: i32, _y: i32) -> DdResult<()> {
        Err(DdError::Unsupported)
    }
}
