//! Root display object.
//!
//! Owns the cooperative level, the virtual display mode, the presenter, and
//! the pointer remapper, and manufactures the child objects. One concrete
//! object satisfies interface generations 1, 2, 4, and 7; the apparent
//! version is recorded by `query_interface`.

use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info, warn};

use openblit_common::{DdError, DdResult, WindowHandle};
use openblit_present::{
    InputRemapper, PresentOptions, Presenter, WindowEvent, WindowHook,
};
use openblit_raster::{PaletteEntry, PixelFormat};

use crate::caps::{
    CoopFlags, DeviceIdentifier, DisplayMode, DisplayModeDesc, DriverCaps, ModeFilter,
    PaletteCaps, SurfaceCaps, SurfaceDesc,
};
use crate::clipper::ClipperObject;
use crate::guid::{Guid, IID_IUNKNOWN};
use crate::iface::{DisplayVersion, RefCount};
use crate::palette::PaletteObject;
use crate::surface::SurfaceObject;
use crate::{Core, OuterUnknown};

/// The fixed mode catalogue reported to hosted applications.
const MODE_EXTENTS: &[(u32, u32)] = &[
    (640, 480),
    (800, 600),
    (1024, 768),
    (1280, 720),
    (1280, 960),
    (1280, 1024),
    (1920, 1080),
];
const MODE_DEPTHS: &[u32] = &[8, 16, 24, 32];

struct DisplayState {
    window: Option<WindowHandle>,
    coop_flags: CoopFlags,
    mode: DisplayMode,
    mode_set: bool,
    primary: Weak<SurfaceObject>,
    hook_installed: bool,
}

pub struct DisplayContext {
    self_ref: Weak<DisplayContext>,
    core: Arc<Core>,
    presenter: Arc<Presenter>,
    refs: RefCount,
    version: Mutex<DisplayVersion>,
    remapper: Mutex<InputRemapper>,
    state: Mutex<DisplayState>,
}

impl DisplayContext {
    pub(crate) fn create(core: Arc<Core>) -> Arc<DisplayContext> {
        let opts = PresentOptions::from_settings(core.settings());
        let presenter = Arc::new(Presenter::new(
            core.host_arc(),
            core.clock_arc(),
            opts,
        ));
        let adjust_mouse = core.settings().adjust_mouse;
        info!("display context created");
        Arc::new_cyclic(|self_ref| DisplayContext {
            self_ref: self_ref.clone(),
            core,
            presenter,
            refs: RefCount::new(),
            version: Mutex::new(DisplayVersion::V1),
            remapper: Mutex::new(InputRemapper::new(adjust_mouse)),
            state: Mutex::new(DisplayState {
                window: None,
                coop_flags: CoopFlags::NONE,
                mode: DisplayMode { width: 640, height: 480, bpp: 8, refresh: 0 },
                mode_set: false,
                primary: Weak::new(),
                hook_installed: false,
            }),
        })
    }

    fn self_arc(&self) -> DdResult<Arc<DisplayContext>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| DdError::generic("display context detached"))
    }

    // ------------------------------------------------------------------
    // Identity and reference counting
    // ------------------------------------------------------------------

    pub fn query_interface(&self, iid: &Guid) -> DdResult<Arc<DisplayContext>> {
        if *iid == IID_IUNKNOWN {
            let this = self.self_arc()?;
            self.refs.add_ref();
            return Ok(this);
        }
        match DisplayVersion::from_iid(iid) {
            Some(version) => {
                let this = self.self_arc()?;
                *self.version.lock().unwrap() = version;
                self.refs.add_ref();
                debug!(?version, "display interface queried");
                Ok(this)
            }
            None => {
                debug!(%iid, "unknown display interface requested");
                Err(DdError::NoInterface)
            }
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

    pub fn apparent_version(&self) -> DisplayVersion {
        *self.version.lock().unwrap()
    }

    fn destroy(&self) {
        info!("display context destroyed");
        let hook_installed = {
            let mut state = self.state.lock().unwrap();
            std::mem::take(&mut state.hook_installed)
        };
        if hook_installed {
            self.core.host().remove_window_hook();
        }
        self.remapper.lock().unwrap().detach();
        self.presenter.shutdown();
    }

    // ------------------------------------------------------------------
    // Cooperative level and display mode
    // ------------------------------------------------------------------

    pub fn set_cooperative_level(
        &self,
        window: Option<WindowHandle>,
        flags: CoopFlags,
    ) -> DdResult<()> {
        if flags.contains(CoopFlags::EXCLUSIVE) && !flags.contains(CoopFlags::FULLSCREEN) {
            warn!(flags = flags.bits(), "exclusive cooperative level requires fullscreen");
            return Err(DdError::InvalidArgument);
        }

        let mut flags = flags;
        if self.core.settings().nonexclusive && flags.contains(CoopFlags::EXCLUSIVE) {
            debug!("stripping exclusive bit per configuration");
            flags = flags.without(CoopFlags::EXCLUSIVE);
        }

        {
            let mut state = self.state.lock().unwrap();
            state.window = window;
            state.coop_flags = flags;
        }

        if window.is_some() {
            let (game_w, game_h, _) = self.game_mode();
            let client = self.core.host().client_size();
            self.remapper.lock().unwrap().attach(game_w, game_h, client);
            if self.core.settings().adjust_mouse {
                let hook = self.self_arc()? as Arc<dyn WindowHook>;
                self.core.host().install_window_hook(hook);
                self.state.lock().unwrap().hook_installed = true;
            }
            self.update_scaling();
        }

        info!(window = ?window, flags = flags.bits(), "cooperative level set");
        Ok(())
    }

    pub fn get_cooperative_flags(&self) -> CoopFlags {
        self.state.lock().unwrap().coop_flags
    }

    pub fn window(&self) -> Option<WindowHandle> {
        self.state.lock().unwrap().window
    }

    /// Version 1 form: no refresh rate, no flags.
    pub fn set_display_mode(&self, width: u32, height: u32, bpp: u32) -> DdResult<()> {
        self.set_display_mode_ex(width, height, bpp, 0, 0)
    }

    pub fn set_display_mode_ex(
        &self,
        width: u32,
        height: u32,
        bpp: u32,
        refresh: u32,
        _flags: u32,
    ) -> DdResult<()> {
        if width == 0 || height == 0 || bpp == 0 {
            warn!(width, height, bpp, "rejecting degenerate display mode");
            return Err(DdError::InvalidMode);
        }
        if PixelFormat::from_bpp(bpp).is_none() {
            warn!(bpp, "rejecting unsupported mode depth");
            return Err(DdError::InvalidMode);
        }

        let window = {
            let mut state = self.state.lock().unwrap();
            state.mode = DisplayMode { width, height, bpp, refresh };
            state.mode_set = true;
            state.window
        };

        if window.is_some() {
            // The configuration may pin the client extent; otherwise the
            // window tracks the virtual mode.
            let settings = self.core.settings();
            let client_w = if settings.width > 0 { settings.width } else { width };
            let client_h = if settings.height > 0 { settings.height } else { height };
            self.core.host().resize_client(client_w, client_h)?;
            if settings.window_x >= 0 && settings.window_y >= 0 {
                self.core.host().move_window(settings.window_x, settings.window_y);
            }
            self.remapper.lock().unwrap().set_game_size(width, height);
            self.update_scaling();
        }

        info!(width, height, bpp, refresh, "display mode set");
        Ok(())
    }

    /// Clear the virtual-mode flag without touching the window.
    pub fn restore_display_mode(&self) -> DdResult<()> {
        self.state.lock().unwrap().mode_set = false;
        debug!("display mode restored");
        Ok(())
    }

    pub fn get_display_mode(&self) -> DdResult<DisplayModeDesc> {
        let state = self.state.lock().unwrap();
        let (width, height, bpp, refresh) = if state.mode_set {
            let m = state.mode;
            (m.width, m.height, m.bpp, if m.refresh != 0 { m.refresh } else { 60 })
        } else {
            let (w, h, bpp) = self.core.host().desktop_mode();
            (w, h, bpp, 60)
        };
        let format = PixelFormat::from_bpp(bpp).ok_or(DdError::InvalidMode)?;
        Ok(DisplayModeDesc {
            width,
            height,
            bpp,
            refresh,
            pitch: format.align_stride(width),
            format,
        })
    }

    /// Walk the synthetic mode catalogue, honoring the filter and callback
    /// cancellation.
    pub fn enum_display_modes(
        &self,
        filter: Option<&ModeFilter>,
        cb: &mut dyn FnMut(&DisplayModeDesc) -> bool,
    ) -> DdResult<()> {
        for &(width, height) in MODE_EXTENTS {
            for &bpp in MODE_DEPTHS {
                if let Some(filter) = filter {
                    if !filter.matches(width, height, bpp) {
                        continue;
                    }
                }
                let format = match PixelFormat::from_bpp(bpp) {
                    Some(f) => f,
                    None => continue,
                };
                let desc = DisplayModeDesc {
                    width,
                    height,
                    bpp,
                    refresh: 60,
                    pitch: format.align_stride(width),
                    format,
                };
                if !cb(&desc) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Width, height, and depth of the virtual display the game believes it
    /// owns; 640x480x8 until a mode is set.
    pub(crate) fn game_mode(&self) -> (u32, u32, u32) {
        let state = self.state.lock().unwrap();
        if state.mode_set {
            (state.mode.width, state.mode.height, state.mode.bpp)
        } else {
            (640, 480, 8)
        }
    }

    fn update_scaling(&self) {
        let (game_w, game_h, _) = self.game_mode();
        let client = self.core.host().client_size();
        let vp = self.presenter.viewport_for(client, (game_w, game_h));
        let mut remap = self.remapper.lock().unwrap();
        remap.set_client(client.0, client.1);
        remap.set_viewport(&vp);
    }

    // ------------------------------------------------------------------
    // Child factories
    // ------------------------------------------------------------------

    pub fn create_surface(
        &self,
        desc: &SurfaceDesc,
        outer: Option<&OuterUnknown>,
    ) -> DdResult<Arc<SurfaceObject>> {
        let this = self.self_arc()?;
        SurfaceObject::create(&this, desc, outer)
    }

    pub fn create_palette(
        &self,
        caps: PaletteCaps,
        entries: Option<&[PaletteEntry]>,
        outer: Option<&OuterUnknown>,
    ) -> DdResult<Arc<PaletteObject>> {
        PaletteObject::create(caps, entries, outer)
    }

    pub fn create_clipper(
        &self,
        flags: u32,
        outer: Option<&OuterUnknown>,
    ) -> DdResult<Arc<ClipperObject>> {
        ClipperObject::create(self.core.host_arc(), flags, outer)
    }

    pub fn duplicate_surface(
        &self,
        _surface: &Arc<SurfaceObject>,
    ) -> DdResult<Arc<SurfaceObject>> {
        Err(DdError::Unsupported)
    }

    /// Surfaces are not tracked for enumeration; succeed without calling
    /// back, as the original does.
    pub fn enum_surfaces(
        &self,
        _cb: &mut dyn FnMut(&Arc<SurfaceObject>, &SurfaceDesc) -> bool,
    ) -> DdResult<()> {
        Ok(())
    }

    pub(crate) fn register_primary(&self, surface: &Arc<SurfaceObject>) {
        self.state.lock().unwrap().primary = Arc::downgrade(surface);
    }

    pub(crate) fn clear_primary(&self, surface: &SurfaceObject) {
        let mut state = self.state.lock().unwrap();
        if std::ptr::eq(state.primary.as_ptr(), surface as *const _) {
            state.primary = Weak::new();
        }
    }

    pub fn primary(&self) -> Option<Arc<SurfaceObject>> {
        self.state.lock().unwrap().primary.upgrade()
    }

    pub fn presenter(&self) -> &Arc<Presenter> {
        &self.presenter
    }

    // ------------------------------------------------------------------
    // Synthetic device answers
    // ------------------------------------------------------------------

    /// Driver and emulation capability reports; both are the same synthetic
    /// software device.
    pub fn get_caps(&self) -> (DriverCaps, DriverCaps) {
        (DriverCaps::synthetic(), DriverCaps::synthetic())
    }

    pub fn get_available_vid_mem(&self, _caps: SurfaceCaps) -> (u32, u32) {
        let caps = DriverCaps::synthetic();
        (caps.vid_mem_total, caps.vid_mem_free)
    }

    pub fn get_monitor_frequency(&self) -> u32 {
        let state = self.state.lock().unwrap();
        if state.mode_set && state.mode.refresh != 0 {
            state.mode.refresh
        } else {
            60
        }
    }

    pub fn get_scan_line(&self) -> DdResult<u32> {
        Ok(0)
    }

    pub fn get_vertical_blank_status(&self) -> bool {
        true
    }

    pub fn wait_for_vertical_blank(&self, _flags: u32) -> DdResult<()> {
        self.presenter.vsync_gate();
        Ok(())
    }

    pub fn get_gdi_surface(&self) -> DdResult<Arc<SurfaceObject>> {
        match self.primary() {
            Some(primary) => {
                primary.add_ref();
                Ok(primary)
            }
            None => Err(DdError::NotFound),
        }
    }

    pub fn get_surface_from_dc(&self, _dc_token: u64) -> DdResult<Arc<SurfaceObject>> {
        Err(DdError::NotFound)
    }

    pub fn get_fourcc_codes(&self) -> Vec<u32> {
        Vec::new()
    }

    pub fn get_device_identifier(&self) -> DeviceIdentifier {
        DeviceIdentifier::synthetic()
    }

    pub fn test_cooperative_level(&self) -> DdResult<()> {
        Ok(())
    }

    pub fn restore_all_surfaces(&self) -> DdResult<()> {
        Ok(())
    }

    pub fn flip_to_gdi_surface(&self) -> DdResult<()> {
        Ok(())
    }

    pub fn compact(&self) -> DdResult<()> {
        Ok(())
    }

    /// Creation is the initialization in this implementation.
    pub fn initialize(&self) -> DdResult<()> {
        Err(DdError::AlreadyInitialized)
    }

    pub fn start_mode_test(&self) -> DdResult<()> {
        Err(DdError::Unsupported)
    }

    pub fn evaluate_mode(&self, _flags: u32, _timeout_secs: u32) -> DdResult<()> {
        Err(DdError::Unsupported)
    }
}

impl WindowHook for DisplayContext {
    fn on_event(&self, event: WindowEvent) -> WindowEvent {
        let rewritten = self.remapper.lock().unwrap().handle(event);
        if matches!(event, WindowEvent::Resized { .. }) {
            self.update_scaling();
        }
        rewritten
    }
}
