//! Legacy display API object graph.
//!
//! This crate carries the reference-counted object model of the legacy
//! 2-D raster API (display context, surfaces, palettes, clippers), the
//! interface-identity dispatch across its generations, and the exported
//! factory entry points. The host window system, clock, and configuration
//! arrive through the [`Core`] capability bundle built by the bootstrap.

pub mod caps;
pub mod clipper;
pub mod display;
pub mod guid;
pub mod iface;
pub mod palette;
pub mod region;
pub mod surface;

use std::sync::Arc;

use tracing::{debug, info, warn};

use openblit_common::{DdError, DdResult, MonitorHandle, Settings};
use openblit_present::{Clock, HostPresenter};

pub use caps::{
    BltFastFlags, BltFlags, BltFx, ColorKey, ColorKeySelect, CoopFlags, DescFlags,
    DeviceIdentifier, DisplayMode, DisplayModeDesc, DriverCaps, FlipFlags, LockFlags, ModeFilter,
    PaletteCaps, SurfaceCaps, SurfaceDesc, SURFACE_DESC2_SIZE, SURFACE_DESC_SIZE,
};
pub use clipper::ClipperObject;
pub use display::DisplayContext;
pub use guid::Guid;
pub use iface::{DisplayVersion, SurfaceVersion};
pub use palette::PaletteObject;
pub use surface::{LockDesc, SurfaceDc, SurfaceObject};

/// Marker for the legacy outer-aggregation parameter. Passing `Some` always
/// fails with `NoAggregation`; the parameter exists so call sites keep the
/// legacy shape.
pub struct OuterUnknown;

/// Capability bundle owned by the bootstrap: the host window system, the
/// clock, and the resolved configuration. Replaces the process-global state
/// of the legacy implementation.
pub struct Core {
    host: Arc<dyn HostPresenter>,
    clock: Arc<dyn Clock>,
    settings: Settings,
}

impl Core {
    pub fn new(
        host: Arc<dyn HostPresenter>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> Arc<Core> {
        info!("core initialized");
        Arc::new(Core { host, clock, settings })
    }

    pub fn host(&self) -> &Arc<dyn HostPresenter> {
        &self.host
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn host_arc(&self) -> Arc<dyn HostPresenter> {
        Arc::clone(&self.host)
    }

    pub(crate) fn clock_arc(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}

/// Build a fresh display context tagged as the version-1 interface.
pub fn create_display(
    core: &Arc<Core>,
    _driver: Option<Guid>,
    outer: Option<&OuterUnknown>,
) -> DdResult<Arc<DisplayContext>> {
    if outer.is_some() {
        warn!("display creation with aggregation requested");
        return Err(DdError::NoAggregation);
    }
    debug!("create_display");
    Ok(DisplayContext::create(Arc::clone(core)))
}

/// Build a display context and immediately query it for the requested
/// interface, releasing the creation reference.
pub fn create_display_ex(
    core: &Arc<Core>,
    driver: Option<Guid>,
    iid: &Guid,
    outer: Option<&OuterUnknown>,
) -> DdResult<Arc<DisplayContext>> {
    let display = create_display(core, driver, outer)?;
    let queried = display.query_interface(iid);
    display.release();
    queried
}

/// Standalone clippers are not supported in the baseline; clippers come
/// from a display context.
pub fn create_standalone_clipper(
    _flags: u32,
    outer: Option<&OuterUnknown>,
) -> DdResult<Arc<ClipperObject>> {
    if outer.is_some() {
        return Err(DdError::NoAggregation);
    }
    Err(DdError::Unsupported)
}

const DRIVER_NAME: &str = "display";
const DRIVER_DESCRIPTION: &str = "Primary Display Driver";

/// Invoke the callback once for the synthetic primary display driver.
/// Returning `false` from the callback cancels the enumeration.
pub fn enumerate_drivers(
    cb: &mut dyn FnMut(Option<&Guid>, &str, &str) -> bool,
) -> DdResult<()> {
    debug!("enumerate_drivers");
    cb(None, DRIVER_DESCRIPTION, DRIVER_NAME);
    Ok(())
}

/// Wide-string variant; strings are NUL-terminated UTF-16 code units.
pub fn enumerate_drivers_w(
    cb: &mut dyn FnMut(Option<&Guid>, &[u16], &[u16]) -> bool,
) -> DdResult<()> {
    debug!("enumerate_drivers_w");
    let description = wide(DRIVER_DESCRIPTION);
    let name = wide(DRIVER_NAME);
    cb(None, &description, &name);
    Ok(())
}

/// Extended variant: the callback also receives the monitor association,
/// which the synthetic driver does not have.
pub fn enumerate_drivers_ex(
    cb: &mut dyn FnMut(Option<&Guid>, &str, &str, Option<MonitorHandle>) -> bool,
    _flags: u32,
) -> DdResult<()> {
    debug!("enumerate_drivers_ex");
    cb(None, DRIVER_DESCRIPTION, DRIVER_NAME, None);
    Ok(())
}

pub fn enumerate_drivers_ex_w(
    cb: &mut dyn FnMut(Option<&Guid>, &[u16], &[u16], Option<MonitorHandle>) -> bool,
    _flags: u32,
) -> DdResult<()> {
    debug!("enumerate_drivers_ex_w");
    let description = wide(DRIVER_DESCRIPTION);
    let name = wide(DRIVER_NAME);
    cb(None, &description, &name, None);
    Ok(())
}

fn wide(s: &str) -> Vec<u16> {
    let mut out: Vec<u16> = s.encode_utf16().collect();
    out.push(0);
    out
}

/// The module always refuses to unload while loaded into a host.
pub fn can_unload_now() -> bool {
    false
}

/// Class-factory lookup is not part of this shim.
pub fn get_class_object(_clsid: &Guid, _iid: &Guid) -> DdResult<()> {
    Err(DdError::ClassNotAvailable)
}
