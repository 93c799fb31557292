//! Demo bootstrap.
//!
//! Wires settings, logging, a window host, and a clock into the core, then
//! drives the legacy API the way a hosted game would: cooperative level,
//! display mode, a flip chain with a palette, and a lock/draw/flip loop
//! rendering a moving plasma.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use openblit_common::{log, Settings};
use openblit_ddraw::{
    create_display_ex, guid, Core, CoopFlags, FlipFlags, LockFlags, PaletteCaps, SurfaceCaps,
    SurfaceDesc,
};
use openblit_present::{MinifbHost, SystemClock};
use openblit_raster::PaletteEntry;

const GAME_WIDTH: u32 = 640;
const GAME_HEIGHT: u32 = 480;

fn main() -> Result<()> {
    let settings = Settings::load(std::path::Path::new("openblit.ini"), "openblit-demo");
    log::init(&settings);
    info!("demo starting");

    let host = MinifbHost::new("OpenBlit Demo", GAME_WIDTH, GAME_HEIGHT)
        .map_err(|e| anyhow!("{e}"))?;
    let clock = Arc::new(SystemClock::new());
    let core = Core::new(host.clone(), clock, settings);

    let display = create_display_ex(&core, None, &guid::IID_IDIRECTDRAW7, None)
        .map_err(|e| anyhow!("{e}"))
        .context("creating display context")?;

    display
        .set_cooperative_level(core.host().window(), CoopFlags::NORMAL)
        .map_err(|e| anyhow!("{e}"))?;
    display
        .set_display_mode(GAME_WIDTH, GAME_HEIGHT, 8)
        .map_err(|e| anyhow!("{e}"))?;

    let primary = display
        .create_surface(&SurfaceDesc::primary(1), None)
        .map_err(|e| anyhow!("{e}"))
        .context("creating flip chain")?;
    let back = primary
        .get_attached_surface(SurfaceCaps::BACK_BUFFER)
        .map_err(|e| anyhow!("{e}"))?;

    let palette = display
        .create_palette(PaletteCaps::EIGHT_BIT, Some(&fire_palette()), None)
        .map_err(|e| anyhow!("{e}"))?;
    primary
        .set_palette(Some(&palette))
        .map_err(|e| anyhow!("{e}"))?;

    info!("entering frame loop");
    let mut tick: u32 = 0;
    while host.pump() {
        back.lock(None, LockFlags::default()).map_err(|e| anyhow!("{e}"))?;
        back.with_pixels_mut(|buf| {
            for y in 0..GAME_HEIGHT {
                let row = buf.row_mut(y);
                for (x, px) in row[..GAME_WIDTH as usize].iter_mut().enumerate() {
                    *px = plasma(x as u32, y, tick);
                }
            }
        });
        back.unlock(None).map_err(|e| anyhow!("{e}"))?;

        primary.flip(FlipFlags::default()).map_err(|e| anyhow!("{e}"))?;

        tick = tick.wrapping_add(1);
        if tick % 32 == 0 {
            host.set_title(&format!(
                "OpenBlit Demo - {} fps",
                display.presenter().fps()
            ));
        }
    }

    // Matched releases: palette, chain, display.
    palette.release();
    back.release();
    primary.release();
    display.release();
    info!("demo finished");
    Ok(())
}

/// Classic fire ramp: black through red and orange into white.
fn fire_palette() -> Vec<PaletteEntry> {
    (0..256)
        .map(|i| {
            let i = i as u32;
            let r = (i * 3).min(255) as u8;
            let g = i.saturating_sub(64).min(255) as u8;
            let b = i.saturating_sub(192).saturating_mul(4).min(255) as u8;
            PaletteEntry::rgb(r, g, b)
        })
        .collect()
}

fn plasma(x: u32, y: u32, tick: u32) -> u8 {
    let a = ((x + tick) / 4) & 0xFF;
    let b = ((y + tick / 2) / 3) & 0xFF;
    let c = ((x + y) / 8) & 0xFF;
    ((a + b + c) / 3) as u8
}
