//! Format conversion and frame delivery.
//!
//! The presenter owns a 32-bit staging buffer matching the primary surface's
//! virtual extent. Every present converts the whole primary into staging via
//! the palette lookup table or the per-format bit shuffle, then hands the
//! frame to the host: one-to-one when the client area matches the virtual
//! extent, scaled into a viewport otherwise.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use openblit_common::{DdResult, ScalingMode, Settings};
use openblit_raster::{PaletteTable, PixelFormat, SurfaceBuffer};

use crate::host::{Clock, HostPresenter, ScaleFilter};
use crate::viewport::{compute_viewport, Viewport};

/// Presentation policy distilled from the settings.
#[derive(Debug, Clone, Copy)]
pub struct PresentOptions {
    pub vsync: bool,
    pub max_fps: i32,
    pub scaling: ScalingMode,
    pub filter: ScaleFilter,
}

impl PresentOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        // "maintain aspect ratio" promotes plain stretching to letterboxing.
        let scaling = match settings.scaling {
            ScalingMode::Stretch if settings.maintain_aspect => ScalingMode::Aspect,
            other => other,
        };
        Self {
            vsync: settings.vsync,
            max_fps: settings.max_fps,
            scaling,
            filter: if settings.bilinear { ScaleFilter::Halftone } else { ScaleFilter::Nearest },
        }
    }
}

impl Default for PresentOptions {
    fn default() -> Self {
        Self {
            vsync: true,
            max_fps: 0,
            scaling: ScalingMode::Stretch,
            filter: ScaleFilter::Nearest,
        }
    }
}

struct PresentState {
    staging: Vec<u32>,
    width: u32,
    height: u32,
    frames: u32,
    fps: u32,
    last_fps_tick: u64,
    last_present_tick: Option<u64>,
    shut_down: bool,
}

pub struct Presenter {
    host: Arc<dyn HostPresenter>,
    clock: Arc<dyn Clock>,
    opts: PresentOptions,
    state: Mutex<PresentState>,
}

impl Presenter {
    pub fn new(host: Arc<dyn HostPresenter>, clock: Arc<dyn Clock>, opts: PresentOptions) -> Self {
        Self {
            host,
            clock,
            opts,
            state: Mutex::new(PresentState {
                staging: Vec::new(),
                width: 0,
                height: 0,
                frames: 0,
                fps: 0,
                last_fps_tick: 0,
                last_present_tick: None,
                shut_down: false,
            }),
        }
    }

    pub fn vsync_enabled(&self) -> bool {
        self.opts.vsync
    }

    /// Yield for about one host tick, approximating the vertical blank.
    pub fn vsync_gate(&self) {
        self.clock.yield_tick();
    }

    /// Last published rolling one-second frame rate.
    pub fn fps(&self) -> u32 {
        self.state.lock().unwrap().fps
    }

    /// Viewport the current policy would use for a source extent.
    pub fn viewport_for(&self, client: (u32, u32), src: (u32, u32)) -> Viewport {
        compute_viewport(client.0, client.1, src.0, src.1, self.opts.scaling)
    }

    /// Convert the surface into staging and deliver it to the host window.
    pub fn present(&self, buf: &SurfaceBuffer, palette: Option<&PaletteTable>) -> DdResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.shut_down {
            return Ok(());
        }

        self.throttle(&mut state);
        Self::convert(&mut state, buf, palette);

        let (width, height) = (state.width, state.height);
        let client = self.host.client_size();
        if client == (width, height) {
            self.host.blit(&state.staging, width, height)?;
        } else {
            let vp = compute_viewport(client.0, client.1, width, height, self.opts.scaling);
            self.host
                .blit_scaled(&state.staging, width, height, vp, self.opts.filter)?;
        }

        self.count_frame(&mut state);
        Ok(())
    }

    /// Space presents at least `1000 / max_fps` ms apart.
    fn throttle(&self, state: &mut PresentState) {
        if self.opts.max_fps <= 0 {
            return;
        }
        let interval = (1000 / self.opts.max_fps.max(1)) as u64;
        let now = self.clock.ticks_ms();
        if let Some(last) = state.last_present_tick {
            let elapsed = now.saturating_sub(last);
            if elapsed < interval {
                self.clock.sleep_ms(interval - elapsed);
            }
        }
        state.last_present_tick = Some(self.clock.ticks_ms());
    }

    fn convert(state: &mut PresentState, buf: &SurfaceBuffer, palette: Option<&PaletteTable>) {
        let (width, height) = (buf.width(), buf.height());
        if (state.width, state.height) != (width, height) {
            debug!(width, height, "resizing staging buffer");
            state.staging = vec![0u32; width as usize * height as usize];
            state.width = width;
            state.height = height;
        }

        let w = width as usize;
        match buf.format() {
            PixelFormat::Indexed8 => {
                let fallback;
                let lut = match palette {
                    Some(pal) => pal.lut(),
                    None => {
                        fallback = PaletteTable::grayscale();
                        fallback.lut()
                    }
                };
                for y in 0..height {
                    let src = &buf.row(y)[..w];
                    let dst = &mut state.staging[y as usize * w..(y as usize + 1) * w];
                    for (out, &idx) in dst.iter_mut().zip(src) {
                        *out = lut[idx as usize];
                    }
                }
            }
            PixelFormat::Rgb565 => {
                for y in 0..height {
                    let src = &buf.row(y)[..w * 2];
                    let dst = &mut state.staging[y as usize * w..(y as usize + 1) * w];
                    for (out, px) in dst.iter_mut().zip(src.chunks_exact(2)) {
                        let raw = u16::from_le_bytes([px[0], px[1]]) as u32;
                        *out = PixelFormat::Rgb565.to_xrgb32(raw, None);
                    }
                }
            }
            PixelFormat::Bgr888 => {
                for y in 0..height {
                    let src = &buf.row(y)[..w * 3];
                    let dst = &mut state.staging[y as usize * w..(y as usize + 1) * w];
                    for (out, px) in dst.iter_mut().zip(src.chunks_exact(3)) {
                        *out = 0xFF00_0000
                            | (px[2] as u32) << 16
                            | (px[1] as u32) << 8
                            | px[0] as u32;
                    }
                }
            }
            PixelFormat::Xrgb8888 => {
                for y in 0..height {
                    let src = &buf.row(y)[..w * 4];
                    let dst = &mut state.staging[y as usize * w..(y as usize + 1) * w];
                    for (out, px) in dst.iter_mut().zip(src.chunks_exact(4)) {
                        *out = 0xFF00_0000 | u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
                    }
                }
            }
        }
    }

    fn count_frame(&self, state: &mut PresentState) {
        state.frames += 1;
        let now = self.clock.ticks_ms();
        if now.saturating_sub(state.last_fps_tick) >= 1000 {
            state.fps = state.frames;
            state.frames = 0;
            state.last_fps_tick = now;
        }
    }

    /// Drop the staging buffer and refuse further presents.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.shut_down {
            info!("presenter shut down");
            state.shut_down = true;
            state.staging = Vec::new();
            state.width = 0;
            state.height = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessHost, TestClock};
    use openblit_common::Rect;
    use openblit_raster::{blit, PaletteEntry};

    fn presenter_with(
        host: Arc<HeadlessHost>,
        clock: Arc<TestClock>,
        opts: PresentOptions,
    ) -> Presenter {
        Presenter::new(host, clock, opts)
    }

    #[test]
    fn one_to_one_when_client_matches() {
        let host = HeadlessHost::with_client_size(8, 4);
        let clock = Arc::new(TestClock::new());
        let p = presenter_with(host.clone(), clock, PresentOptions::default());

        let mut buf = SurfaceBuffer::new(8, 4, PixelFormat::Xrgb8888).unwrap();
        blit::fill(&mut buf, Rect::of_extent(8, 4), 0x0012_3456).unwrap();
        p.present(&buf, None).unwrap();

        assert_eq!(host.presents(), 1);
        assert_eq!(host.scaled_blits(), 0);
        // Alpha forced opaque on conversion.
        assert_eq!(host.last_frame()[0], 0xFF12_3456);
    }

    #[test]
    fn scaled_when_client_differs() {
        let host = HeadlessHost::with_client_size(16, 8);
        let clock = Arc::new(TestClock::new());
        let p = presenter_with(host.clone(), clock, PresentOptions::default());

        let buf = SurfaceBuffer::new(8, 4, PixelFormat::Xrgb8888).unwrap();
        p.present(&buf, None).unwrap();

        assert_eq!(host.scaled_blits(), 1);
        let vp = host.last_viewport().unwrap();
        assert_eq!((vp.width, vp.height), (16, 8));
    }

    #[test]
    fn indexed_conversion_uses_palette() {
        let host = HeadlessHost::with_client_size(2, 1);
        let clock = Arc::new(TestClock::new());
        let p = presenter_with(host.clone(), clock, PresentOptions::default());

        let mut pal = PaletteTable::grayscale();
        pal.set_entries(5, &[PaletteEntry::rgb(0xAA, 0xBB, 0xCC)]).unwrap();

        let mut buf = SurfaceBuffer::new(2, 1, PixelFormat::Indexed8).unwrap();
        buf.write_pixel(0, 0, 5);
        buf.write_pixel(1, 0, 0x20);
        p.present(&buf, Some(&pal)).unwrap();

        assert_eq!(host.last_frame(), vec![0xFFAA_BBCC, 0xFF20_2020]);
    }

    #[test]
    fn rgb565_conversion() {
        let host = HeadlessHost::with_client_size(2, 1);
        let clock = Arc::new(TestClock::new());
        let p = presenter_with(host.clone(), clock, PresentOptions::default());

        let mut buf = SurfaceBuffer::new(2, 1, PixelFormat::Rgb565).unwrap();
        buf.write_pixel(0, 0, 0xF800);
        buf.write_pixel(1, 0, 0x001F);
        p.present(&buf, None).unwrap();

        assert_eq!(host.last_frame(), vec![0xFFF8_0000, 0xFF00_00F8]);
    }

    #[test]
    fn bgr888_conversion_swaps_to_rgb() {
        let host = HeadlessHost::with_client_size(1, 1);
        let clock = Arc::new(TestClock::new());
        let p = presenter_with(host.clone(), clock, PresentOptions::default());

        let mut buf = SurfaceBuffer::new(1, 1, PixelFormat::Bgr888).unwrap();
        // Memory order B, G, R.
        buf.bytes_mut()[0] = 0x56;
        buf.bytes_mut()[1] = 0x34;
        buf.bytes_mut()[2] = 0x12;
        p.present(&buf, None).unwrap();

        assert_eq!(host.last_frame()[0], 0xFF12_3456);
    }

    #[test]
    fn fps_counter_publishes_each_second() {
        let host = HeadlessHost::with_client_size(2, 2);
        let clock = Arc::new(TestClock::new());
        let p = presenter_with(host.clone(), clock.clone(), PresentOptions::default());

        let buf = SurfaceBuffer::new(2, 2, PixelFormat::Xrgb8888).unwrap();
        for _ in 0..30 {
            p.present(&buf, None).unwrap();
        }
        assert_eq!(p.fps(), 0);

        clock.advance(1000);
        p.present(&buf, None).unwrap();
        assert_eq!(p.fps(), 31);
    }

    #[test]
    fn throttle_spaces_presents() {
        let host = HeadlessHost::with_client_size(2, 2);
        let clock = Arc::new(TestClock::new());
        let opts = PresentOptions { max_fps: 100, ..PresentOptions::default() };
        let p = presenter_with(host.clone(), clock.clone(), opts);

        let buf = SurfaceBuffer::new(2, 2, PixelFormat::Xrgb8888).unwrap();
        p.present(&buf, None).unwrap();
        // Second present sleeps the remaining 10 ms interval on the clock.
        p.present(&buf, None).unwrap();
        assert!(clock.ticks_ms() >= 10);
    }

    #[test]
    fn presents_after_shutdown_are_ignored() {
        let host = HeadlessHost::with_client_size(2, 2);
        let clock = Arc::new(TestClock::new());
        let p = presenter_with(host.clone(), clock, PresentOptions::default());

        p.shutdown();
        let buf = SurfaceBuffer::new(2, 2, PixelFormat::Xrgb8888).unwrap();
        p.present(&buf, None).unwrap();
        assert_eq!(host.presents(), 0);
    }
}
