//! Host capability traits and their test doubles.
//!
//! The core never talks to the window system or the OS clock directly;
//! everything goes through these capabilities, which the bootstrap wires up.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use openblit_common::{DdResult, WindowHandle};

use crate::remap::WindowEvent;
use crate::viewport::Viewport;

/// Monotonic tick source.
pub trait Clock {
    /// Milliseconds since an arbitrary origin.
    fn ticks_ms(&self) -> u64;

    /// Yield for approximately one host tick (the vsync gate).
    fn yield_tick(&self);

    fn sleep_ms(&self, ms: u64);
}

/// Scaling quality hint passed to the host blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFilter {
    Nearest,
    Halftone,
}

/// Installed into the host window procedure; rewrites events before the
/// game's own procedure sees them.
pub trait WindowHook {
    fn on_event(&self, event: WindowEvent) -> WindowEvent;
}

/// The host windowing capability: client geometry, frame delivery, and the
/// window-procedure hook point.
pub trait HostPresenter {
    fn window(&self) -> Option<WindowHandle>;

    fn client_size(&self) -> (u32, u32);

    /// Current desktop mode as (width, height, bits per pixel).
    fn desktop_mode(&self) -> (u32, u32, u32);

    /// Resize the window so its client area matches the given extent.
    fn resize_client(&self, width: u32, height: u32) -> DdResult<()>;

    fn move_window(&self, x: i32, y: i32);

    /// One-to-one frame delivery; `pixels` is `width * height` XRGB words.
    fn blit(&self, pixels: &[u32], width: u32, height: u32) -> DdResult<()>;

    /// Scaled delivery into a viewport of the client area.
    fn blit_scaled(
        &self,
        pixels: &[u32],
        width: u32,
        height: u32,
        viewport: Viewport,
        filter: ScaleFilter,
    ) -> DdResult<()>;

    fn install_window_hook(&self, hook: Arc<dyn WindowHook>);

    fn remove_window_hook(&self);
}

/// Wall-clock implementation over `std::time`.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn ticks_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn yield_tick(&self) {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }
}

/// Deterministic clock for tests: time only moves when advanced, and sleeps
/// advance it.
pub struct TestClock {
    now: Mutex<u64>,
    yields: Mutex<u32>,
}

impl TestClock {
    pub fn new() -> Self {
        Self { now: Mutex::new(0), yields: Mutex::new(0) }
    }

    pub fn advance(&self, ms: u64) {
        *self.now.lock().unwrap() += ms;
    }

    pub fn yields(&self) -> u32 {
        *self.yields.lock().unwrap()
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn ticks_ms(&self) -> u64 {
        *self.now.lock().unwrap()
    }

    fn yield_tick(&self) {
        *self.yields.lock().unwrap() += 1;
        self.advance(1);
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

#[derive(Default)]
struct HeadlessState {
    blits: u32,
    scaled_blits: u32,
    last_frame: Vec<u32>,
    last_extent: (u32, u32),
    last_viewport: Option<Viewport>,
    last_filter: Option<ScaleFilter>,
    resizes: Vec<(u32, u32)>,
    moves: Vec<(i32, i32)>,
}

/// Windowless host for unit tests: records every frame and geometry call and
/// lets tests drive window events through the installed hook.
pub struct HeadlessHost {
    client: Mutex<(u32, u32)>,
    desktop: (u32, u32, u32),
    hook: Mutex<Option<Arc<dyn WindowHook>>>,
    state: Mutex<HeadlessState>,
}

impl HeadlessHost {
    pub fn new() -> Arc<Self> {
        Self::with_client_size(640, 480)
    }

    pub fn with_client_size(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            client: Mutex::new((width, height)),
            desktop: (1920, 1080, 32),
            hook: Mutex::new(None),
            state: Mutex::new(HeadlessState::default()),
        })
    }

    pub fn set_client_size(&self, width: u32, height: u32) {
        *self.client.lock().unwrap() = (width, height);
    }

    /// Push a window event through the installed hook, returning the
    /// rewritten event the game would receive.
    pub fn send_event(&self, event: WindowEvent) -> WindowEvent {
        match self.hook.lock().unwrap().as_ref() {
            Some(hook) => hook.on_event(event),
            None => event,
        }
    }

    pub fn has_hook(&self) -> bool {
        self.hook.lock().unwrap().is_some()
    }

    pub fn presents(&self) -> u32 {
        let s = self.state.lock().unwrap();
        s.blits + s.scaled_blits
    }

    pub fn scaled_blits(&self) -> u32 {
        self.state.lock().unwrap().scaled_blits
    }

    pub fn last_frame(&self) -> Vec<u32> {
        self.state.lock().unwrap().last_frame.clone()
    }

    pub fn last_extent(&self) -> (u32, u32) {
        self.state.lock().unwrap().last_extent
    }

    pub fn last_viewport(&self) -> Option<Viewport> {
        self.state.lock().unwrap().last_viewport
    }

    pub fn last_filter(&self) -> Option<ScaleFilter> {
        self.state.lock().unwrap().last_filter
    }

    pub fn resizes(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().resizes.clone()
    }
}

impl HostPresenter for HeadlessHost {
    fn window(&self) -> Option<WindowHandle> {
        Some(WindowHandle(1))
    }

    fn client_size(&self) -> (u32, u32) {
        *self.client.lock().unwrap()
    }

    fn desktop_mode(&self) -> (u32, u32, u32) {
        self.desktop
    }

    fn resize_client(&self, width: u32, height: u32) -> DdResult<()> {
        *self.client.lock().unwrap() = (width, height);
        self.state.lock().unwrap().resizes.push((width, height));
        Ok(())
    }

    fn move_window(&self, x: i32, y: i32) {
        self.state.lock().unwrap().moves.push((x, y));
    }

    fn blit(&self, pixels: &[u32], width: u32, height: u32) -> DdResult<()> {
        let mut s = self.state.lock().unwrap();
        s.blits += 1;
        s.last_frame = pixels.to_vec();
        s.last_extent = (width, height);
        s.last_viewport = None;
        s.last_filter = None;
        Ok(())
    }

    fn blit_scaled(
        &self,
        pixels: &[u32],
        width: u32,
        height: u32,
        viewport: Viewport,
        filter: ScaleFilter,
    ) -> DdResult<()> {
        let mut s = self.state.lock().unwrap();
        s.scaled_blits += 1;
        s.last_frame = pixels.to_vec();
        s.last_extent = (width, height);
        s.last_viewport = Some(viewport);
        s.last_filter = Some(filter);
        Ok(())
    }

    fn install_window_hook(&self, hook: Arc<dyn WindowHook>) {
        *self.hook.lock().unwrap() = Some(hook);
    }

    fn remove_window_hook(&self) {
        *self.hook.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remap::{pack_point, PointerKind};

    struct Offsetting;

    impl WindowHook for Offsetting {
        fn on_event(&self, event: WindowEvent) -> WindowEvent {
            match event {
                WindowEvent::Pointer { kind, pos } => {
                    let (x, y) = crate::remap::unpack_point(pos);
                    WindowEvent::Pointer { kind, pos: pack_point(x + 1, y + 1) }
                }
                other => other,
            }
        }
    }

    #[test]
    fn headless_host_records_blits() {
        let host = HeadlessHost::new();
        host.blit(&[0xFF00_0000; 4], 2, 2).unwrap();
        assert_eq!(host.presents(), 1);
        assert_eq!(host.last_extent(), (2, 2));
    }

    #[test]
    fn events_route_through_hook() {
        let host = HeadlessHost::new();
        let ev = WindowEvent::Pointer { kind: PointerKind::Move, pos: pack_point(5, 5) };
        assert_eq!(host.send_event(ev), ev);

        host.install_window_hook(Arc::new(Offsetting));
        assert_eq!(
            host.send_event(ev),
            WindowEvent::Pointer { kind: PointerKind::Move, pos: pack_point(6, 6) }
        );

        host.remove_window_hook();
        assert_eq!(host.send_event(ev), ev);
    }

    #[test]
    fn test_clock_is_deterministic() {
        let clock = TestClock::new();
        assert_eq!(clock.ticks_ms(), 0);
        clock.advance(100);
        clock.sleep_ms(50);
        assert_eq!(clock.ticks_ms(), 150);
        clock.yield_tick();
        assert_eq!(clock.yields(), 1);
    }
}
