//! Pointer coordinate remapping.
//!
//! The game believes it runs at its virtual resolution; the window client
//! area may be any size. Pointer events carry the legacy packed 16-bit
//! coordinate pair, and the remapper rewrites them from window space into
//! game space before the game's own window procedure sees them. The logic is
//! pure so it can be tested without a host.

use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Move,
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
    MiddleDown,
    MiddleUp,
}

/// Events delivered by the host window procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Resized { width: u32, height: u32 },
    Pointer { kind: PointerKind, pos: u32 },
    Other { code: u32, param: u32 },
}

/// Pack a coordinate pair into the legacy low-word/high-word layout.
pub fn pack_point(x: i32, y: i32) -> u32 {
    ((x as u16) as u32) | (((y as u16) as u32) << 16)
}

/// Unpack with 16-bit sign extension, matching the legacy accessors.
pub fn unpack_point(packed: u32) -> (i32, i32) {
    let x = (packed & 0xFFFF) as u16 as i16 as i32;
    let y = (packed >> 16) as u16 as i16 as i32;
    (x, y)
}

/// Window-to-game coordinate remapper state. At most one per window.
#[derive(Debug, Clone)]
pub struct InputRemapper {
    attached: bool,
    enabled: bool,
    game_w: u32,
    game_h: u32,
    client_w: u32,
    client_h: u32,
    scale_x: f32,
    scale_y: f32,
    offset_x: i32,
    offset_y: i32,
}

impl InputRemapper {
    pub fn new(enabled: bool) -> Self {
        Self {
            attached: false,
            enabled,
            game_w: 640,
            game_h: 480,
            client_w: 1,
            client_h: 1,
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0,
            offset_y: 0,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Install for a window: record the virtual size and the current client
    /// extent, reset the offset, and derive the scale.
    pub fn attach(&mut self, game_w: u32, game_h: u32, client: (u32, u32)) {
        self.attached = true;
        self.game_w = game_w.max(1);
        self.game_h = game_h.max(1);
        self.offset_x = 0;
        self.offset_y = 0;
        self.set_client(client.0, client.1);
    }

    /// Restore the window to its unhooked state.
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn set_game_size(&mut self, width: u32, height: u32) {
        self.game_w = width.max(1);
        self.game_h = height.max(1);
        self.rescale(self.client_w, self.client_h);
    }

    /// Recompute the scale from a new client rect; the full client is the
    /// effective viewport until told otherwise.
    pub fn set_client(&mut self, width: u32, height: u32) {
        self.client_w = width.max(1);
        self.client_h = height.max(1);
        self.offset_x = 0;
        self.offset_y = 0;
        self.rescale(self.client_w, self.client_h);
    }

    /// Track the presenter's viewport so letterboxed and integer-scaled
    /// modes remap correctly.
    pub fn set_viewport(&mut self, vp: &Viewport) {
        self.offset_x = vp.x as i32;
        self.offset_y = vp.y as i32;
        self.rescale(vp.width, vp.height);
    }

    fn rescale(&mut self, effective_w: u32, effective_h: u32) {
        self.scale_x = self.game_w as f32 / effective_w.max(1) as f32;
        self.scale_y = self.game_h as f32 / effective_h.max(1) as f32;
    }

    /// Map a window point into game space, clamped to the virtual extent.
    pub fn map_point(&self, x: i32, y: i32) -> (i32, i32) {
        let gx = ((x - self.offset_x) as f32 * self.scale_x).floor() as i32;
        let gy = ((y - self.offset_y) as f32 * self.scale_y).floor() as i32;
        (
            gx.clamp(0, self.game_w as i32 - 1),
            gy.clamp(0, self.game_h as i32 - 1),
        )
    }

    /// Rewrite one window event. Size changes update the stored client rect;
    /// pointer events get their coordinates remapped; everything else passes
    /// through untouched.
    pub fn handle(&mut self, event: WindowEvent) -> WindowEvent {
        match event {
            WindowEvent::Resized { width, height } => {
                self.set_client(width, height);
                event
            }
            WindowEvent::Pointer { kind, pos } if self.attached && self.enabled => {
                let (x, y) = unpack_point(pos);
                let (gx, gy) = self.map_point(x, y);
                WindowEvent::Pointer { kind, pos: pack_point(gx, gy) }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        assert_eq!(unpack_point(pack_point(100, 200)), (100, 200));
        assert_eq!(unpack_point(pack_point(0, 0)), (0, 0));
        // Negative coordinates survive via sign extension.
        assert_eq!(unpack_point(pack_point(-5, -7)), (-5, -7));
    }

    #[test]
    fn identity_when_client_matches_game() {
        let mut remap = InputRemapper::new(true);
        remap.attach(640, 480, (640, 480));
        assert_eq!(remap.map_point(17, 23), (17, 23));
    }

    #[test]
    fn downscales_from_doubled_window() {
        let mut remap = InputRemapper::new(true);
        remap.attach(640, 480, (1280, 960));
        assert_eq!(remap.map_point(1279, 959), (639, 479));
        assert_eq!(remap.map_point(2, 2), (1, 1));
    }

    #[test]
    fn clamps_to_game_bounds() {
        let mut remap = InputRemapper::new(true);
        remap.attach(640, 480, (640, 480));
        assert_eq!(remap.map_point(-10, -10), (0, 0));
        assert_eq!(remap.map_point(5000, 5000), (639, 479));
    }

    #[test]
    fn viewport_offset_applies() {
        let mut remap = InputRemapper::new(true);
        remap.attach(640, 480, (1920, 1080));
        remap.set_viewport(&Viewport { x: 240, y: 0, width: 1440, height: 1080 });
        // Left bar clamps to column zero.
        assert_eq!(remap.map_point(100, 500), (0, 222));
        // Viewport origin is game origin.
        assert_eq!(remap.map_point(240, 0), (0, 0));
    }

    #[test]
    fn degenerate_client_substitutes_one() {
        let mut remap = InputRemapper::new(true);
        remap.attach(640, 480, (0, 0));
        // Scale against a 1x1 client; points clamp instead of dividing by 0.
        assert_eq!(remap.map_point(1, 1), (639, 479));
    }

    #[test]
    fn resize_event_recomputes_scale() {
        let mut remap = InputRemapper::new(true);
        remap.attach(640, 480, (640, 480));
        let out = remap.handle(WindowEvent::Resized { width: 1280, height: 960 });
        assert_eq!(out, WindowEvent::Resized { width: 1280, height: 960 });

        let out = remap.handle(WindowEvent::Pointer {
            kind: PointerKind::Move,
            pos: pack_point(1279, 959),
        });
        assert_eq!(
            out,
            WindowEvent::Pointer { kind: PointerKind::Move, pos: pack_point(639, 479) }
        );
    }

    #[test]
    fn non_pointer_events_pass_through() {
        let mut remap = InputRemapper::new(true);
        remap.attach(640, 480, (1280, 960));
        let ev = WindowEvent::Other { code: 0x10, param: 42 };
        assert_eq!(remap.handle(ev), ev);
    }

    #[test]
    fn disabled_remapper_passes_pointer_events() {
        let mut remap = InputRemapper::new(false);
        remap.attach(640, 480, (1280, 960));
        let ev = WindowEvent::Pointer { kind: PointerKind::LeftDown, pos: pack_point(100, 100) };
        assert_eq!(remap.handle(ev), ev);
    }

    #[test]
    fn detach_restores_pass_through() {
        let mut remap = InputRemapper::new(true);
        remap.attach(640, 480, (1280, 960));
        remap.detach();
        assert!(!remap.is_attached());
        let ev = WindowEvent::Pointer { kind: PointerKind::Move, pos: pack_point(10, 10) };
        assert_eq!(remap.handle(ev), ev);
    }
}
