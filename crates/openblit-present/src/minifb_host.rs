//! `minifb`-backed host window.
//!
//! Owns the OS window, delivers converted frames, and synthesizes window
//! events from polled input state. Programmatic client resizes re-create the
//! window, since the underlying toolkit has no resize call.

use std::sync::{Arc, Mutex};

use minifb::{MouseButton, MouseMode, Window, WindowOptions};
use tracing::{debug, info};

use openblit_common::{DdError, DdResult, WindowHandle};

use crate::host::{HostPresenter, ScaleFilter, WindowHook};
use crate::remap::{pack_point, PointerKind, WindowEvent};
use crate::viewport::{scale_into, Viewport};

struct PumpState {
    size: (usize, usize),
    mouse: (i32, i32),
    left: bool,
    right: bool,
    middle: bool,
}

pub struct MinifbHost {
    title: String,
    window: Mutex<Window>,
    hook: Mutex<Option<Arc<dyn WindowHook>>>,
    sink: Mutex<Option<Box<dyn Fn(WindowEvent)>>>,
    pump: Mutex<PumpState>,
    scaled: Mutex<Vec<u32>>,
}

impl MinifbHost {
    pub fn new(title: &str, width: u32, height: u32) -> DdResult<Arc<Self>> {
        let window = Self::open_window(title, width, height)?;
        let size = window.get_size();
        info!(width, height, "host window created");
        Ok(Arc::new(Self {
            title: title.to_string(),
            window: Mutex::new(window),
            hook: Mutex::new(None),
            sink: Mutex::new(None),
            pump: Mutex::new(PumpState {
                size,
                mouse: (0, 0),
                left: false,
                right: false,
                middle: false,
            }),
            scaled: Mutex::new(Vec::new()),
        }))
    }

    fn open_window(title: &str, width: u32, height: u32) -> DdResult<Window> {
        let options = WindowOptions { resize: true, ..Default::default() };
        Window::new(title, width.max(1) as usize, height.max(1) as usize, options)
            .map_err(|e| DdError::generic(format!("window creation failed: {e}")))
    }

    pub fn is_open(&self) -> bool {
        self.window.lock().unwrap().is_open()
    }

    pub fn set_title(&self, title: &str) {
        self.window.lock().unwrap().set_title(title);
    }

    /// Receives the events left over after the hook rewrite, i.e. what the
    /// game's own window procedure would see.
    pub fn set_event_sink(&self, sink: impl Fn(WindowEvent) + 'static) {
        *self.sink.lock().unwrap() = Some(Box::new(sink));
    }

    fn dispatch(&self, event: WindowEvent) {
        let rewritten = match self.hook.lock().unwrap().as_ref() {
            Some(hook) => hook.on_event(event),
            None => event,
        };
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            sink(rewritten);
        }
    }

    /// Poll the window once: refresh input state, synthesize events, and
    /// keep the event queue serviced. Returns false when the window closed.
    pub fn pump(&self) -> bool {
        let (size, mouse, buttons) = {
            let mut window = self.window.lock().unwrap();
            if !window.is_open() {
                return false;
            }
            window.update();
            let size = window.get_size();
            let mouse = window
                .get_mouse_pos(MouseMode::Clamp)
                .map(|(x, y)| (x as i32, y as i32))
                .unwrap_or((0, 0));
            let buttons = (
                window.get_mouse_down(MouseButton::Left),
                window.get_mouse_down(MouseButton::Right),
                window.get_mouse_down(MouseButton::Middle),
            );
            (size, mouse, buttons)
        };

        let mut events = Vec::new();
        {
            let mut guard = self.pump.lock().unwrap();
            let prev = &mut *guard;
            if size != prev.size {
                prev.size = size;
                events.push(WindowEvent::Resized {
                    width: size.0 as u32,
                    height: size.1 as u32,
                });
            }
            let pos = pack_point(mouse.0, mouse.1);
            if mouse != prev.mouse {
                prev.mouse = mouse;
                events.push(WindowEvent::Pointer { kind: PointerKind::Move, pos });
            }
            let transitions = [
                (buttons.0, &mut prev.left, PointerKind::LeftDown, PointerKind::LeftUp),
                (buttons.1, &mut prev.right, PointerKind::RightDown, PointerKind::RightUp),
                (buttons.2, &mut prev.middle, PointerKind::MiddleDown, PointerKind::MiddleUp),
            ];
            for (now, prev_state, down, up) in transitions {
                if now != *prev_state {
                    *prev_state = now;
                    events.push(WindowEvent::Pointer {
                        kind: if now { down } else { up },
                        pos,
                    });
                }
            }
        }

        for event in events {
            self.dispatch(event);
        }
        true
    }
}

impl HostPresenter for MinifbHost {
    fn window(&self) -> Option<WindowHandle> {
        Some(WindowHandle(1))
    }

    fn client_size(&self) -> (u32, u32) {
        let (w, h) = self.window.lock().unwrap().get_size();
        (w as u32, h as u32)
    }

    fn desktop_mode(&self) -> (u32, u32, u32) {
        // The toolkit cannot query the desktop; report a common mode.
        (1920, 1080, 32)
    }

    fn resize_client(&self, width: u32, height: u32) -> DdResult<()> {
        debug!(width, height, "re-creating host window for client resize");
        let replacement = Self::open_window(&self.title, width, height)?;
        let mut window = self.window.lock().unwrap();
        *window = replacement;
        self.pump.lock().unwrap().size = window.get_size();
        Ok(())
    }

    fn move_window(&self, x: i32, y: i32) {
        self.window
            .lock()
            .unwrap()
            .set_position(x as isize, y as isize);
    }

    fn blit(&self, pixels: &[u32], width: u32, height: u32) -> DdResult<()> {
        self.window
            .lock()
            .unwrap()
            .update_with_buffer(pixels, width as usize, height as usize)
            .map_err(|e| DdError::generic(format!("present failed: {e}")))
    }

    fn blit_scaled(
        &self,
        pixels: &[u32],
        width: u32,
        height: u32,
        viewport: Viewport,
        _filter: ScaleFilter,
    ) -> DdResult<()> {
        let (client_w, client_h) = self.client_size();
        let mut out = self.scaled.lock().unwrap();
        out.resize(client_w as usize * client_h as usize, 0);
        scale_into(pixels, width, height, &mut out, client_w, client_h, viewport);
        self.window
            .lock()
            .unwrap()
            .update_with_buffer(&out, client_w as usize, client_h as usize)
            .map_err(|e| DdError::generic(format!("present failed: {e}")))
    }

    fn install_window_hook(&self, hook: Arc<dyn WindowHook>) {
        *self.hook.lock().unwrap() = Some(hook);
    }

    fn remove_window_hook(&self) {
        *self.hook.lock().unwrap() = None;
    }
}
