//! Presentation path of OpenBlit.
//!
//! Converts the primary surface into a 32-bit staging buffer, scales it into
//! the host window, and rewrites pointer coordinates back into the game's
//! virtual resolution. The host window system itself sits behind the
//! [`host::HostPresenter`] capability; a `minifb`-backed implementation and a
//! headless test double are provided.

pub mod host;
pub mod minifb_host;
pub mod presenter;
pub mod remap;
pub mod viewport;

pub use host::{Clock, HeadlessHost, HostPresenter, ScaleFilter, SystemClock, TestClock, WindowHook};
pub use minifb_host::MinifbHost;
pub use presenter::{PresentOptions, Presenter};
pub use remap::{InputRemapper, PointerKind, WindowEvent};
pub use viewport::Viewport;
