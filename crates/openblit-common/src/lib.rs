//! Common types shared across the OpenBlit crates.
//!
//! OpenBlit re-implements the legacy DirectDraw (v1-v7) raster API on top of
//! a modern windowed presentation path. This crate carries the pieces every
//! other crate needs: the error taxonomy, the resolved configuration record,
//! rectangles, and the rotating log sink.

pub mod error;
pub mod log;
pub mod rect;
pub mod settings;

pub use error::{DdError, DdResult};
pub use rect::Rect;
pub use settings::{LogLevel, ScalingMode, Settings};

/// Opaque host window identity. The host side decides what the value means;
/// the core only stores and compares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// Opaque host monitor identity, passed through driver enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorHandle(pub u64);
