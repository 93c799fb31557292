//! Interface identity and reference counting.
//!
//! One concrete object per family satisfies every interface generation at
//! once: `query_interface` maps each accepted identifier to the same object
//! and records the apparent version so version-dependent methods can
//! dispatch on it. Reference counts are explicit and atomic; the transition
//! to zero runs teardown exactly once.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::guid::{self, Guid};

/// Apparent display interface generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DisplayVersion {
    V1,
    V2,
    V4,
    V7,
}

impl DisplayVersion {
    /// Map a display interface identifier to its generation.
    pub fn from_iid(iid: &Guid) -> Option<Self> {
        if *iid == guid::IID_IDIRECTDRAW {
            Some(DisplayVersion::V1)
        } else if *iid == guid::IID_IDIRECTDRAW2 {
            Some(DisplayVersion::V2)
        } else if *iid == guid::IID_IDIRECTDRAW4 {
            Some(DisplayVersion::V4)
        } else if *iid == guid::IID_IDIRECTDRAW7 {
            Some(DisplayVersion::V7)
        } else {
            None
        }
    }
}

/// Apparent surface interface generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SurfaceVersion {
    V1,
    V2,
    V3,
    V4,
    V7,
}

impl SurfaceVersion {
    pub fn from_iid(iid: &Guid) -> Option<Self> {
        if *iid == guid::IID_IDIRECTDRAWSURFACE {
            Some(SurfaceVersion::V1)
        } else if *iid == guid::IID_IDIRECTDRAWSURFACE2 {
            Some(SurfaceVersion::V2)
        } else if *iid == guid::IID_IDIRECTDRAWSURFACE3 {
            Some(SurfaceVersion::V3)
        } else if *iid == guid::IID_IDIRECTDRAWSURFACE4 {
            Some(SurfaceVersion::V4)
        } else if *iid == guid::IID_IDIRECTDRAWSURFACE7 {
            Some(SurfaceVersion::V7)
        } else {
            None
        }
    }
}

/// Explicit reference count, starting at one for the creation reference.
pub struct RefCount(AtomicU32);

impl RefCount {
    pub fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Increment and return the new count.
    pub fn add_ref(&self) -> u32 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement and return the new count. Calls past zero stay at zero, so
    /// teardown can only be triggered by the single 1-to-0 transition.
    pub fn release(&self) -> u32 {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return 0;
            }
            match self.0.compare_exchange(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return current - 1,
                Err(seen) => current = seen,
            }
        }
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}
