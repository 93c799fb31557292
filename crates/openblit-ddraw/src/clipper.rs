//! Reference-counted clipper object.
//!
//! A clipper is either bound to a window, in which case its clip list is a
//! single rectangle equal to that window's client rect, or it carries an
//! explicit region payload. At most one of the two is in force; setting one
//! clears the other.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use openblit_common::{DdError, DdResult, Rect, WindowHandle};
use openblit_present::HostPresenter;

use crate::guid::{Guid, IID_IDIRECTDRAWCLIPPER, IID_IUNKNOWN};
use crate::iface::RefCount;
use crate::region;
use crate::OuterUnknown;

#[derive(Default)]
struct ClipperState {
    window: Option<WindowHandle>,
    region: Option<Vec<u8>>,
    changed: bool,
}

pub struct ClipperObject {
    self_ref: std::sync::Weak<ClipperObject>,
    refs: RefCount,
    host: Arc<dyn HostPresenter>,
    state: Mutex<ClipperState>,
}

impl ClipperObject {
    pub(crate) fn create(
        host: Arc<dyn HostPresenter>,
        _flags: u32,
        outer: Option<&OuterUnknown>,
    ) -> DdResult<Arc<ClipperObject>> {
        if outer.is_some() {
            warn!("clipper creation with aggregation requested");
            return Err(DdError::NoAggregation);
        }
        debug!("clipper created");
        Ok(Arc::new_cyclic(|self_ref| ClipperObject {
            self_ref: self_ref.clone(),
            refs: RefCount::new(),
            host,
            state: Mutex::new(ClipperState::default()),
        }))
    }

    pub fn query_interface(&self, iid: &Guid) -> DdResult<Arc<ClipperObject>> {
        if *iid == IID_IUNKNOWN || *iid == IID_IDIRECTDRAWCLIPPER {
            let this = self
                .self_ref
                .upgrade()
                .ok_or_else(|| DdError::generic("clipper detached"))?;
            self.refs.add_ref();
            Ok(this)
        } else {
            Err(DdError::NoInterface)
        }
    }

    pub fn add_ref(&self) -> u32 {
        self.refs.add_ref()
    }

    pub fn release(&self) -> u32 {
        let remaining = self.refs.release();
        if remaining == 0 {
            debug!("clipper destroyed");
        }
        remaining
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.count()
    }

    /// Bind to a window; an explicit region previously set is dropped.
    pub fn set_hwnd(&self, window: Option<WindowHandle>) -> DdResult<()> {
        let mut state = self.state.lock().unwrap();
        state.window = window;
        if window.is_some() {
            state.region = None;
        }
        Ok(())
    }

    pub fn get_hwnd(&self) -> Option<WindowHandle> {
        self.state.lock().unwrap().window
    }

    /// Store an explicit region payload (validated), clearing any window
    /// binding. `None` clears the stored region.
    pub fn set_clip_list(&self, data: Option<&[u8]>) -> DdResult<()> {
        let mut state = self.state.lock().unwrap();
        match data {
            Some(bytes) => {
                region::decode_region(bytes)?;
                state.region = Some(bytes.to_vec());
                state.window = None;
            }
            None => state.region = None,
        }
        Ok(())
    }

    /// Write the clip list into `out`, returning the byte count. With no
    /// output buffer, only the required size is reported.
    pub fn get_clip_list(&self, out: Option<&mut [u8]>) -> DdResult<usize> {
        let state = self.state.lock().unwrap();

        let bytes = if state.window.is_some() {
            let (w, h) = self.host.client_size();
            let client = Rect::of_extent(w, h);
            region::encode_region(client, &[client])
        } else if let Some(region) = &state.region {
            region.clone()
        } else {
            return Err(DdError::NoClipperAttached);
        };

        match out {
            None => Ok(bytes.len()),
            Some(buf) if buf.len() < bytes.len() => {
                Err(DdError::MoreData { required: bytes.len() })
            }
            Some(buf) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
        }
    }

    pub fn is_clip_list_changed(&self) -> bool {
        self.state.lock().unwrap().changed
    }

    /// Creation is the initialization in this implementation.
    pub fn initialize(&self) -> DdResult<()> {
        Err(DdError::AlreadyInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openblit_present::HeadlessHost;

    fn clipper() -> Arc<ClipperObject> {
        let host = HeadlessHost::with_client_size(640, 480);
        ClipperObject::create(host, 0, None).unwrap()
    }

    #[test]
    fn window_bound_clip_list_is_client_rect() {
        let clip = clipper();
        clip.set_hwnd(Some(WindowHandle(7))).unwrap();

        // Size query first, then the payload.
        let size = clip.get_clip_list(None).unwrap();
        assert_eq!(size, region::region_size(1));

        let mut buf = vec![0u8; size];
        clip.get_clip_list(Some(&mut buf)).unwrap();
        let (bound, rects) = region::decode_region(&buf).unwrap();
        assert_eq!(bound, Rect::of_extent(640, 480));
        assert_eq!(rects, vec![Rect::of_extent(640, 480)]);
    }

    #[test]
    fn undersized_buffer_reports_required() {
        let clip = clipper();
        clip.set_hwnd(Some(WindowHandle(7))).unwrap();
        let mut buf = vec![0u8; 8];
        assert_eq!(
            clip.get_clip_list(Some(&mut buf)),
            Err(DdError::MoreData { required: region::region_size(1) })
        );
    }

    #[test]
    fn explicit_region_round_trip() {
        let clip = clipper();
        let payload =
            region::encode_region(Rect::new(0, 0, 10, 10), &[Rect::new(0, 0, 10, 10)]);
        clip.set_clip_list(Some(&payload)).unwrap();

        let mut buf = vec![0u8; payload.len()];
        assert_eq!(clip.get_clip_list(Some(&mut buf)).unwrap(), payload.len());
        assert_eq!(buf, payload);
    }

    #[test]
    fn window_and_region_are_exclusive() {
        let clip = clipper();
        let payload = region::encode_region(Rect::new(0, 0, 5, 5), &[]);
        clip.set_clip_list(Some(&payload)).unwrap();
        assert_eq!(clip.get_hwnd(), None);

        clip.set_hwnd(Some(WindowHandle(3))).unwrap();
        // The explicit region was dropped; the window rect now rules.
        let size = clip.get_clip_list(None).unwrap();
        assert_eq!(size, region::region_size(1));
    }

    #[test]
    fn empty_clipper_has_no_list() {
        let clip = clipper();
        assert_eq!(clip.get_clip_list(None), Err(DdError::NoClipperAttached));
    }

    #[test]
    fn malformed_region_rejected() {
        let clip = clipper();
        assert_eq!(
            clip.set_clip_list(Some(&[1, 2, 3])),
            Err(DdError::InvalidArgument)
        );
    }

    #[test]
    fn change_flag_defaults_false() {
        let clip = clipper();
        assert!(!clip.is_clip_list_changed());
    }

    #[test]
    fn initialize_fails() {
        assert_eq!(clipper().initialize(), Err(DdError::AlreadyInitialized));
    }
}
