//! Reference-counted palette object.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use openblit_common::{DdError, DdResult};
use openblit_raster::{PaletteEntry, PaletteTable};

use crate::caps::PaletteCaps;
use crate::guid::{Guid, IID_IDIRECTDRAWPALETTE, IID_IUNKNOWN};
use crate::iface::RefCount;
use crate::OuterUnknown;

pub struct PaletteObject {
    self_ref: std::sync::Weak<PaletteObject>,
    refs: RefCount,
    caps: PaletteCaps,
    table: Mutex<PaletteTable>,
}

impl PaletteObject {
    pub(crate) fn create(
        caps: PaletteCaps,
        entries: Option<&[PaletteEntry]>,
        outer: Option<&OuterUnknown>,
    ) -> DdResult<Arc<PaletteObject>> {
        if outer.is_some() {
            warn!("palette creation with aggregation requested");
            return Err(DdError::NoAggregation);
        }

        let mut table = PaletteTable::grayscale();
        if let Some(entries) = entries {
            let count = entries.len().min(caps.entry_count());
            table.set_entries(0, &entries[..count])?;
        }

        debug!(caps = caps.bits(), "palette created");
        Ok(Arc::new_cyclic(|self_ref| PaletteObject {
            self_ref: self_ref.clone(),
            refs: RefCount::new(),
            caps,
            table: Mutex::new(table),
        }))
    }

    pub fn query_interface(&self, iid: &Guid) -> DdResult<Arc<PaletteObject>> {
        if *iid == IID_IUNKNOWN || *iid == IID_IDIRECTDRAWPALETTE {
            let this = self
                .self_ref
                .upgrade()
                .ok_or_else(|| DdError::generic("palette detached"))?;
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
            debug!("palette destroyed");
        }
        remaining
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.count()
    }

    pub fn get_caps(&self) -> PaletteCaps {
        self.caps
    }

    pub fn set_entries(&self, start: usize, entries: &[PaletteEntry]) -> DdResult<()> {
        self.table.lock().unwrap().set_entries(start, entries)
    }

    pub fn get_entries(&self, start: usize, out: &mut [PaletteEntry]) -> DdResult<usize> {
        self.table.lock().unwrap().get_entries(start, out)
    }

    /// Creation is the initialization in this implementation.
    pub fn initialize(&self) -> DdResult<()> {
        Err(DdError::AlreadyInitialized)
    }

    pub(crate) fn table(&self) -> MutexGuard<'_, PaletteTable> {
        self.table.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_with_initial_entries() {
        let entries = [PaletteEntry::rgb(1, 2, 3); 4];
        let pal =
            PaletteObject::create(PaletteCaps::EIGHT_BIT, Some(&entries), None).unwrap();
        let mut out = [PaletteEntry::default(); 1];
        pal.get_entries(3, &mut out).unwrap();
        assert_eq!(out[0], PaletteEntry::rgb(1, 2, 3));
        // Beyond the initial run, the grayscale ramp remains.
        pal.get_entries(200, &mut out).unwrap();
        assert_eq!(out[0], PaletteEntry::rgb(200, 200, 200));
    }

    #[test]
    fn aggregation_rejected() {
        assert!(matches!(
            PaletteObject::create(PaletteCaps::EIGHT_BIT, None, Some(&OuterUnknown)),
            Err(DdError::NoAggregation)
        ));
    }

    #[test]
    fn query_interface_identity() {
        let pal = PaletteObject::create(PaletteCaps::EIGHT_BIT, None, None).unwrap();
        assert_eq!(pal.ref_count(), 1);

        let same = pal.query_interface(&IID_IDIRECTDRAWPALETTE).unwrap();
        assert!(Arc::ptr_eq(&pal, &same));
        assert_eq!(pal.ref_count(), 2);

        assert!(matches!(
            pal.query_interface(&crate::guid::IID_IDIRECTDRAWCLIPPER),
            Err(DdError::NoInterface)
        ));
        assert_eq!(pal.ref_count(), 2);
    }

    #[test]
    fn initialize_fails() {
        let pal = PaletteObject::create(PaletteCaps::EIGHT_BIT, None, None).unwrap();
        assert_eq!(pal.initialize(), Err(DdError::AlreadyInitialized));
    }

    #[test]
    fn changes_raise_table_flag() {
        let pal = PaletteObject::create(PaletteCaps::EIGHT_BIT, None, None).unwrap();
        pal.set_entries(0, &[PaletteEntry::rgb(7, 7, 7)]).unwrap();
        assert!(pal.table().changed());
    }
}
