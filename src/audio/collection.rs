//! Snapshot of enumerated endpoints.

use super::device::Device;
use super::enumerator::DeviceEnumerator;
use super::model::{DataFlow, StateMask};
use crate::backend::{Backend, NativeCollection};
use crate::error::AudioError;
use crate::util::{Adapter, ComPtr, Cursor, IndexedSource, InterfaceWrapper, Iter, OrderedSource, Outcome, Status};
use tracing::debug;

/// Endpoints returned by one enumeration (`IMMDeviceCollection`).
///
/// The collection is a frozen snapshot: the element count is read once when
/// the collection is built and is never refreshed. Devices installed or
/// removed afterwards only show up after [`DeviceCollection::update`].
pub struct DeviceCollection<B: Backend> {
    inner: InterfaceWrapper<B::Collection>,
    count: u32,
}

impl<B: Backend> DeviceCollection<B> {
    pub const fn null() -> Self {
        Self {
            inner: InterfaceWrapper::null(),
            count: 0,
        }
    }

    /// Wrap a native collection, reading its element count.
    pub fn from_native(raw: B::Collection) -> Result<Self, AudioError> {
        Self::make(Some(raw)).into_result()
    }

    /// Wrap a native collection, reporting a failed count read in the status.
    /// `None` yields an empty collection with `S_OK`.
    pub fn make(raw: Option<B::Collection>) -> Outcome<Self> {
        let Some(raw) = raw else {
            return Outcome::ok(Self::null());
        };
        let (status, count) = match raw.count() {
            Ok(count) => (Status::OK, count),
            Err(status) => (status, 0),
        };
        debug!(%status, count, "device collection snapshot");
        Outcome::new(
            status,
            Self {
                inner: InterfaceWrapper::new(raw),
                count,
            },
        )
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Device at `index`, or the null device if it cannot be fetched.
    pub fn get(&self, index: usize) -> Device<B> {
        self.at_outcome(index).into_unchecked()
    }

    /// Device at `index`.
    pub fn at(&self, index: usize) -> Result<Device<B>, AudioError> {
        if self.inner.is_present() && index >= self.len() {
            return Err(AudioError::OutOfRange {
                index,
                len: self.len(),
            });
        }
        self.at_outcome(index).into_result()
    }

    /// Device at `index`. Out-of-range indices and empty collections report
    /// `E_INVALIDARG` with the null device.
    pub fn at_outcome(&self, index: usize) -> Outcome<Device<B>> {
        let collection = match self.inner.native() {
            Ok(collection) if index < self.len() => collection,
            Ok(_) => return Outcome::new(Status::INVALID_ARG, Device::null()),
            Err(status) => return Outcome::new(status, Device::null()),
        };
        Device::from_lookup(collection.item(index as u32))
    }

    /// Cursor at the first device.
    pub fn begin(&self) -> Cursor<'_, Self> {
        Cursor::new(self, 0)
    }

    /// Cursor one past the last device.
    pub fn end(&self) -> Cursor<'_, Self> {
        Cursor::new(self, self.len())
    }

    /// Every device in enumeration order, each with the status of fetching it.
    pub fn iter(&self) -> Iter<'_, Self> {
        Iter::new(self)
    }

    /// Fetch every device, failing on the first error.
    pub fn to_vec(&self) -> Result<Vec<Device<B>>, AudioError> {
        let mut devices = Vec::with_capacity(self.len());
        self.append_to_outcome(&mut devices).into_result()?;
        Ok(devices)
    }

    /// Append every device to `devices`. Stops at the first failure; the value
    /// is the number of devices appended.
    pub fn append_to_outcome(&self, devices: &mut Vec<Device<B>>) -> Outcome<u32> {
        devices.reserve(self.len());
        self.extend_into_outcome(devices)
    }

    /// Feed every device into `out`, returning how many were written.
    pub fn extend_into<E: Extend<Device<B>>>(&self, out: &mut E) -> Result<u32, AudioError> {
        self.extend_into_outcome(out).into_result()
    }

    pub fn extend_into_outcome<E: Extend<Device<B>>>(&self, out: &mut E) -> Outcome<u32> {
        for index in 0..self.count {
            let (status, device) = self.at_outcome(index as usize).into_parts();
            if status.is_failure() {
                return Outcome::new(status, index);
            }
            out.extend(std::iter::once(device));
        }
        Outcome::ok(self.count)
    }

    /// Write devices into `out` from the front. Running out of room before the
    /// end of the collection is an error.
    pub fn fill_slice(&self, out: &mut [Device<B>]) -> Result<u32, AudioError> {
        self.fill_slice_outcome(out).into_result()
    }

    /// Write devices into `out` from the front. Running out of room reports
    /// `E_INVALIDARG` with the number written so far.
    pub fn fill_slice_outcome(&self, out: &mut [Device<B>]) -> Outcome<u32> {
        let mut slots = out.iter_mut();
        for index in 0..self.count {
            let Some(slot) = slots.next() else {
                return Outcome::new(Status::INVALID_ARG, index);
            };
            let (status, device) = self.at_outcome(index as usize).into_parts();
            if status.is_failure() {
                return Outcome::new(status, index);
            }
            *slot = device;
        }
        Outcome::ok(self.count)
    }

    /// Re-enumerate and replace this snapshot. On failure the snapshot is kept.
    pub fn update(
        &mut self,
        enumerator: &DeviceEnumerator<B>,
        flow: DataFlow,
        mask: StateMask,
    ) -> Result<(), AudioError> {
        *self = enumerator.enum_audio_endpoints(flow, mask)?;
        Ok(())
    }

    pub fn update_outcome(
        &mut self,
        enumerator: &DeviceEnumerator<B>,
        flow: DataFlow,
        mask: StateMask,
    ) -> Status {
        let (status, fresh) = enumerator.enum_audio_endpoints_outcome(flow, mask).into_parts();
        if status.is_success() {
            *self = fresh;
        }
        status
    }
}

impl<B: Backend> IndexedSource for DeviceCollection<B> {
    type Item = Device<B>;

    fn len(&self) -> usize {
        DeviceCollection::len(self)
    }

    fn null_item() -> Device<B> {
        Device::null()
    }

    fn item_outcome(&self, index: usize) -> Outcome<Device<B>> {
        self.at_outcome(index)
    }
}

impl<B: Backend> OrderedSource for DeviceCollection<B> {}

impl<'a, B: Backend> IntoIterator for &'a DeviceCollection<B> {
    type Item = Outcome<Device<B>>;
    type IntoIter = Iter<'a, DeviceCollection<B>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<B: Backend> Adapter for DeviceCollection<B> {
    type Raw = B::Collection;

    fn wrapper(&self) -> &InterfaceWrapper<B::Collection> {
        &self.inner
    }

    fn wrapper_mut(&mut self) -> &mut InterfaceWrapper<B::Collection> {
        &mut self.inner
    }

    /// Releasing also empties the snapshot.
    fn release(&mut self) -> ComPtr<B::Collection> {
        self.count = 0;
        self.inner.release()
    }
}

impl<B: Backend> Default for DeviceCollection<B> {
    fn default() -> Self {
        Self::null()
    }
}

impl<B: Backend> std::fmt::Debug for DeviceCollection<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCollection")
            .field("inner", &self.inner)
            .field("count", &self.count)
            .finish()
    }
}
