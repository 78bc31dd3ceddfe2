//! Audio endpoint device.

use super::model::DeviceState;
use super::volume::EndpointVolume;
use crate::backend::{Backend, NativeDevice};
use crate::error::AudioError;
use crate::util::{Adapter, ComPtr, InterfaceWrapper, Outcome, Status};

/// An audio endpoint (`IMMDevice`), or the null device.
///
/// Lookups that find nothing hand back the null device instead of failing.
pub struct Device<B: Backend> {
    inner: InterfaceWrapper<B::Device>,
}

impl<B: Backend> Device<B> {
    pub const fn null() -> Self {
        Self {
            inner: InterfaceWrapper::null(),
        }
    }

    /// Wrap a device reference the caller owns.
    pub fn from_native(raw: B::Device) -> Self {
        Self {
            inner: InterfaceWrapper::new(raw),
        }
    }

    /// Endpoint ID string.
    pub fn id(&self) -> Result<String, AudioError> {
        self.id_outcome().into_result()
    }

    pub fn id_outcome(&self) -> Outcome<String> {
        match self.inner.native().and_then(|device| device.id()) {
            Ok(id) => Outcome::ok(id),
            Err(status) => Outcome::new(status, String::new()),
        }
    }

    /// Current state (active, disabled, not present, unplugged).
    pub fn state(&self) -> Result<DeviceState, AudioError> {
        self.state_outcome().into_result()
    }

    pub fn state_outcome(&self) -> Outcome<DeviceState> {
        match self.inner.native().and_then(|device| device.state()) {
            Ok(state) => Outcome::ok(state),
            Err(status) => Outcome::new(status, DeviceState::NotPresent),
        }
    }

    /// Human-readable device name from the property store.
    pub fn friendly_name(&self) -> Result<String, AudioError> {
        self.friendly_name_outcome().into_result()
    }

    pub fn friendly_name_outcome(&self) -> Outcome<String> {
        match self.inner.native().and_then(|device| device.friendly_name()) {
            Ok(name) => Outcome::ok(name),
            Err(status) => Outcome::new(status, String::new()),
        }
    }

    /// Activate the endpoint volume control of this device.
    pub fn activate_endpoint_volume(&self) -> Result<EndpointVolume<B>, AudioError> {
        self.activate_endpoint_volume_outcome().into_result()
    }

    pub fn activate_endpoint_volume_outcome(&self) -> Outcome<EndpointVolume<B>> {
        match self
            .inner
            .native()
            .and_then(|device| device.activate_endpoint_volume())
        {
            Ok(volume) => Outcome::ok(EndpointVolume::from_native(volume)),
            Err(status) => Outcome::new(status, EndpointVolume::null()),
        }
    }

    /// Outcome of a lookup: `Ok` wraps the device, `Err` yields the null device.
    pub(crate) fn from_lookup(result: Result<B::Device, Status>) -> Outcome<Self> {
        match result {
            Ok(raw) => Outcome::ok(Self::from_native(raw)),
            Err(status) => Outcome::new(status, Self::null()),
        }
    }
}

impl<B: Backend> Adapter for Device<B> {
    type Raw = B::Device;

    fn wrapper(&self) -> &InterfaceWrapper<B::Device> {
        &self.inner
    }

    fn wrapper_mut(&mut self) -> &mut InterfaceWrapper<B::Device> {
        &mut self.inner
    }
}

impl<B: Backend> Default for Device<B> {
    fn default() -> Self {
        Self::null()
    }
}

impl<B: Backend> From<ComPtr<B::Device>> for Device<B> {
    fn from(ptr: ComPtr<B::Device>) -> Self {
        Self { inner: ptr.into() }
    }
}

impl<B: Backend> std::fmt::Debug for Device<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Device").field(&self.inner).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::model::{DataFlow, DeviceRole};
    use crate::backend::mock::{MockBackend, MockDeviceSpec, MockSystem};
    use crate::backend::NativeEnumerator;

    type MockDevice = Device<MockBackend>;

    #[test]
    fn test_null_device_rejects_every_call() {
        let system = MockSystem::install();
        let device = MockDevice::null();
        assert!(device.is_null());
        assert_eq!(device.id_outcome().status(), Status::INVALID_ARG);
        assert_eq!(device.state_outcome().status(), Status::INVALID_ARG);
        assert_eq!(device.friendly_name_outcome().status(), Status::INVALID_ARG);
        let volume = device.activate_endpoint_volume_outcome();
        assert_eq!(volume.status(), Status::INVALID_ARG);
        assert!(volume.get_unchecked().is_null());
        assert_eq!(device.id(), Err(AudioError::Com(Status::INVALID_ARG)));
        assert_eq!(system.native_calls(), 0);
    }

    #[test]
    fn test_device_properties() {
        let system = MockSystem::install();
        system.add_device(MockDeviceSpec::capture("{mic-1}", "Desk Microphone"));
        let _ctx = system.context();

        let enumerator = MockBackend::create_enumerator().unwrap();
        let device = MockDevice::from_native(
            enumerator
                .default_audio_endpoint(DataFlow::Capture, DeviceRole::Console)
                .unwrap(),
        );
        assert!(device.is_present());
        assert_eq!(device.id().unwrap(), "{mic-1}");
        assert_eq!(device.state().unwrap(), DeviceState::Active);
        assert_eq!(device.friendly_name().unwrap(), "Desk Microphone");

        let volume = device.activate_endpoint_volume().unwrap();
        assert!(volume.is_present());
    }

    #[test]
    fn test_device_released_once() {
        let system = MockSystem::install();
        system.add_device(MockDeviceSpec::render("{spk-1}", "Speakers"));
        let _ctx = system.context();
        let enumerator = MockBackend::create_enumerator().unwrap();

        let before = system.references();
        let mut device = MockDevice::from_native(enumerator.device("{spk-1}").unwrap());
        assert_eq!(system.references().live(), before.live() + 1);

        let raw = device.release();
        assert!(device.is_null());
        drop(device);
        assert_eq!(system.references().live(), before.live() + 1);

        let device = MockDevice::from(raw);
        drop(device);
        let after = system.references();
        assert_eq!(after.live(), before.live());
        assert_eq!(after.released, before.released + 1);
    }

    #[test]
    fn test_calls_without_initialization_fail() {
        let system = MockSystem::install();
        system.add_device(MockDeviceSpec::capture("{mic-1}", "Mic"));
        let ctx = system.context();
        let enumerator = MockBackend::create_enumerator().unwrap();
        let device = MockDevice::from_native(enumerator.device("{mic-1}").unwrap());
        drop(ctx);

        assert_eq!(device.id_outcome().status(), Status::NOT_INITIALIZED);
        assert_eq!(
            device.state(),
            Err(AudioError::Com(Status::NOT_INITIALIZED))
        );
    }
}
