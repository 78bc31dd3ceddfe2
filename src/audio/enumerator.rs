//! Device enumeration using the Windows MMDevice API.

use super::collection::DeviceCollection;
use super::context::ComContext;
use super::device::Device;
use super::model::{DataFlow, DeviceRole, StateMask};
use crate::backend::{Backend, NativeEnumerator};
use crate::error::AudioError;
use crate::util::{Adapter, ComPtr, InterfaceWrapper, Outcome, Status};
use tracing::debug;

/// Device enumerator (`IMMDeviceEnumerator`).
///
/// Creation borrows the [`ComContext`] as proof that COM is initialized on
/// this thread.
pub struct DeviceEnumerator<B: Backend> {
    inner: InterfaceWrapper<B::Enumerator>,
}

impl<B: Backend> DeviceEnumerator<B> {
    pub const fn null() -> Self {
        Self {
            inner: InterfaceWrapper::null(),
        }
    }

    pub fn from_native(raw: B::Enumerator) -> Self {
        Self {
            inner: InterfaceWrapper::new(raw),
        }
    }

    /// Create a new enumerator.
    pub fn new(context: &ComContext<B>) -> Result<Self, AudioError> {
        Self::make(context).into_result()
    }

    /// Create a new enumerator. On failure the value is the null enumerator.
    pub fn make(context: &ComContext<B>) -> Outcome<Self> {
        let (status, raw) = Self::make_raw(context).into_parts();
        match raw {
            Some(raw) => Outcome::new(status, Self::from_native(raw)),
            None => Outcome::new(status, Self::null()),
        }
    }

    /// Create the raw native enumerator without wrapping it.
    pub fn make_raw(_context: &ComContext<B>) -> Outcome<Option<B::Enumerator>> {
        match B::create_enumerator() {
            Ok(raw) => {
                debug!("device enumerator created");
                Outcome::ok(Some(raw))
            }
            Err(status) => {
                debug!(%status, "device enumerator creation failed");
                Outcome::new(status, None)
            }
        }
    }

    /// Endpoints matching `flow` whose state is in `mask`.
    pub fn enum_audio_endpoints(&self, flow: DataFlow, mask: StateMask) -> Result<DeviceCollection<B>, AudioError> {
        self.enum_audio_endpoints_outcome(flow, mask).into_result()
    }

    pub fn enum_audio_endpoints_outcome(&self, flow: DataFlow, mask: StateMask) -> Outcome<DeviceCollection<B>> {
        match self
            .inner
            .native()
            .and_then(|e| e.enum_audio_endpoints(flow, mask))
        {
            Ok(raw) => DeviceCollection::make(Some(raw)),
            Err(status) => Outcome::new(status, DeviceCollection::null()),
        }
    }

    /// Default endpoint for a flow and role. Having no default endpoint is
    /// not an error: the null device is returned.
    pub fn default_audio_endpoint(&self, flow: DataFlow, role: DeviceRole) -> Result<Device<B>, AudioError> {
        found_or_null(self.default_audio_endpoint_outcome(flow, role))
    }

    /// Default endpoint for a flow and role. `E_NOTFOUND` when there is none.
    pub fn default_audio_endpoint_outcome(&self, flow: DataFlow, role: DeviceRole) -> Outcome<Device<B>> {
        match self.inner.native() {
            Ok(enumerator) => Device::from_lookup(enumerator.default_audio_endpoint(flow, role)),
            Err(status) => Outcome::new(status, Device::null()),
        }
    }

    /// Endpoint by ID string. Unknown IDs yield the null device.
    pub fn device(&self, id: &str) -> Result<Device<B>, AudioError> {
        found_or_null(self.device_outcome(id))
    }

    /// Endpoint by ID string. `E_NOTFOUND` for unknown IDs.
    pub fn device_outcome(&self, id: &str) -> Outcome<Device<B>> {
        match self.inner.native() {
            Ok(enumerator) => Device::from_lookup(enumerator.device(id)),
            Err(status) => Outcome::new(status, Device::null()),
        }
    }

    /// Register a client for endpoint added, removed, state and default
    /// device changes. The caller keeps its own reference to `client`.
    pub fn register_endpoint_notification_callback(&self, client: &B::NotificationClient) -> Result<(), AudioError> {
        self.register_endpoint_notification_callback_outcome(client)
            .ok()
    }

    pub fn register_endpoint_notification_callback_outcome(&self, client: &B::NotificationClient) -> Status {
        let result = self
            .inner
            .native()
            .and_then(|e| e.register_endpoint_notification_callback(client));
        match result {
            Ok(()) => {
                debug!("endpoint notification client registered");
                Status::OK
            }
            Err(status) => status,
        }
    }

    pub fn unregister_endpoint_notification_callback(&self, client: &B::NotificationClient) -> Result<(), AudioError> {
        self.unregister_endpoint_notification_callback_outcome(client)
            .ok()
    }

    pub fn unregister_endpoint_notification_callback_outcome(&self, client: &B::NotificationClient) -> Status {
        let result = self
            .inner
            .native()
            .and_then(|e| e.unregister_endpoint_notification_callback(client));
        match result {
            Ok(()) => {
                debug!("endpoint notification client unregistered");
                Status::OK
            }
            Err(status) => status,
        }
    }
}

fn found_or_null<B: Backend>(outcome: Outcome<Device<B>>) -> Result<Device<B>, AudioError> {
    if outcome.status() == Status::NOT_FOUND {
        return Ok(Device::null());
    }
    outcome.into_result()
}

impl<B: Backend> Adapter for DeviceEnumerator<B> {
    type Raw = B::Enumerator;

    fn wrapper(&self) -> &InterfaceWrapper<B::Enumerator> {
        &self.inner
    }

    fn wrapper_mut(&mut self) -> &mut InterfaceWrapper<B::Enumerator> {
        &mut self.inner
    }
}

impl<B: Backend> Default for DeviceEnumerator<B> {
    fn default() -> Self {
        Self::null()
    }
}

impl<B: Backend> From<ComPtr<B::Enumerator>> for DeviceEnumerator<B> {
    fn from(ptr: ComPtr<B::Enumerator>) -> Self {
        Self { inner: ptr.into() }
    }
}

impl<B: Backend> std::fmt::Debug for DeviceEnumerator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DeviceEnumerator").field(&self.inner).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::model::DeviceState;
    use crate::backend::mock::{MockBackend, MockDeviceSpec, MockNotificationClient, MockSystem};

    type Enumerator = DeviceEnumerator<MockBackend>;

    #[test]
    fn test_creation_requires_initialization() {
        let _system = MockSystem::install();
        let adopted = ComContext::<MockBackend>::adopt();
        let attempt = Enumerator::make(&adopted);
        assert_eq!(attempt.status(), Status::NOT_INITIALIZED);
        assert!(attempt.get_unchecked().is_null());
        assert_eq!(
            Enumerator::new(&adopted).unwrap_err(),
            AudioError::Com(Status::NOT_INITIALIZED)
        );

        let raw = Enumerator::make_raw(&adopted);
        assert!(raw.get_unchecked().is_none());
    }

    #[test]
    fn test_enumerate_by_flow_and_state() {
        let system = MockSystem::install();
        system.add_device(MockDeviceSpec::capture("{mic-a}", "Headset"));
        system.add_device(MockDeviceSpec::capture("{mic-b}", "Webcam").with_state(DeviceState::Unplugged));
        system.add_device(MockDeviceSpec::render("{spk-a}", "Speakers"));
        let ctx = system.context();
        let enumerator = Enumerator::new(&ctx).unwrap();

        let all = enumerator
            .enum_audio_endpoints(DataFlow::All, StateMask::ALL)
            .unwrap();
        assert_eq!(all.len(), 3);

        let active_capture = enumerator
            .enum_audio_endpoints(DataFlow::Capture, StateMask::ACTIVE)
            .unwrap();
        assert_eq!(active_capture.len(), 1);
        assert_eq!(active_capture.get(0).id().unwrap(), "{mic-a}");

        let unplugged = enumerator
            .enum_audio_endpoints(DataFlow::Capture, StateMask::from(DeviceState::Unplugged))
            .unwrap();
        assert_eq!(unplugged.get(0).friendly_name().unwrap(), "Webcam");

        let none = enumerator
            .enum_audio_endpoints(DataFlow::Render, StateMask::DISABLED)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_missing_devices_are_not_errors() {
        let system = MockSystem::install();
        system.add_device(MockDeviceSpec::render("{spk-a}", "Speakers"));
        let ctx = system.context();
        let enumerator = Enumerator::new(&ctx).unwrap();

        let lookup = enumerator.device_outcome("{nope}");
        assert_eq!(lookup.status(), Status::NOT_FOUND);
        assert!(lookup.get_unchecked().is_null());
        assert!(enumerator.device("{nope}").unwrap().is_null());

        let default = enumerator.default_audio_endpoint_outcome(DataFlow::Capture, DeviceRole::Console);
        assert_eq!(default.status(), Status::NOT_FOUND);
        assert!(enumerator
            .default_audio_endpoint(DataFlow::Capture, DeviceRole::Communications)
            .unwrap()
            .is_null());

        let speakers = enumerator
            .default_audio_endpoint(DataFlow::Render, DeviceRole::Multimedia)
            .unwrap();
        assert_eq!(speakers.id().unwrap(), "{spk-a}");
        assert_eq!(enumerator.device("{spk-a}").unwrap().friendly_name().unwrap(), "Speakers");
    }

    #[test]
    fn test_other_lookup_failures_propagate() {
        let system = MockSystem::install();
        system.add_device(MockDeviceSpec::render("{spk-a}", "Speakers"));
        let ctx = system.context();
        let enumerator = Enumerator::new(&ctx).unwrap();
        drop(ctx);

        assert_eq!(
            enumerator.device("{spk-a}").unwrap_err(),
            AudioError::Com(Status::NOT_INITIALIZED)
        );
        assert_eq!(
            enumerator
                .enum_audio_endpoints_outcome(DataFlow::Render, StateMask::ALL)
                .status(),
            Status::NOT_INITIALIZED
        );
    }

    #[test]
    fn test_null_enumerator() {
        let system = MockSystem::install();
        let enumerator = Enumerator::null();
        assert_eq!(
            enumerator.device("{spk-a}").unwrap_err(),
            AudioError::Com(Status::INVALID_ARG)
        );
        let collection = enumerator.enum_audio_endpoints_outcome(DataFlow::All, StateMask::ALL);
        assert_eq!(collection.status(), Status::INVALID_ARG);
        assert!(collection.get_unchecked().is_null());

        let client = MockNotificationClient::new();
        assert_eq!(
            enumerator.register_endpoint_notification_callback_outcome(&client),
            Status::INVALID_ARG
        );
        assert_eq!(
            enumerator.unregister_endpoint_notification_callback(&client),
            Err(AudioError::Com(Status::INVALID_ARG))
        );
        assert_eq!(system.native_calls(), 0);
    }

    #[test]
    fn test_endpoint_notification_registration() {
        let system = MockSystem::install();
        let ctx = system.context();
        let enumerator = Enumerator::new(&ctx).unwrap();
        let headset = MockNotificationClient::new();
        let tray = MockNotificationClient::new();

        enumerator
            .register_endpoint_notification_callback(&headset)
            .unwrap();
        assert_eq!(
            enumerator.register_endpoint_notification_callback_outcome(&tray),
            Status::OK
        );
        assert_eq!(system.endpoint_callbacks(), 2);

        enumerator
            .unregister_endpoint_notification_callback(&headset)
            .unwrap();
        assert_eq!(
            enumerator.unregister_endpoint_notification_callback_outcome(&headset),
            Status::NOT_FOUND
        );
        assert_eq!(system.endpoint_callbacks(), 1);

        drop(ctx);
        assert_eq!(
            enumerator.unregister_endpoint_notification_callback(&tray),
            Err(AudioError::Com(Status::NOT_INITIALIZED))
        );
        assert_eq!(system.endpoint_callbacks(), 1);
    }

    #[test]
    fn test_enumerator_released_on_drop() {
        let system = MockSystem::install();
        let ctx = system.context();
        let before = system.references();
        let enumerator = Enumerator::new(&ctx).unwrap();
        assert_eq!(system.references().live(), before.live() + 1);
        drop(enumerator);
        assert_eq!(system.references().live(), before.live());
    }
}
