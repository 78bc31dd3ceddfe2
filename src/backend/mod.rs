//! Native collaborator contract.
//!
//! The adapters never call Windows directly; they go through these traits.
//! Each method mirrors one COM method and reports failure as the native
//! [`Status`]. [`win32`] forwards to the `windows` crate; [`mock`] is an
//! in-memory device system for tests.

use crate::audio::model::{Apartment, DataFlow, DeviceRole, DeviceState, EventContext, StateMask};
use crate::util::{ComInterface, Status};

#[cfg(any(test, feature = "mock"))]
pub mod mock;
#[cfg(windows)]
pub mod win32;

/// Result of a single native call.
pub type NativeResult<T> = Result<T, Status>;

/// A family of native interfaces plus the process-wide entry points.
pub trait Backend: Sized + 'static {
    type Enumerator: NativeEnumerator<Self>;
    type Collection: NativeCollection<Self>;
    type Device: NativeDevice<Self>;
    type EndpointVolume: NativeEndpointVolume<Self>;
    /// `IMMNotificationClient`
    type NotificationClient: ComInterface;
    /// `IAudioEndpointVolumeCallback`
    type VolumeCallback: ComInterface;

    /// `CoInitializeEx` for the calling thread.
    fn initialize(apartment: Apartment) -> Status;

    /// `CoUninitialize` for the calling thread.
    fn uninitialize();

    /// `CoCreateInstance(MMDeviceEnumerator)`.
    fn create_enumerator() -> NativeResult<Self::Enumerator>;
}

/// `IMMDeviceEnumerator`
pub trait NativeEnumerator<B: Backend>: ComInterface {
    fn enum_audio_endpoints(&self, flow: DataFlow, mask: StateMask) -> NativeResult<B::Collection>;

    fn default_audio_endpoint(&self, flow: DataFlow, role: DeviceRole) -> NativeResult<B::Device>;

    fn device(&self, id: &str) -> NativeResult<B::Device>;

    fn register_endpoint_notification_callback(&self, client: &B::NotificationClient) -> NativeResult<()>;

    fn unregister_endpoint_notification_callback(&self, client: &B::NotificationClient) -> NativeResult<()>;
}

/// `IMMDeviceCollection`
pub trait NativeCollection<B: Backend>: ComInterface {
    fn count(&self) -> NativeResult<u32>;

    fn item(&self, index: u32) -> NativeResult<B::Device>;
}

/// `IMMDevice`
pub trait NativeDevice<B: Backend>: ComInterface {
    fn id(&self) -> NativeResult<String>;

    fn state(&self) -> NativeResult<DeviceState>;

    /// `PKEY_Device_FriendlyName` from the device property store.
    fn friendly_name(&self) -> NativeResult<String>;

    /// `Activate(IAudioEndpointVolume)`
    fn activate_endpoint_volume(&self) -> NativeResult<B::EndpointVolume>;
}

/// `IAudioEndpointVolume`
pub trait NativeEndpointVolume<B: Backend>: ComInterface {
    fn channel_count(&self) -> NativeResult<u32>;

    fn channel_volume_level_db(&self, channel: u32) -> NativeResult<f32>;

    fn channel_volume_level_scalar(&self, channel: u32) -> NativeResult<f32>;

    fn master_volume_level_db(&self) -> NativeResult<f32>;

    fn master_volume_level_scalar(&self) -> NativeResult<f32>;

    fn mute(&self) -> NativeResult<bool>;

    /// `(min_db, max_db, increment_db)`
    fn volume_range(&self) -> NativeResult<(f32, f32, f32)>;

    /// `GetVolumeStepInfo`. Either slot may be omitted; only the requested
    /// values are written.
    fn volume_step_info(&self, step: Option<&mut u32>, step_count: Option<&mut u32>) -> NativeResult<()>;

    fn query_hardware_support(&self) -> NativeResult<u32>;

    fn set_channel_volume_level_db(&self, channel: u32, level_db: f32, context: &EventContext) -> NativeResult<()>;

    fn set_channel_volume_level_scalar(&self, channel: u32, level: f32, context: &EventContext) -> NativeResult<()>;

    fn set_master_volume_level_db(&self, level_db: f32, context: &EventContext) -> NativeResult<()>;

    fn set_master_volume_level_scalar(&self, level: f32, context: &EventContext) -> NativeResult<()>;

    fn set_mute(&self, mute: bool, context: &EventContext) -> NativeResult<()>;

    fn volume_step_up(&self, context: &EventContext) -> NativeResult<()>;

    fn volume_step_down(&self, context: &EventContext) -> NativeResult<()>;

    fn register_control_change_notify(&self, callback: &B::VolumeCallback) -> NativeResult<()>;

    fn unregister_control_change_notify(&self, callback: &B::VolumeCallback) -> NativeResult<()>;
}
