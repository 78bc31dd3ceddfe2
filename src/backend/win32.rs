//! Windows backend: forwards every native call to the MMDevice API.

use super::{Backend, NativeCollection, NativeDevice, NativeEndpointVolume, NativeEnumerator, NativeResult};
use crate::audio::model::{Apartment, DataFlow, DeviceRole, DeviceState, EventContext, StateMask};
use crate::util::{ComInterface, Status, TaskAllocator, TaskMem};
use std::ffi::c_void;
use std::ptr;
use windows::core::{Interface, GUID, PCWSTR};
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::Endpoints::{IAudioEndpointVolume, IAudioEndpointVolumeCallback};
use windows::Win32::Media::Audio::{
    eAll, eCapture, eCommunications, eConsole, eMultimedia, eRender, EDataFlow, ERole, IMMDevice,
    IMMDeviceCollection, IMMDeviceEnumerator, IMMNotificationClient, MMDeviceEnumerator, DEVICE_STATE,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_ALL, COINIT_APARTMENTTHREADED,
    COINIT_MULTITHREADED, STGM,
};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

/// The real Windows Core Audio backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32;

/// `CoTaskMemFree`
pub struct CoTaskMem;

unsafe impl TaskAllocator for CoTaskMem {
    unsafe fn free(ptr: *mut c_void) {
        CoTaskMemFree(Some(ptr as *const c_void));
    }
}

fn status(err: windows::core::Error) -> Status {
    Status::from(err)
}

fn event_context(context: &EventContext) -> GUID {
    GUID::from_u128(context.as_u128())
}

fn data_flow(flow: DataFlow) -> EDataFlow {
    match flow {
        DataFlow::Render => eRender,
        DataFlow::Capture => eCapture,
        DataFlow::All => eAll,
    }
}

fn role(role: DeviceRole) -> ERole {
    match role {
        DeviceRole::Console => eConsole,
        DeviceRole::Multimedia => eMultimedia,
        DeviceRole::Communications => eCommunications,
    }
}

impl Backend for Win32 {
    type Enumerator = IMMDeviceEnumerator;
    type Collection = IMMDeviceCollection;
    type Device = IMMDevice;
    type EndpointVolume = IAudioEndpointVolume;
    type NotificationClient = IMMNotificationClient;
    type VolumeCallback = IAudioEndpointVolumeCallback;

    fn initialize(apartment: Apartment) -> Status {
        let model = match apartment {
            Apartment::SingleThreaded => COINIT_APARTMENTTHREADED,
            Apartment::MultiThreaded => COINIT_MULTITHREADED,
        };
        unsafe { Status::from(CoInitializeEx(None, model)) }
    }

    fn uninitialize() {
        unsafe { CoUninitialize() }
    }

    fn create_enumerator() -> NativeResult<IMMDeviceEnumerator> {
        unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(status) }
    }
}

impl ComInterface for IMMDeviceEnumerator {
    fn as_raw(&self) -> *mut c_void {
        Interface::as_raw(self)
    }
}

impl ComInterface for IMMDeviceCollection {
    fn as_raw(&self) -> *mut c_void {
        Interface::as_raw(self)
    }
}

impl ComInterface for IMMDevice {
    fn as_raw(&self) -> *mut c_void {
        Interface::as_raw(self)
    }
}

impl ComInterface for IAudioEndpointVolume {
    fn as_raw(&self) -> *mut c_void {
        Interface::as_raw(self)
    }
}

impl ComInterface for IMMNotificationClient {
    fn as_raw(&self) -> *mut c_void {
        Interface::as_raw(self)
    }
}

impl ComInterface for IAudioEndpointVolumeCallback {
    fn as_raw(&self) -> *mut c_void {
        Interface::as_raw(self)
    }
}

impl NativeEnumerator<Win32> for IMMDeviceEnumerator {
    fn enum_audio_endpoints(&self, flow: DataFlow, mask: StateMask) -> NativeResult<IMMDeviceCollection> {
        unsafe {
            self.EnumAudioEndpoints(data_flow(flow), DEVICE_STATE(mask.0))
                .map_err(status)
        }
    }

    fn default_audio_endpoint(&self, flow: DataFlow, device_role: DeviceRole) -> NativeResult<IMMDevice> {
        unsafe {
            self.GetDefaultAudioEndpoint(data_flow(flow), role(device_role))
                .map_err(status)
        }
    }

    fn device(&self, id: &str) -> NativeResult<IMMDevice> {
        let id_wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            self.GetDevice(PCWSTR::from_raw(id_wide.as_ptr()))
                .map_err(status)
        }
    }

    fn register_endpoint_notification_callback(&self, client: &IMMNotificationClient) -> NativeResult<()> {
        unsafe { self.RegisterEndpointNotificationCallback(client).map_err(status) }
    }

    fn unregister_endpoint_notification_callback(&self, client: &IMMNotificationClient) -> NativeResult<()> {
        unsafe { self.UnregisterEndpointNotificationCallback(client).map_err(status) }
    }
}

impl NativeCollection<Win32> for IMMDeviceCollection {
    fn count(&self) -> NativeResult<u32> {
        unsafe { self.GetCount().map_err(status) }
    }

    fn item(&self, index: u32) -> NativeResult<IMMDevice> {
        unsafe { self.Item(index).map_err(status) }
    }
}

impl NativeDevice<Win32> for IMMDevice {
    fn id(&self) -> NativeResult<String> {
        unsafe {
            let raw = self.GetId().map_err(status)?;
            let id = TaskMem::<u16, CoTaskMem>::from_raw(raw.0);
            Ok(id.to_string_lossy())
        }
    }

    fn state(&self) -> NativeResult<DeviceState> {
        unsafe {
            let state = self.GetState().map_err(status)?;
            Ok(DeviceState::from_bits(state.0))
        }
    }

    fn friendly_name(&self) -> NativeResult<String> {
        unsafe {
            let props: IPropertyStore = self.OpenPropertyStore(STGM(0)).map_err(status)?;

            // DEVPROPKEY and PROPERTYKEY share a layout
            let key = PROPERTYKEY {
                fmtid: DEVPKEY_Device_FriendlyName.fmtid,
                pid: DEVPKEY_Device_FriendlyName.pid,
            };
            let prop = props.GetValue(&key).map_err(status)?;
            Ok(prop.to_string())
        }
    }

    fn activate_endpoint_volume(&self) -> NativeResult<IAudioEndpointVolume> {
        unsafe { self.Activate(CLSCTX_ALL, None).map_err(status) }
    }
}

impl NativeEndpointVolume<Win32> for IAudioEndpointVolume {
    fn channel_count(&self) -> NativeResult<u32> {
        unsafe { self.GetChannelCount().map_err(status) }
    }

    fn channel_volume_level_db(&self, channel: u32) -> NativeResult<f32> {
        unsafe { self.GetChannelVolumeLevel(channel).map_err(status) }
    }

    fn channel_volume_level_scalar(&self, channel: u32) -> NativeResult<f32> {
        unsafe { self.GetChannelVolumeLevelScalar(channel).map_err(status) }
    }

    fn master_volume_level_db(&self) -> NativeResult<f32> {
        unsafe { self.GetMasterVolumeLevel().map_err(status) }
    }

    fn master_volume_level_scalar(&self) -> NativeResult<f32> {
        unsafe { self.GetMasterVolumeLevelScalar().map_err(status) }
    }

    fn mute(&self) -> NativeResult<bool> {
        unsafe { self.GetMute().map(|muted| muted.as_bool()).map_err(status) }
    }

    fn volume_range(&self) -> NativeResult<(f32, f32, f32)> {
        let (mut min_db, mut max_db, mut increment_db) = (0.0, 0.0, 0.0);
        unsafe {
            self.GetVolumeRange(&mut min_db, &mut max_db, &mut increment_db)
                .map_err(status)?;
        }
        Ok((min_db, max_db, increment_db))
    }

    fn volume_step_info(&self, step: Option<&mut u32>, step_count: Option<&mut u32>) -> NativeResult<()> {
        let step = step.map_or(ptr::null_mut(), |s| s as *mut u32);
        let step_count = step_count.map_or(ptr::null_mut(), |c| c as *mut u32);
        unsafe { self.GetVolumeStepInfo(step, step_count).map_err(status) }
    }

    fn query_hardware_support(&self) -> NativeResult<u32> {
        unsafe { self.QueryHardwareSupport().map_err(status) }
    }

    fn set_channel_volume_level_db(&self, channel: u32, level_db: f32, context: &EventContext) -> NativeResult<()> {
        let guid = event_context(context);
        unsafe {
            self.SetChannelVolumeLevel(channel, level_db, &guid)
                .map_err(status)
        }
    }

    fn set_channel_volume_level_scalar(&self, channel: u32, level: f32, context: &EventContext) -> NativeResult<()> {
        let guid = event_context(context);
        unsafe {
            self.SetChannelVolumeLevelScalar(channel, level, &guid)
                .map_err(status)
        }
    }

    fn set_master_volume_level_db(&self, level_db: f32, context: &EventContext) -> NativeResult<()> {
        let guid = event_context(context);
        unsafe { self.SetMasterVolumeLevel(level_db, &guid).map_err(status) }
    }

    fn set_master_volume_level_scalar(&self, level: f32, context: &EventContext) -> NativeResult<()> {
        let guid = event_context(context);
        unsafe { self.SetMasterVolumeLevelScalar(level, &guid).map_err(status) }
    }

    fn set_mute(&self, mute: bool, context: &EventContext) -> NativeResult<()> {
        let guid = event_context(context);
        unsafe { self.SetMute(mute, &guid).map_err(status) }
    }

    fn volume_step_up(&self, context: &EventContext) -> NativeResult<()> {
        let guid = event_context(context);
        unsafe { self.VolumeStepUp(&guid).map_err(status) }
    }

    fn volume_step_down(&self, context: &EventContext) -> NativeResult<()> {
        let guid = event_context(context);
        unsafe { self.VolumeStepDown(&guid).map_err(status) }
    }

    fn register_control_change_notify(&self, callback: &IAudioEndpointVolumeCallback) -> NativeResult<()> {
        unsafe { self.RegisterControlChangeNotify(callback).map_err(status) }
    }

    fn unregister_control_change_notify(&self, callback: &IAudioEndpointVolumeCallback) -> NativeResult<()> {
        unsafe { self.UnregisterControlChangeNotify(callback).map_err(status) }
    }
}
