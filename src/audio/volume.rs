//! Volume control using IAudioEndpointVolume.
//!
//! Provides volume, mute and step control for audio endpoints.

use super::model::{EventContext, HardwareSupport, VolumeRange};
use crate::backend::{Backend, NativeEndpointVolume, NativeResult};
use crate::error::AudioError;
use crate::util::{Adapter, ComPtr, InterfaceWrapper, Outcome, Status};
use std::cell::Cell;
use tracing::trace;

/// Volume controller for a specific device.
///
/// The number of volume steps is a property of the hardware, so it is
/// fetched once and remembered: the cache is only dropped when the control
/// is released or rebuilt, never by volume changes. The cache is a plain
/// `Cell`, which keeps the control `!Sync`.
pub struct EndpointVolume<B: Backend> {
    inner: InterfaceWrapper<B::EndpointVolume>,
    step_count_cache: Cell<(Status, u32)>,
}

const EMPTY_STEP_CACHE: (Status, u32) = (Status::POINTER, 0);

/// Value-returning call: empty adapters fail with `E_INVALIDARG`, native
/// failures keep `fallback` as the value.
fn query<T>(result: NativeResult<T>, fallback: T) -> Outcome<T> {
    match result {
        Ok(value) => Outcome::ok(value),
        Err(status) => Outcome::new(status, fallback),
    }
}

fn command(result: NativeResult<()>) -> Status {
    match result {
        Ok(()) => Status::OK,
        Err(status) => status,
    }
}

impl<B: Backend> EndpointVolume<B> {
    pub const fn null() -> Self {
        Self {
            inner: InterfaceWrapper::null(),
            step_count_cache: Cell::new(EMPTY_STEP_CACHE),
        }
    }

    pub fn from_native(raw: B::EndpointVolume) -> Self {
        Self {
            inner: InterfaceWrapper::new(raw),
            step_count_cache: Cell::new(EMPTY_STEP_CACHE),
        }
    }

    /// Number of channels in the stream.
    pub fn channel_count(&self) -> Result<u32, AudioError> {
        self.channel_count_outcome().into_result()
    }

    pub fn channel_count_outcome(&self) -> Outcome<u32> {
        query(self.inner.native().and_then(|v| v.channel_count()), 0)
    }

    /// Volume of one channel in decibels.
    pub fn channel_volume_level_db(&self, channel: u32) -> Result<f32, AudioError> {
        self.channel_volume_level_db_outcome(channel).into_result()
    }

    pub fn channel_volume_level_db_outcome(&self, channel: u32) -> Outcome<f32> {
        query(
            self.inner
                .native()
                .and_then(|v| v.channel_volume_level_db(channel)),
            0.0,
        )
    }

    /// Volume of one channel (0.0 to 1.0).
    pub fn channel_volume_level_scalar(&self, channel: u32) -> Result<f32, AudioError> {
        self.channel_volume_level_scalar_outcome(channel).into_result()
    }

    pub fn channel_volume_level_scalar_outcome(&self, channel: u32) -> Outcome<f32> {
        query(
            self.inner
                .native()
                .and_then(|v| v.channel_volume_level_scalar(channel)),
            -1.0,
        )
    }

    /// Master volume in decibels.
    pub fn master_volume_level_db(&self) -> Result<f32, AudioError> {
        self.master_volume_level_db_outcome().into_result()
    }

    pub fn master_volume_level_db_outcome(&self) -> Outcome<f32> {
        query(self.inner.native().and_then(|v| v.master_volume_level_db()), 0.0)
    }

    /// Master volume (0.0 to 1.0).
    pub fn master_volume_level_scalar(&self) -> Result<f32, AudioError> {
        self.master_volume_level_scalar_outcome().into_result()
    }

    pub fn master_volume_level_scalar_outcome(&self) -> Outcome<f32> {
        query(
            self.inner
                .native()
                .and_then(|v| v.master_volume_level_scalar()),
            0.0,
        )
    }

    /// Get the current mute state.
    pub fn is_muted(&self) -> Result<bool, AudioError> {
        self.is_muted_outcome().into_result()
    }

    pub fn is_muted_outcome(&self) -> Outcome<bool> {
        query(self.inner.native().and_then(|v| v.mute()), false)
    }

    /// Volume range in decibels.
    pub fn volume_range(&self) -> Result<VolumeRange, AudioError> {
        self.volume_range_outcome().into_result()
    }

    pub fn volume_range_outcome(&self) -> Outcome<VolumeRange> {
        let result = self.inner.native().and_then(|v| v.volume_range());
        query(
            result.map(|(min_db, max_db, increment_db)| VolumeRange {
                min_db,
                max_db,
                increment_db,
            }),
            VolumeRange::default(),
        )
    }

    /// Current step in `[0, step_count)`.
    pub fn current_step_index(&self) -> Result<u32, AudioError> {
        self.current_step_index_outcome().into_result()
    }

    /// Current step. While the step count is not yet known it is fetched in
    /// the same native call and cached.
    pub fn current_step_index_outcome(&self) -> Outcome<u32> {
        let volume = match self.inner.native() {
            Ok(volume) => volume,
            Err(status) => return Outcome::new(status, 0),
        };
        let mut step = 0;
        let (cached_status, _) = self.step_count_cache.get();
        let status = if cached_status.is_failure() {
            let mut step_count = 0;
            let status = command(volume.volume_step_info(Some(&mut step), Some(&mut step_count)));
            self.step_count_cache.set((status, step_count));
            trace!(%status, step_count, "step count cached");
            status
        } else {
            command(volume.volume_step_info(Some(&mut step), None))
        };
        Outcome::new(status, step)
    }

    /// Number of volume steps. Answered from the cache once known.
    pub fn step_count(&self) -> Result<u32, AudioError> {
        self.step_count_outcome().into_result()
    }

    pub fn step_count_outcome(&self) -> Outcome<u32> {
        let volume = match self.inner.native() {
            Ok(volume) => volume,
            Err(status) => return Outcome::new(status, 0),
        };
        let (cached_status, _) = self.step_count_cache.get();
        if cached_status.is_failure() {
            let mut step_count = 0;
            let status = command(volume.volume_step_info(None, Some(&mut step_count)));
            self.step_count_cache.set((status, step_count));
            trace!(%status, step_count, "step count cached");
        }
        let (status, step_count) = self.step_count_cache.get();
        Outcome::new(status, step_count)
    }

    /// Which of volume, mute and metering the endpoint implements in hardware.
    pub fn query_hardware_support(&self) -> Result<HardwareSupport, AudioError> {
        self.query_hardware_support_outcome().into_result()
    }

    pub fn query_hardware_support_outcome(&self) -> Outcome<HardwareSupport> {
        query(
            self.inner
                .native()
                .and_then(|v| v.query_hardware_support())
                .map(HardwareSupport),
            HardwareSupport::default(),
        )
    }

    pub fn set_channel_volume_level_db(
        &self,
        channel: u32,
        level_db: f32,
        context: EventContext,
    ) -> Result<(), AudioError> {
        self.set_channel_volume_level_db_outcome(channel, level_db, context)
            .ok()
    }

    pub fn set_channel_volume_level_db_outcome(
        &self,
        channel: u32,
        level_db: f32,
        context: EventContext,
    ) -> Status {
        command(
            self.inner
                .native()
                .and_then(|v| v.set_channel_volume_level_db(channel, level_db, &context)),
        )
    }

    /// Set one channel's volume (clamped to 0.0 to 1.0).
    pub fn set_channel_volume_level_scalar(
        &self,
        channel: u32,
        level: f32,
        context: EventContext,
    ) -> Result<(), AudioError> {
        self.set_channel_volume_level_scalar_outcome(channel, level, context)
            .ok()
    }

    pub fn set_channel_volume_level_scalar_outcome(
        &self,
        channel: u32,
        level: f32,
        context: EventContext,
    ) -> Status {
        let level = level.clamp(0.0, 1.0);
        command(
            self.inner
                .native()
                .and_then(|v| v.set_channel_volume_level_scalar(channel, level, &context)),
        )
    }

    pub fn set_master_volume_level_db(&self, level_db: f32, context: EventContext) -> Result<(), AudioError> {
        self.set_master_volume_level_db_outcome(level_db, context).ok()
    }

    pub fn set_master_volume_level_db_outcome(&self, level_db: f32, context: EventContext) -> Status {
        command(
            self.inner
                .native()
                .and_then(|v| v.set_master_volume_level_db(level_db, &context)),
        )
    }

    /// Set the master volume (clamped to 0.0 to 1.0).
    pub fn set_master_volume_level_scalar(&self, level: f32, context: EventContext) -> Result<(), AudioError> {
        self.set_master_volume_level_scalar_outcome(level, context).ok()
    }

    pub fn set_master_volume_level_scalar_outcome(&self, level: f32, context: EventContext) -> Status {
        let level = level.clamp(0.0, 1.0);
        command(
            self.inner
                .native()
                .and_then(|v| v.set_master_volume_level_scalar(level, &context)),
        )
    }

    /// Set the mute state.
    pub fn set_mute(&self, mute: bool, context: EventContext) -> Result<(), AudioError> {
        self.set_mute_outcome(mute, context).ok()
    }

    pub fn set_mute_outcome(&self, mute: bool, context: EventContext) -> Status {
        command(self.inner.native().and_then(|v| v.set_mute(mute, &context)))
    }

    /// Toggle the mute state. Returns the new state.
    pub fn toggle_mute(&self, context: EventContext) -> Result<bool, AudioError> {
        let new_state = !self.is_muted()?;
        self.set_mute(new_state, context)?;
        Ok(new_state)
    }

    /// Toggle the mute state. On failure the value is the unchanged state.
    pub fn toggle_mute_outcome(&self, context: EventContext) -> Outcome<bool> {
        let current = self.is_muted_outcome();
        if !current.has_value() {
            return current;
        }
        let (_, muted) = current.into_parts();
        let status = self.set_mute_outcome(!muted, context);
        if status.is_failure() {
            Outcome::new(status, muted)
        } else {
            Outcome::new(status, !muted)
        }
    }

    pub fn volume_step_up(&self, context: EventContext) -> Result<(), AudioError> {
        self.volume_step_up_outcome(context).ok()
    }

    pub fn volume_step_up_outcome(&self, context: EventContext) -> Status {
        command(self.inner.native().and_then(|v| v.volume_step_up(&context)))
    }

    pub fn volume_step_down(&self, context: EventContext) -> Result<(), AudioError> {
        self.volume_step_down_outcome(context).ok()
    }

    pub fn volume_step_down_outcome(&self, context: EventContext) -> Status {
        command(self.inner.native().and_then(|v| v.volume_step_down(&context)))
    }

    /// Register a callback for volume and mute changes on this endpoint.
    /// The callback stays registered until unregistered or the endpoint goes
    /// away; the caller keeps its own reference alive.
    pub fn register_control_change_notify(&self, callback: &B::VolumeCallback) -> Result<(), AudioError> {
        self.register_control_change_notify_outcome(callback).ok()
    }

    pub fn register_control_change_notify_outcome(&self, callback: &B::VolumeCallback) -> Status {
        command(
            self.inner
                .native()
                .and_then(|v| v.register_control_change_notify(callback)),
        )
    }

    pub fn unregister_control_change_notify(&self, callback: &B::VolumeCallback) -> Result<(), AudioError> {
        self.unregister_control_change_notify_outcome(callback).ok()
    }

    pub fn unregister_control_change_notify_outcome(&self, callback: &B::VolumeCallback) -> Status {
        command(
            self.inner
                .native()
                .and_then(|v| v.unregister_control_change_notify(callback)),
        )
    }
}

impl<B: Backend> Adapter for EndpointVolume<B> {
    type Raw = B::EndpointVolume;

    fn wrapper(&self) -> &InterfaceWrapper<B::EndpointVolume> {
        &self.inner
    }

    fn wrapper_mut(&mut self) -> &mut InterfaceWrapper<B::EndpointVolume> {
        &mut self.inner
    }

    /// Releasing also forgets the cached step count.
    fn release(&mut self) -> ComPtr<B::EndpointVolume> {
        self.step_count_cache.set(EMPTY_STEP_CACHE);
        self.inner.release()
    }
}

impl<B: Backend> Default for EndpointVolume<B> {
    fn default() -> Self {
        Self::null()
    }
}

impl<B: Backend> From<ComPtr<B::EndpointVolume>> for EndpointVolume<B> {
    fn from(ptr: ComPtr<B::EndpointVolume>) -> Self {
        Self {
            inner: ptr.into(),
            step_count_cache: Cell::new(EMPTY_STEP_CACHE),
        }
    }
}

impl<B: Backend> std::fmt::Debug for EndpointVolume<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointVolume")
            .field("inner", &self.inner)
            .field("step_count_cache", &self.step_count_cache.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::Device;
    use crate::backend::mock::{MockBackend, MockDeviceSpec, MockSystem, MockVolumeCallback, MockVolumeSpec};
    use crate::backend::NativeEnumerator;

    fn volume_for(id: &str) -> EndpointVolume<MockBackend> {
        let enumerator = MockBackend::create_enumerator().unwrap();
        let device = Device::<MockBackend>::from_native(enumerator.device(id).unwrap());
        device.activate_endpoint_volume().unwrap()
    }

    fn nil() -> EventContext {
        EventContext::nil()
    }

    #[test]
    fn test_null_volume_rejects_every_call() {
        let system = MockSystem::install();
        let volume = EndpointVolume::<MockBackend>::null();
        assert_eq!(volume.channel_count_outcome().status(), Status::INVALID_ARG);
        assert_eq!(volume.is_muted_outcome().status(), Status::INVALID_ARG);
        assert_eq!(volume.step_count_outcome().status(), Status::INVALID_ARG);
        assert_eq!(volume.current_step_index_outcome().status(), Status::INVALID_ARG);
        assert_eq!(
            volume.channel_volume_level_scalar_outcome(0).into_parts(),
            (Status::INVALID_ARG, -1.0)
        );
        assert_eq!(volume.set_mute_outcome(true, nil()), Status::INVALID_ARG);
        assert_eq!(volume.volume_step_up_outcome(nil()), Status::INVALID_ARG);
        assert_eq!(
            volume.set_master_volume_level_scalar(0.5, nil()),
            Err(AudioError::Com(Status::INVALID_ARG))
        );

        assert_eq!(
            volume.channel_volume_level_db_outcome(0).into_parts(),
            (Status::INVALID_ARG, 0.0)
        );
        assert_eq!(volume.master_volume_level_db_outcome().status(), Status::INVALID_ARG);
        assert_eq!(
            volume.master_volume_level_scalar(),
            Err(AudioError::Com(Status::INVALID_ARG))
        );
        assert_eq!(
            volume.volume_range_outcome().into_parts(),
            (Status::INVALID_ARG, VolumeRange::default())
        );
        assert_eq!(
            volume.query_hardware_support_outcome().into_parts(),
            (Status::INVALID_ARG, HardwareSupport::default())
        );
        assert_eq!(
            volume.set_channel_volume_level_db_outcome(0, -6.0, nil()),
            Status::INVALID_ARG
        );
        assert_eq!(
            volume.set_channel_volume_level_scalar_outcome(0, 0.5, nil()),
            Status::INVALID_ARG
        );
        assert_eq!(
            volume.set_master_volume_level_db(-6.0, nil()),
            Err(AudioError::Com(Status::INVALID_ARG))
        );
        assert_eq!(
            volume.toggle_mute_outcome(nil()).into_parts(),
            (Status::INVALID_ARG, false)
        );
        assert_eq!(volume.volume_step_down_outcome(nil()), Status::INVALID_ARG);

        let callback = MockVolumeCallback::new();
        assert_eq!(
            volume.register_control_change_notify_outcome(&callback),
            Status::INVALID_ARG
        );
        assert_eq!(
            volume.unregister_control_change_notify(&callback),
            Err(AudioError::Com(Status::INVALID_ARG))
        );
        assert_eq!(system.native_calls(), 0);
    }

    #[test]
    fn test_control_change_registration() {
        let system = MockSystem::install();
        system.add_device(MockDeviceSpec::render("{spk}", "Speakers"));
        system.add_device(MockDeviceSpec::capture("{mic}", "Microphone"));
        let ctx = system.context();
        let speakers = volume_for("{spk}");
        let callback = MockVolumeCallback::new();

        speakers.register_control_change_notify(&callback).unwrap();
        assert_eq!(system.volume_callbacks("{spk}"), 1);
        assert_eq!(system.volume_callbacks("{mic}"), 0);

        let microphone = volume_for("{mic}");
        assert_eq!(
            microphone.unregister_control_change_notify_outcome(&callback),
            Status::NOT_FOUND
        );
        speakers.unregister_control_change_notify(&callback).unwrap();
        assert_eq!(system.volume_callbacks("{spk}"), 0);

        drop(ctx);
        assert_eq!(
            speakers.register_control_change_notify(&callback),
            Err(AudioError::Com(Status::NOT_INITIALIZED))
        );
        assert_eq!(system.volume_callbacks("{spk}"), 0);
    }

    #[test]
    fn test_step_count_fetched_once() {
        let system = MockSystem::install();
        system.add_device(
            MockDeviceSpec::render("{spk}", "Speakers").with_volume(MockVolumeSpec::default().with_steps(51)),
        );
        let _ctx = system.context();
        let volume = volume_for("{spk}");

        let first = volume.current_step_index().unwrap();
        let second = volume.current_step_index().unwrap();
        assert_eq!(first, second);

        let stats = system.step_info_stats();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.count_requests, 1);

        assert_eq!(volume.step_count().unwrap(), 51);
        assert_eq!(system.step_info_stats().calls, 2);
    }

    #[test]
    fn test_step_count_cache_survives_volume_changes() {
        let system = MockSystem::install();
        system.add_device(
            MockDeviceSpec::render("{spk}", "Speakers").with_volume(MockVolumeSpec::default().with_steps(11)),
        );
        let _ctx = system.context();
        let volume = volume_for("{spk}");

        assert_eq!(volume.step_count().unwrap(), 11);
        volume.set_master_volume_level_scalar(0.0, nil()).unwrap();
        assert_eq!(volume.current_step_index().unwrap(), 0);
        volume.volume_step_up(nil()).unwrap();
        volume.volume_step_up(nil()).unwrap();
        assert_eq!(volume.current_step_index().unwrap(), 2);
        assert_eq!(volume.step_count().unwrap(), 11);
        assert_eq!(system.step_info_stats().count_requests, 1);

        volume.volume_step_down(nil()).unwrap();
        assert_eq!(volume.current_step_index().unwrap(), 1);
    }

    #[test]
    fn test_failed_step_fetch_is_retried() {
        let system = MockSystem::install();
        system.add_device(MockDeviceSpec::render("{spk}", "Speakers"));
        let ctx = system.context();
        let volume = volume_for("{spk}");
        drop(ctx);

        assert_eq!(volume.step_count_outcome().status(), Status::NOT_INITIALIZED);
        let _ctx = system.context();
        assert!(volume.step_count_outcome().has_value());
        assert_eq!(system.step_info_stats().count_requests, 2);
    }

    #[test]
    fn test_volume_and_mute() {
        let system = MockSystem::install();
        system.add_device(
            MockDeviceSpec::capture("{mic}", "Mic").with_volume(
                MockVolumeSpec::default()
                    .with_channels(2)
                    .with_range(-60.0, 0.0, 1.5),
            ),
        );
        let _ctx = system.context();
        let volume = volume_for("{mic}");

        assert_eq!(volume.channel_count().unwrap(), 2);
        assert_eq!(
            volume.volume_range().unwrap(),
            VolumeRange {
                min_db: -60.0,
                max_db: 0.0,
                increment_db: 1.5
            }
        );

        volume.set_master_volume_level_scalar(1.5, nil()).unwrap();
        assert_eq!(volume.master_volume_level_scalar().unwrap(), 1.0);
        assert_eq!(volume.master_volume_level_db().unwrap(), 0.0);

        volume.set_master_volume_level_db(-30.0, nil()).unwrap();
        assert_eq!(volume.master_volume_level_scalar().unwrap(), 0.5);

        volume.set_channel_volume_level_scalar(1, 0.25, nil()).unwrap();
        assert_eq!(volume.channel_volume_level_scalar(1).unwrap(), 0.25);
        assert_eq!(volume.channel_volume_level_db(1).unwrap(), -45.0);
        volume.set_channel_volume_level_db(0, -15.0, nil()).unwrap();
        assert_eq!(volume.channel_volume_level_scalar(0).unwrap(), 0.75);
        assert_eq!(
            volume.channel_volume_level_scalar_outcome(2).status(),
            Status::INVALID_ARG
        );

        assert!(!volume.is_muted().unwrap());
        assert!(volume.toggle_mute(nil()).unwrap());
        assert!(volume.is_muted().unwrap());
        assert_eq!(volume.toggle_mute_outcome(nil()).into_parts(), (Status::OK, false));

        let support = volume.query_hardware_support().unwrap();
        assert!(support.contains(HardwareSupport::VOLUME));
    }

    #[test]
    fn test_release_drops_step_cache() {
        let system = MockSystem::install();
        system.add_device(MockDeviceSpec::render("{spk}", "Speakers"));
        let _ctx = system.context();
        let mut volume = volume_for("{spk}");
        volume.step_count().unwrap();

        let raw = volume.release();
        assert!(volume.is_null());
        assert_eq!(volume.step_count_outcome().status(), Status::INVALID_ARG);

        let rebuilt = EndpointVolume::<MockBackend>::from(raw);
        rebuilt.step_count().unwrap();
        assert_eq!(system.step_info_stats().count_requests, 2);
    }
}
