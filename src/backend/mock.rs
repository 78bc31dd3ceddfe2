//! In-memory device system for tests.
//!
//! [`MockSystem::install`] puts a fresh system on the current thread; the
//! [`MockBackend`] entry points and every mock interface then operate on it.
//! Membership, device state and volume levels are live: they are read from
//! the shared system at call time, the way the audio service answers.
//!
//! Native calls fail with `CO_E_NOTINITIALIZED` while no initialization is
//! active on the thread. Every mock interface value counts as one reference,
//! acquired on creation and released on drop.

use super::{Backend, NativeCollection, NativeDevice, NativeEndpointVolume, NativeEnumerator, NativeResult};
use crate::audio::context::ComContext;
use crate::audio::model::{Apartment, DataFlow, DeviceRole, DeviceState, EventContext, HardwareSupport, StateMask};
use crate::util::{ComInterface, Status};
use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::rc::Rc;

thread_local! {
    static INIT: RefCell<InitState> = RefCell::new(InitState::default());
    static SYSTEM: RefCell<Option<Rc<SystemState>>> = const { RefCell::new(None) };
}

#[derive(Default)]
struct InitState {
    depth: u32,
    apartment: Option<Apartment>,
    fail_next: Option<Status>,
}

/// Backend whose native layer is the thread's [`MockSystem`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MockBackend;

impl MockBackend {
    /// Number of initializations currently active on this thread.
    pub fn init_depth() -> u32 {
        INIT.with(|init| init.borrow().depth)
    }

    /// Make the next `initialize` on this thread fail with `status`.
    pub fn fail_next_initialize(status: Status) {
        INIT.with(|init| init.borrow_mut().fail_next = Some(status));
    }

    fn is_initialized() -> bool {
        Self::init_depth() > 0
    }
}

impl Backend for MockBackend {
    type Enumerator = MockEnumerator;
    type Collection = MockCollection;
    type Device = MockDevice;
    type EndpointVolume = MockEndpointVolume;
    type NotificationClient = MockNotificationClient;
    type VolumeCallback = MockVolumeCallback;

    fn initialize(apartment: Apartment) -> Status {
        INIT.with(|init| {
            let mut init = init.borrow_mut();
            if let Some(status) = init.fail_next.take() {
                return status;
            }
            match init.apartment {
                Some(current) if init.depth > 0 && current != apartment => Status::CHANGED_MODE,
                _ => {
                    init.depth += 1;
                    init.apartment = Some(apartment);
                    if init.depth == 1 {
                        Status::OK
                    } else {
                        Status::FALSE
                    }
                }
            }
        })
    }

    fn uninitialize() {
        INIT.with(|init| {
            let mut init = init.borrow_mut();
            init.depth = init.depth.saturating_sub(1);
            if init.depth == 0 {
                init.apartment = None;
            }
        });
    }

    fn create_enumerator() -> NativeResult<MockEnumerator> {
        let system = SystemState::current();
        system.enter()?;
        Ok(MockEnumerator {
            handle: Handle::acquire(&system),
        })
    }
}

/// Scripted volume control of a mock device.
#[derive(Debug, Clone, PartialEq)]
pub struct MockVolumeSpec {
    pub channels: u32,
    pub steps: u32,
    pub min_db: f32,
    pub max_db: f32,
    pub increment_db: f32,
    pub level: f32,
    pub muted: bool,
    pub hardware: HardwareSupport,
}

impl Default for MockVolumeSpec {
    fn default() -> Self {
        Self {
            channels: 1,
            steps: 101,
            min_db: -96.0,
            max_db: 0.0,
            increment_db: 0.5,
            level: 1.0,
            muted: false,
            hardware: HardwareSupport(HardwareSupport::VOLUME.0 | HardwareSupport::MUTE.0),
        }
    }
}

impl MockVolumeSpec {
    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_range(mut self, min_db: f32, max_db: f32, increment_db: f32) -> Self {
        self.min_db = min_db;
        self.max_db = max_db;
        self.increment_db = increment_db;
        self
    }

    pub fn with_level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }
}

/// Scripted endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct MockDeviceSpec {
    pub id: String,
    pub name: String,
    pub flow: DataFlow,
    pub state: DeviceState,
    pub volume: MockVolumeSpec,
}

impl MockDeviceSpec {
    pub fn new(id: &str, name: &str, flow: DataFlow) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            flow,
            state: DeviceState::Active,
            volume: MockVolumeSpec::default(),
        }
    }

    pub fn capture(id: &str, name: &str) -> Self {
        Self::new(id, name, DataFlow::Capture)
    }

    pub fn render(id: &str, name: &str) -> Self {
        Self::new(id, name, DataFlow::Render)
    }

    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    pub fn with_volume(mut self, volume: MockVolumeSpec) -> Self {
        self.volume = volume;
        self
    }
}

/// Interface references handed out and released so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefCounts {
    pub acquired: u64,
    pub released: u64,
}

impl RefCounts {
    /// References currently alive.
    pub fn live(&self) -> u64 {
        self.acquired - self.released
    }
}

/// `GetVolumeStepInfo` traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepInfoStats {
    pub calls: u64,
    /// Calls that asked for the step count.
    pub count_requests: u64,
}

#[derive(Default)]
struct Counters {
    native_calls: Cell<u64>,
    count_calls: Cell<u64>,
    step_info: Cell<StepInfoStats>,
    references: Cell<RefCounts>,
}

struct VolumeState {
    channels: Vec<f32>,
    master: f32,
    muted: bool,
    steps: u32,
    min_db: f32,
    max_db: f32,
    increment_db: f32,
    hardware: HardwareSupport,
    last_context: EventContext,
}

impl VolumeState {
    fn new(spec: &MockVolumeSpec) -> Self {
        let level = spec.level.clamp(0.0, 1.0);
        Self {
            channels: vec![level; spec.channels as usize],
            master: level,
            muted: spec.muted,
            steps: spec.steps,
            min_db: spec.min_db,
            max_db: spec.max_db,
            increment_db: spec.increment_db,
            hardware: spec.hardware,
            last_context: EventContext::nil(),
        }
    }

    fn to_db(&self, scalar: f32) -> f32 {
        self.min_db + scalar * (self.max_db - self.min_db)
    }

    fn to_scalar(&self, level_db: f32) -> f32 {
        let span = self.max_db - self.min_db;
        if span <= 0.0 {
            return 0.0;
        }
        ((level_db.clamp(self.min_db, self.max_db) - self.min_db) / span).clamp(0.0, 1.0)
    }

    fn channel(&self, channel: u32) -> NativeResult<f32> {
        self.channels
            .get(channel as usize)
            .copied()
            .ok_or(Status::INVALID_ARG)
    }

    fn channel_mut(&mut self, channel: u32) -> NativeResult<&mut f32> {
        self.channels
            .get_mut(channel as usize)
            .ok_or(Status::INVALID_ARG)
    }

    fn last_step(&self) -> u32 {
        self.steps.saturating_sub(1)
    }

    fn step_index(&self) -> u32 {
        let last = self.last_step();
        if last == 0 {
            return 0;
        }
        (self.master * last as f32).round() as u32
    }

    fn move_to_step(&mut self, index: u32) {
        let last = self.last_step();
        if last > 0 {
            self.master = index.min(last) as f32 / last as f32;
        }
    }
}

struct DeviceEntry {
    id: String,
    name: String,
    flow: DataFlow,
    state: Cell<DeviceState>,
    volume: RefCell<VolumeState>,
    volume_callbacks: Registrations,
}

/// Callback identities registered with one notification source.
#[derive(Default)]
struct Registrations(RefCell<Vec<usize>>);

impl Registrations {
    fn register(&self, callback: &impl ComInterface) {
        self.0.borrow_mut().push(callback.as_raw() as usize);
    }

    /// `E_NOTFOUND` when the callback was never registered.
    fn unregister(&self, callback: &impl ComInterface) -> NativeResult<()> {
        let mut registered = self.0.borrow_mut();
        let identity = callback.as_raw() as usize;
        let position = registered
            .iter()
            .position(|&r| r == identity)
            .ok_or(Status::NOT_FOUND)?;
        registered.remove(position);
        Ok(())
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

struct SystemState {
    devices: RefCell<Vec<Rc<DeviceEntry>>>,
    endpoint_callbacks: Registrations,
    counters: Counters,
    fail_next_enumeration: Cell<Option<Status>>,
}

impl SystemState {
    fn new() -> Self {
        Self {
            devices: RefCell::new(Vec::new()),
            endpoint_callbacks: Registrations::default(),
            counters: Counters::default(),
            fail_next_enumeration: Cell::new(None),
        }
    }

    /// The thread's system, installing an empty one on first use.
    fn current() -> Rc<SystemState> {
        SYSTEM.with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(|| Rc::new(SystemState::new()))
                .clone()
        })
    }

    /// Bookkeeping shared by every native call.
    fn enter(&self) -> NativeResult<()> {
        let calls = &self.counters.native_calls;
        calls.set(calls.get() + 1);
        if MockBackend::is_initialized() {
            Ok(())
        } else {
            Err(Status::NOT_INITIALIZED)
        }
    }

    fn matching(&self, flow: DataFlow, mask: StateMask) -> Vec<Rc<DeviceEntry>> {
        self.devices
            .borrow()
            .iter()
            .filter(|d| flow.matches(d.flow) && mask.contains(d.state.get()))
            .cloned()
            .collect()
    }

    fn find(&self, id: &str) -> Option<Rc<DeviceEntry>> {
        self.devices.borrow().iter().find(|d| d.id == id).cloned()
    }
}

/// Handle to the thread's mock device system.
#[derive(Clone)]
pub struct MockSystem {
    state: Rc<SystemState>,
}

impl MockSystem {
    /// Replace the current thread's system with an empty one.
    pub fn install() -> Self {
        let state = Rc::new(SystemState::new());
        SYSTEM.with(|slot| *slot.borrow_mut() = Some(state.clone()));
        Self { state }
    }

    /// Initialize COM on this thread for the lifetime of the returned scope.
    pub fn context(&self) -> ComContext<MockBackend> {
        ComContext::make(Apartment::SingleThreaded).into_unchecked()
    }

    /// Add an endpoint after the existing ones.
    pub fn add_device(&self, spec: MockDeviceSpec) {
        let volume = VolumeState::new(&spec.volume);
        self.state.devices.borrow_mut().push(Rc::new(DeviceEntry {
            id: spec.id,
            name: spec.name,
            flow: spec.flow,
            state: Cell::new(spec.state),
            volume: RefCell::new(volume),
            volume_callbacks: Registrations::default(),
        }));
    }

    /// Remove an endpoint. Outstanding device references stay usable.
    pub fn remove_device(&self, id: &str) -> bool {
        let mut devices = self.state.devices.borrow_mut();
        let before = devices.len();
        devices.retain(|d| d.id != id);
        devices.len() != before
    }

    pub fn set_state(&self, id: &str, state: DeviceState) -> bool {
        match self.state.find(id) {
            Some(device) => {
                device.state.set(state);
                true
            }
            None => false,
        }
    }

    /// Make the next `EnumAudioEndpoints` fail with `status`.
    pub fn fail_next_enumeration(&self, status: Status) {
        self.state.fail_next_enumeration.set(Some(status));
    }

    /// Master volume of an endpoint as the audio service sees it.
    pub fn master_level(&self, id: &str) -> Option<f32> {
        self.state.find(id).map(|d| d.volume.borrow().master)
    }

    /// Context GUID of the last volume write to an endpoint.
    pub fn last_event_context(&self, id: &str) -> Option<EventContext> {
        self.state.find(id).map(|d| d.volume.borrow().last_context)
    }

    /// Endpoint notification clients currently registered.
    pub fn endpoint_callbacks(&self) -> usize {
        self.state.endpoint_callbacks.len()
    }

    /// Control change callbacks currently registered on an endpoint.
    pub fn volume_callbacks(&self, id: &str) -> usize {
        self.state.find(id).map_or(0, |d| d.volume_callbacks.len())
    }

    /// Every native call so far, including ones that failed.
    pub fn native_calls(&self) -> u64 {
        self.state.counters.native_calls.get()
    }

    /// `GetCount` calls so far.
    pub fn count_calls(&self) -> u64 {
        self.state.counters.count_calls.get()
    }

    pub fn references(&self) -> RefCounts {
        self.state.counters.references.get()
    }

    pub fn step_info_stats(&self) -> StepInfoStats {
        self.state.counters.step_info.get()
    }
}

impl std::fmt::Debug for MockSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSystem")
            .field("devices", &self.state.devices.borrow().len())
            .field("references", &self.references())
            .finish()
    }
}

/// One counted interface reference.
struct Handle {
    system: Rc<SystemState>,
    identity: Box<u8>,
}

impl Handle {
    fn acquire(system: &Rc<SystemState>) -> Self {
        let refs = &system.counters.references;
        let mut counts = refs.get();
        counts.acquired += 1;
        refs.set(counts);
        Self {
            system: system.clone(),
            identity: Box::new(0),
        }
    }

    fn as_raw(&self) -> *mut c_void {
        &*self.identity as *const u8 as *mut c_void
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let refs = &self.system.counters.references;
        let mut counts = refs.get();
        counts.released += 1;
        refs.set(counts);
    }
}

/// Mock `IMMDeviceEnumerator`.
pub struct MockEnumerator {
    handle: Handle,
}

impl ComInterface for MockEnumerator {
    fn as_raw(&self) -> *mut c_void {
        self.handle.as_raw()
    }
}

impl MockEnumerator {
    fn device_handle(&self, entry: Rc<DeviceEntry>) -> MockDevice {
        MockDevice {
            handle: Handle::acquire(&self.handle.system),
            entry,
        }
    }
}

impl NativeEnumerator<MockBackend> for MockEnumerator {
    fn enum_audio_endpoints(&self, flow: DataFlow, mask: StateMask) -> NativeResult<MockCollection> {
        let system = &self.handle.system;
        system.enter()?;
        if let Some(status) = system.fail_next_enumeration.take() {
            return Err(status);
        }
        Ok(MockCollection {
            handle: Handle::acquire(system),
            flow,
            mask,
        })
    }

    /// The first active endpoint of the flow serves every role.
    fn default_audio_endpoint(&self, flow: DataFlow, _role: DeviceRole) -> NativeResult<MockDevice> {
        let system = &self.handle.system;
        system.enter()?;
        if flow == DataFlow::All {
            return Err(Status::INVALID_ARG);
        }
        let entry = system
            .matching(flow, StateMask::ACTIVE)
            .into_iter()
            .next()
            .ok_or(Status::NOT_FOUND)?;
        Ok(self.device_handle(entry))
    }

    fn device(&self, id: &str) -> NativeResult<MockDevice> {
        let system = &self.handle.system;
        system.enter()?;
        let entry = system.find(id).ok_or(Status::NOT_FOUND)?;
        Ok(self.device_handle(entry))
    }

    fn register_endpoint_notification_callback(&self, client: &MockNotificationClient) -> NativeResult<()> {
        let system = &self.handle.system;
        system.enter()?;
        system.endpoint_callbacks.register(client);
        Ok(())
    }

    fn unregister_endpoint_notification_callback(&self, client: &MockNotificationClient) -> NativeResult<()> {
        let system = &self.handle.system;
        system.enter()?;
        system.endpoint_callbacks.unregister(client)
    }
}

/// Mock `IMMDeviceCollection`. Answers from the current membership.
pub struct MockCollection {
    handle: Handle,
    flow: DataFlow,
    mask: StateMask,
}

impl ComInterface for MockCollection {
    fn as_raw(&self) -> *mut c_void {
        self.handle.as_raw()
    }
}

impl NativeCollection<MockBackend> for MockCollection {
    fn count(&self) -> NativeResult<u32> {
        let system = &self.handle.system;
        let calls = &system.counters.count_calls;
        calls.set(calls.get() + 1);
        system.enter()?;
        Ok(system.matching(self.flow, self.mask).len() as u32)
    }

    fn item(&self, index: u32) -> NativeResult<MockDevice> {
        let system = &self.handle.system;
        system.enter()?;
        let entry = system
            .matching(self.flow, self.mask)
            .into_iter()
            .nth(index as usize)
            .ok_or(Status::INVALID_ARG)?;
        Ok(MockDevice {
            handle: Handle::acquire(system),
            entry,
        })
    }
}

/// Mock `IMMDevice`.
pub struct MockDevice {
    handle: Handle,
    entry: Rc<DeviceEntry>,
}

impl ComInterface for MockDevice {
    fn as_raw(&self) -> *mut c_void {
        self.handle.as_raw()
    }
}

impl NativeDevice<MockBackend> for MockDevice {
    fn id(&self) -> NativeResult<String> {
        self.handle.system.enter()?;
        Ok(self.entry.id.clone())
    }

    fn state(&self) -> NativeResult<DeviceState> {
        self.handle.system.enter()?;
        Ok(self.entry.state.get())
    }

    fn friendly_name(&self) -> NativeResult<String> {
        self.handle.system.enter()?;
        Ok(self.entry.name.clone())
    }

    fn activate_endpoint_volume(&self) -> NativeResult<MockEndpointVolume> {
        let system = &self.handle.system;
        system.enter()?;
        Ok(MockEndpointVolume {
            handle: Handle::acquire(system),
            entry: self.entry.clone(),
        })
    }
}

/// Mock `IAudioEndpointVolume`.
pub struct MockEndpointVolume {
    handle: Handle,
    entry: Rc<DeviceEntry>,
}

impl MockEndpointVolume {
    fn read<T>(&self, f: impl FnOnce(&VolumeState) -> NativeResult<T>) -> NativeResult<T> {
        self.handle.system.enter()?;
        f(&self.entry.volume.borrow())
    }

    fn write(&self, context: &EventContext, f: impl FnOnce(&mut VolumeState) -> NativeResult<()>) -> NativeResult<()> {
        self.handle.system.enter()?;
        let mut volume = self.entry.volume.borrow_mut();
        f(&mut volume)?;
        volume.last_context = *context;
        Ok(())
    }
}

fn checked_scalar(level: f32) -> NativeResult<f32> {
    if (0.0..=1.0).contains(&level) {
        Ok(level)
    } else {
        Err(Status::INVALID_ARG)
    }
}

impl ComInterface for MockEndpointVolume {
    fn as_raw(&self) -> *mut c_void {
        self.handle.as_raw()
    }
}

impl NativeEndpointVolume<MockBackend> for MockEndpointVolume {
    fn channel_count(&self) -> NativeResult<u32> {
        self.read(|v| Ok(v.channels.len() as u32))
    }

    fn channel_volume_level_db(&self, channel: u32) -> NativeResult<f32> {
        self.read(|v| v.channel(channel).map(|scalar| v.to_db(scalar)))
    }

    fn channel_volume_level_scalar(&self, channel: u32) -> NativeResult<f32> {
        self.read(|v| v.channel(channel))
    }

    fn master_volume_level_db(&self) -> NativeResult<f32> {
        self.read(|v| Ok(v.to_db(v.master)))
    }

    fn master_volume_level_scalar(&self) -> NativeResult<f32> {
        self.read(|v| Ok(v.master))
    }

    fn mute(&self) -> NativeResult<bool> {
        self.read(|v| Ok(v.muted))
    }

    fn volume_range(&self) -> NativeResult<(f32, f32, f32)> {
        self.read(|v| Ok((v.min_db, v.max_db, v.increment_db)))
    }

    fn volume_step_info(&self, step: Option<&mut u32>, step_count: Option<&mut u32>) -> NativeResult<()> {
        let stats = &self.handle.system.counters.step_info;
        let mut counted = stats.get();
        counted.calls += 1;
        if step_count.is_some() {
            counted.count_requests += 1;
        }
        stats.set(counted);

        self.read(|v| {
            if let Some(step) = step {
                *step = v.step_index();
            }
            if let Some(step_count) = step_count {
                *step_count = v.steps;
            }
            Ok(())
        })
    }

    fn query_hardware_support(&self) -> NativeResult<u32> {
        self.read(|v| Ok(v.hardware.0))
    }

    fn set_channel_volume_level_db(&self, channel: u32, level_db: f32, context: &EventContext) -> NativeResult<()> {
        self.write(context, |v| {
            let scalar = v.to_scalar(level_db);
            *v.channel_mut(channel)? = scalar;
            Ok(())
        })
    }

    fn set_channel_volume_level_scalar(&self, channel: u32, level: f32, context: &EventContext) -> NativeResult<()> {
        self.write(context, |v| {
            let level = checked_scalar(level)?;
            *v.channel_mut(channel)? = level;
            Ok(())
        })
    }

    fn set_master_volume_level_db(&self, level_db: f32, context: &EventContext) -> NativeResult<()> {
        self.write(context, |v| {
            v.master = v.to_scalar(level_db);
            Ok(())
        })
    }

    fn set_master_volume_level_scalar(&self, level: f32, context: &EventContext) -> NativeResult<()> {
        self.write(context, |v| {
            v.master = checked_scalar(level)?;
            Ok(())
        })
    }

    fn set_mute(&self, mute: bool, context: &EventContext) -> NativeResult<()> {
        self.write(context, |v| {
            v.muted = mute;
            Ok(())
        })
    }

    fn volume_step_up(&self, context: &EventContext) -> NativeResult<()> {
        self.write(context, |v| {
            let next = v.step_index() + 1;
            v.move_to_step(next);
            Ok(())
        })
    }

    fn volume_step_down(&self, context: &EventContext) -> NativeResult<()> {
        self.write(context, |v| {
            let next = v.step_index().saturating_sub(1);
            v.move_to_step(next);
            Ok(())
        })
    }

    fn register_control_change_notify(&self, callback: &MockVolumeCallback) -> NativeResult<()> {
        self.handle.system.enter()?;
        self.entry.volume_callbacks.register(callback);
        Ok(())
    }

    fn unregister_control_change_notify(&self, callback: &MockVolumeCallback) -> NativeResult<()> {
        self.handle.system.enter()?;
        self.entry.volume_callbacks.unregister(callback)
    }
}

/// Stand-in for a caller's `IMMNotificationClient`. Only its identity matters.
pub struct MockNotificationClient {
    handle: Handle,
}

impl MockNotificationClient {
    pub fn new() -> Self {
        Self {
            handle: Handle::acquire(&SystemState::current()),
        }
    }
}

impl Default for MockNotificationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ComInterface for MockNotificationClient {
    fn as_raw(&self) -> *mut c_void {
        self.handle.as_raw()
    }
}

/// Stand-in for a caller's `IAudioEndpointVolumeCallback`.
pub struct MockVolumeCallback {
    handle: Handle,
}

impl MockVolumeCallback {
    pub fn new() -> Self {
        Self {
            handle: Handle::acquire(&SystemState::current()),
        }
    }
}

impl Default for MockVolumeCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ComInterface for MockVolumeCallback {
    fn as_raw(&self) -> *mut c_void {
        self.handle.as_raw()
    }
}
