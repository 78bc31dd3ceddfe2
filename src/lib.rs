//! wincoreaudio - Windows Core Audio convenience layer
//!
//! Safe, owning wrappers around the MMDevice API: initialize COM, enumerate
//! endpoints, inspect devices and drive their endpoint volume.
//!
//! ## Features
//!
//! - Single-owner interface handles released exactly once
//! - Snapshot device collections with random-access cursors
//! - Throwing (`Result`) and non-throwing (status + value) call conventions
//! - Full `IAudioEndpointVolume` surface with a cached step count
//! - Endpoint and control change notification registration
//! - In-memory mock backend (`mock` feature) for testing without Windows
//!
//! ## Example
//!
//! ```ignore
//! use wincoreaudio::{Apartment, DataFlow, StateMask};
//! use wincoreaudio::win32::{ComContext, DeviceEnumerator};
//!
//! let ctx = ComContext::new(Apartment::SingleThreaded)?;
//! let enumerator = DeviceEnumerator::new(&ctx)?;
//! for device in &enumerator.enum_audio_endpoints(DataFlow::Capture, StateMask::ALL)? {
//!     let device = device.into_result()?;
//!     println!("{}: {}", device.id()?, device.state()?);
//! }
//! ```

pub mod audio;
pub mod backend;
pub mod error;
pub mod util;

pub use audio::{
    Apartment, ComContext, DataFlow, Device, DeviceCollection, DeviceEnumerator, DeviceRole, DeviceState,
    EndpointVolume, EventContext, HardwareSupport, StateMask, VolumeRange,
};
pub use error::AudioError;
pub use util::{Adapter, ComPtr, Cursor, Iter, Outcome, Status, TaskMem};

/// The adapters bound to the real Windows backend.
#[cfg(windows)]
pub mod win32 {
    pub use crate::backend::win32::Win32;

    pub type ComContext = crate::audio::ComContext<Win32>;
    pub type DeviceEnumerator = crate::audio::DeviceEnumerator<Win32>;
    pub type DeviceCollection = crate::audio::DeviceCollection<Win32>;
    pub type Device = crate::audio::Device<Win32>;
    pub type EndpointVolume = crate::audio::EndpointVolume<Win32>;
}
