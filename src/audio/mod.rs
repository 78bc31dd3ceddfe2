//! Adapters over the Windows Core Audio device API.
//!
//! Each adapter owns one interface reference and offers every operation in
//! two forms: a plain method returning `Result<_, AudioError>` and an
//! `*_outcome` method returning the status next to an always-present value.

pub mod collection;
pub mod context;
pub mod device;
pub mod enumerator;
pub mod model;
pub mod volume;

pub use collection::DeviceCollection;
pub use context::ComContext;
pub use device::Device;
pub use enumerator::DeviceEnumerator;
pub use model::{Apartment, DataFlow, DeviceRole, DeviceState, EventContext, HardwareSupport, StateMask, VolumeRange};
pub use volume::EndpointVolume;
