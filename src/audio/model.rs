//! Audio endpoint value types.
//!
//! Platform-neutral mirrors of the MMDevice API enums and flag sets, plus
//! the small records returned by the endpoint volume interface.

use std::fmt;

/// Data-flow direction of an endpoint (maps to Windows `EDataFlow`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum DataFlow {
    /// Playback endpoints (speakers, headphones)
    #[default]
    Render = 0,

    /// Recording endpoints (microphones, line in)
    Capture = 1,

    /// Both directions; only valid for enumeration
    All = 2,
}

impl DataFlow {
    /// Whether an endpoint with flow `endpoint` belongs to this filter.
    pub fn matches(self, endpoint: DataFlow) -> bool {
        self == DataFlow::All || self == endpoint
    }
}

/// Audio device role (maps to Windows `ERole`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum DeviceRole {
    /// Used by games, system sounds, most general applications
    #[default]
    Console = 0,

    /// Used by music players, video players
    Multimedia = 1,

    /// Used by Teams, Zoom, Discord, and other VoIP applications
    Communications = 2,
}

/// Windows device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Device is active and available for use
    Active,

    /// Device is disabled in Windows Sound settings
    Disabled,

    /// Device is not present (driver issue)
    NotPresent,

    /// Device is unplugged (for pluggable devices)
    Unplugged,
}

impl DeviceState {
    /// The `DEVICE_STATE_*` bit for this state.
    pub const fn bits(self) -> u32 {
        match self {
            DeviceState::Active => 0x1,
            DeviceState::Disabled => 0x2,
            DeviceState::NotPresent => 0x4,
            DeviceState::Unplugged => 0x8,
        }
    }

    /// Map a `DEVICE_STATE_*` value. Unknown values read as not present.
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            0x1 => DeviceState::Active,
            0x2 => DeviceState::Disabled,
            0x8 => DeviceState::Unplugged,
            _ => DeviceState::NotPresent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceState::Active => "active",
            DeviceState::Disabled => "disabled",
            DeviceState::NotPresent => "not present",
            DeviceState::Unplugged => "unplugged",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of device states to include when enumerating endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateMask(pub u32);

impl StateMask {
    pub const ACTIVE: StateMask = StateMask(0x1);
    pub const DISABLED: StateMask = StateMask(0x2);
    pub const NOT_PRESENT: StateMask = StateMask(0x4);
    pub const UNPLUGGED: StateMask = StateMask(0x8);
    /// `DEVICE_STATEMASK_ALL`
    pub const ALL: StateMask = StateMask(0xF);

    pub const fn contains(self, state: DeviceState) -> bool {
        self.0 & state.bits() != 0
    }
}

impl Default for StateMask {
    fn default() -> Self {
        StateMask::ALL
    }
}

impl From<DeviceState> for StateMask {
    fn from(state: DeviceState) -> Self {
        StateMask(state.bits())
    }
}

impl std::ops::BitOr for StateMask {
    type Output = StateMask;

    fn bitor(self, rhs: StateMask) -> StateMask {
        StateMask(self.0 | rhs.0)
    }
}

/// Volume range of an endpoint in decibels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VolumeRange {
    pub min_db: f32,
    pub max_db: f32,
    pub increment_db: f32,
}

/// Hardware capabilities of an endpoint (`ENDPOINT_HARDWARE_SUPPORT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HardwareSupport(pub u32);

impl HardwareSupport {
    pub const VOLUME: HardwareSupport = HardwareSupport(0x1);
    pub const MUTE: HardwareSupport = HardwareSupport(0x2);
    pub const METER: HardwareSupport = HardwareSupport(0x4);

    pub const fn contains(self, other: HardwareSupport) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Context GUID passed along with volume changes so a listener can recognise
/// its own writes. The nil GUID means "no context".
pub type EventContext = uuid::Uuid;

/// COM apartment model for the initialization scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Apartment {
    /// `COINIT_APARTMENTTHREADED`, suitable for UI threads
    #[default]
    SingleThreaded,

    /// `COINIT_MULTITHREADED`, for background worker threads
    MultiThreaded,
}
