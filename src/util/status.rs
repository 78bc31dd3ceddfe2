//! Native status codes.
//!
//! Every Core Audio call reports an `HRESULT`. This layer only cares whether
//! it denotes success; the code itself is passed through unchanged.

use crate::error::AudioError;
use std::fmt;

/// A native status code (`HRESULT`).
///
/// Non-negative codes are successes (`S_OK`, `S_FALSE`, ...), negative codes
/// are failures.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Status(pub i32);

impl Status {
    /// `S_OK`
    pub const OK: Status = Status(0);

    /// `S_FALSE`: benign success, e.g. COM was already initialized on this thread.
    pub const FALSE: Status = Status(1);

    /// `E_FAIL`
    pub const FAIL: Status = Status(0x8000_4005_u32 as i32);

    /// `E_POINTER`
    pub const POINTER: Status = Status(0x8000_4003_u32 as i32);

    /// `E_INVALIDARG`
    pub const INVALID_ARG: Status = Status(0x8007_0057_u32 as i32);

    /// `E_OUTOFMEMORY`
    pub const OUT_OF_MEMORY: Status = Status(0x8007_000E_u32 as i32);

    /// `E_NOTFOUND` as returned by the MMDevice API (`HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`).
    pub const NOT_FOUND: Status = Status(0x8007_0490_u32 as i32);

    /// `CO_E_NOTINITIALIZED`
    pub const NOT_INITIALIZED: Status = Status(0x8004_01F0_u32 as i32);

    /// `RPC_E_CHANGED_MODE`: COM was already initialized with another apartment model.
    pub const CHANGED_MODE: Status = Status(0x8001_0106_u32 as i32);

    /// True for `S_OK`, `S_FALSE` and every other non-negative code.
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// True for negative codes.
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// The code as an unsigned 32-bit value, the way it is usually printed.
    pub const fn code(self) -> u32 {
        self.0 as u32
    }

    /// `Err` with this status as a domain error if it denotes failure.
    pub fn ok(self) -> Result<(), AudioError> {
        if self.is_failure() {
            Err(AudioError::from(self))
        } else {
            Ok(())
        }
    }

    /// Symbolic name for the codes this crate produces or inspects.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Status::OK => "S_OK",
            Status::FALSE => "S_FALSE",
            Status::FAIL => "E_FAIL",
            Status::POINTER => "E_POINTER",
            Status::INVALID_ARG => "E_INVALIDARG",
            Status::OUT_OF_MEMORY => "E_OUTOFMEMORY",
            Status::NOT_FOUND => "E_NOTFOUND",
            Status::NOT_INITIALIZED => "CO_E_NOTINITIALIZED",
            Status::CHANGED_MODE => "RPC_E_CHANGED_MODE",
            _ => return None,
        };
        Some(name)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.code()),
            None => write!(f, "0x{:08X}", self.code()),
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({})", self)
    }
}

#[cfg(windows)]
impl From<windows::core::HRESULT> for Status {
    fn from(hr: windows::core::HRESULT) -> Self {
        Status(hr.0)
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for Status {
    fn from(err: windows::core::Error) -> Self {
        Status(err.code().0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_boundary() {
        assert!(Status(0).is_success());
        assert!(Status(1).is_success());
        assert!(Status(i32::MAX).is_success());
        assert!(Status(-1).is_failure());
        assert!(Status(i32::MIN).is_failure());
        assert!(Status::INVALID_ARG.is_failure());
        assert!(Status::NOT_FOUND.is_failure());
    }

    #[test]
    fn test_ok_conversion() {
        assert!(Status::FALSE.ok().is_ok());
        let err = Status::NOT_INITIALIZED.ok().unwrap_err();
        assert_eq!(err.status(), Status::NOT_INITIALIZED);
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::INVALID_ARG.to_string(), "E_INVALIDARG (0x80070057)");
        assert_eq!(Status(0x1234).to_string(), "0x00001234");
    }
}
