//! Error type for the throwing call convention.

use crate::util::Status;
use thiserror::Error;

/// Audio wrapper error types.
///
/// Every variant maps back to the native status code it stands for, see
/// [`AudioError::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("COM initialization failed: {0}")]
    ComInitFailed(Status),

    #[error("Interface is empty")]
    EmptyInterface,

    #[error("Index {index} out of range for collection of {len} devices")]
    OutOfRange { index: usize, len: usize },

    #[error("Windows API error: {0}")]
    Com(Status),
}

impl AudioError {
    /// The native status code carried by this error.
    pub fn status(&self) -> Status {
        match self {
            AudioError::ComInitFailed(status) | AudioError::Com(status) => *status,
            AudioError::EmptyInterface | AudioError::OutOfRange { .. } => Status::INVALID_ARG,
        }
    }
}

impl From<Status> for AudioError {
    fn from(status: Status) -> Self {
        AudioError::Com(status)
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for AudioError {
    fn from(err: windows::core::Error) -> Self {
        AudioError::Com(Status::from(err))
    }
}
