//! COM initialization scope.

use super::model::Apartment;
use crate::backend::Backend;
use crate::error::AudioError;
use crate::util::Outcome;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// COM initialization guard that uninitializes COM on drop.
///
/// Initialization is per thread, so the guard is neither `Send` nor `Sync`.
/// It must outlive every adapter obtained through it; calls made after it is
/// dropped fail with `CO_E_NOTINITIALIZED`.
pub struct ComContext<B: Backend> {
    need_to_uninitialize: bool,
    _marker: PhantomData<(fn() -> B, *const ())>,
}

impl<B: Backend> ComContext<B> {
    /// Initialize COM for the current thread.
    pub fn new(apartment: Apartment) -> Result<Self, AudioError> {
        let status = B::initialize(apartment);
        if status.is_failure() {
            warn!(%status, ?apartment, "COM initialization failed");
            return Err(AudioError::ComInitFailed(status));
        }
        debug!(%status, ?apartment, "COM initialized");
        Ok(Self::with_uninitialize(true))
    }

    /// Initialize COM, reporting the status instead of failing.
    ///
    /// The returned scope only uninitializes if initialization succeeded.
    pub fn make(apartment: Apartment) -> Outcome<Self> {
        let status = B::initialize(apartment);
        if status.is_failure() {
            warn!(%status, ?apartment, "COM initialization failed");
        } else {
            debug!(%status, ?apartment, "COM initialized");
        }
        Outcome::new(status, Self::with_uninitialize(status.is_success()))
    }

    /// Adopt an initialization the caller already performed on this thread.
    /// The scope neither initializes nor uninitializes.
    pub fn adopt() -> Self {
        Self::with_uninitialize(false)
    }

    pub fn needs_uninitialize(&self) -> bool {
        self.need_to_uninitialize
    }

    fn with_uninitialize(need_to_uninitialize: bool) -> Self {
        Self {
            need_to_uninitialize,
            _marker: PhantomData,
        }
    }
}

impl<B: Backend> Drop for ComContext<B> {
    fn drop(&mut self) {
        if self.need_to_uninitialize {
            B::uninitialize();
            debug!("COM uninitialized");
        }
    }
}

impl<B: Backend> std::fmt::Debug for ComContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComContext")
            .field("need_to_uninitialize", &self.need_to_uninitialize)
            .finish()
    }
}
