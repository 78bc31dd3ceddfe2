//! Status-carrying result for the non-throwing call convention.

use super::Status;
use crate::error::AudioError;

/// A status code paired with a value that is always present.
///
/// Unlike `Option`/`Result` there is no empty state: failing calls still hand
/// back a value (a null device, a zero count, ...). The status is fixed at
/// construction.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Outcome<T> {
    status: Status,
    value: T,
}

impl<T> Outcome<T> {
    pub fn new(status: Status, value: T) -> Self {
        Self { status, value }
    }

    /// `S_OK` with the given value.
    pub fn ok(value: T) -> Self {
        Self::new(Status::OK, value)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// True iff the status denotes success.
    pub fn has_value(&self) -> bool {
        self.status.is_success()
    }

    /// The stored value, whatever the status.
    pub fn get_unchecked(&self) -> &T {
        &self.value
    }

    pub fn get_unchecked_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_unchecked(self) -> T {
        self.value
    }

    pub fn into_parts(self) -> (Status, T) {
        (self.status, self.value)
    }

    /// The stored value, or the status as an error if it denotes failure.
    pub fn get(&self) -> Result<&T, AudioError> {
        self.status.ok()?;
        Ok(&self.value)
    }

    pub fn get_mut(&mut self) -> Result<&mut T, AudioError> {
        self.status.ok()?;
        Ok(&mut self.value)
    }

    pub fn into_result(self) -> Result<T, AudioError> {
        self.status.ok()?;
        Ok(self.value)
    }

    /// Transform the value, keeping the status.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        Outcome::new(self.status, f(self.value))
    }
}

impl<T> From<Outcome<T>> for Result<T, AudioError> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.into_result()
    }
}
