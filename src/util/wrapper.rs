//! Shared base for the interface adapters.

use super::{ComInterface, ComPtr, Status};

/// Owns the single interface reference behind an adapter.
pub struct InterfaceWrapper<T: ComInterface> {
    value: ComPtr<T>,
}

impl<T: ComInterface> InterfaceWrapper<T> {
    pub const fn null() -> Self {
        Self {
            value: ComPtr::null(),
        }
    }

    pub fn new(raw: T) -> Self {
        Self {
            value: ComPtr::new(raw),
        }
    }

    pub fn is_present(&self) -> bool {
        !self.value.is_null()
    }

    /// Transfer the reference out, leaving the wrapper empty.
    pub fn release(&mut self) -> ComPtr<T> {
        self.value.take()
    }

    /// Borrow the raw interface. The caller must not release it.
    pub fn get_raw(&self) -> Option<&T> {
        self.value.get()
    }

    /// The raw interface, or `E_INVALIDARG` when empty. Every adapter
    /// operation goes through here before touching the native layer.
    pub(crate) fn native(&self) -> Result<&T, Status> {
        self.value.get().ok_or(Status::INVALID_ARG)
    }
}

impl<T: ComInterface> Default for InterfaceWrapper<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ComInterface> From<ComPtr<T>> for InterfaceWrapper<T> {
    fn from(value: ComPtr<T>) -> Self {
        Self { value }
    }
}

impl<T: ComInterface> std::fmt::Debug for InterfaceWrapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.value, f)
    }
}

/// Common surface of every adapter: presence checks and ownership transfer.
pub trait Adapter {
    type Raw: ComInterface;

    fn wrapper(&self) -> &InterfaceWrapper<Self::Raw>;

    fn wrapper_mut(&mut self) -> &mut InterfaceWrapper<Self::Raw>;

    /// True when the adapter holds an interface.
    fn is_present(&self) -> bool {
        self.wrapper().is_present()
    }

    fn is_null(&self) -> bool {
        !self.is_present()
    }

    /// Transfer the interface reference to the caller. The adapter is left empty.
    fn release(&mut self) -> ComPtr<Self::Raw> {
        self.wrapper_mut().release()
    }

    /// Borrow the raw interface without transferring ownership.
    fn get_raw(&self) -> Option<&Self::Raw> {
        self.wrapper().get_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::ffi::c_void;
    use std::rc::Rc;

    struct Counted(Rc<Cell<u32>>);

    impl ComInterface for Counted {
        fn as_raw(&self) -> *mut c_void {
            Rc::as_ptr(&self.0) as *mut c_void
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    struct Widget {
        inner: InterfaceWrapper<Counted>,
    }

    impl Adapter for Widget {
        type Raw = Counted;

        fn wrapper(&self) -> &InterfaceWrapper<Counted> {
            &self.inner
        }

        fn wrapper_mut(&mut self) -> &mut InterfaceWrapper<Counted> {
            &mut self.inner
        }
    }

    #[test]
    fn test_empty_wrapper_reports_invalid_arg() {
        let wrapper = InterfaceWrapper::<Counted>::null();
        assert!(!wrapper.is_present());
        assert!(wrapper.get_raw().is_none());
        assert_eq!(wrapper.native().err(), Some(Status::INVALID_ARG));
    }

    #[test]
    fn test_release_transfers_ownership() {
        let releases = Rc::new(Cell::new(0));
        let mut widget = Widget {
            inner: InterfaceWrapper::new(Counted(Rc::clone(&releases))),
        };
        assert!(widget.is_present());
        let raw = widget.get_raw().map(ComInterface::as_raw);
        assert_eq!(raw, Some(Rc::as_ptr(&releases) as *mut c_void));

        let owned = widget.release();
        assert!(widget.is_null());
        assert_eq!(releases.get(), 0);
        drop(widget);
        assert_eq!(releases.get(), 0);
        drop(owned);
        assert_eq!(releases.get(), 1);
    }
}
