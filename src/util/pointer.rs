//! Single-owner handles for native resources.
//!
//! [`ComPtr`] owns one reference to a reference-counted interface and
//! [`TaskMem`] owns one buffer handed out by the system task allocator.
//! Neither can be duplicated; dropping a non-empty handle releases its
//! resource exactly once.

use crate::error::AudioError;
use std::cmp::Ordering;
use std::ffi::c_void;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr;

/// A reference-counted native interface.
///
/// Values of implementing types own exactly one reference; dropping the value
/// releases it. `as_raw` identifies the underlying object.
pub trait ComInterface {
    fn as_raw(&self) -> *mut c_void;
}

/// Owning handle for one reference to a COM interface (or nothing).
///
/// Construction from a value takes over the reference the caller already
/// owns; no extra reference is added.
pub struct ComPtr<T: ComInterface> {
    ptr: Option<T>,
}

impl<T: ComInterface> ComPtr<T> {
    pub const fn null() -> Self {
        Self { ptr: None }
    }

    pub fn new(value: T) -> Self {
        Self { ptr: Some(value) }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.ptr.as_ref()
    }

    /// Borrow the interface, failing with [`AudioError::EmptyInterface`] when empty.
    pub fn try_get(&self) -> Result<&T, AudioError> {
        self.ptr.as_ref().ok_or(AudioError::EmptyInterface)
    }

    /// Give up ownership without releasing. The handle is left empty.
    pub fn release(&mut self) -> Option<T> {
        self.ptr.take()
    }

    /// Release the held reference (if any) and take ownership of `with`.
    pub fn reset(&mut self, with: Option<T>) {
        self.ptr = with;
    }

    /// Move the reference into a new handle, leaving this one empty.
    pub fn take(&mut self) -> Self {
        Self { ptr: self.ptr.take() }
    }

    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.ptr, &mut other.ptr);
    }

    /// Identity address of the held interface, null when empty.
    pub fn as_raw(&self) -> *mut c_void {
        self.ptr
            .as_ref()
            .map_or(ptr::null_mut(), ComInterface::as_raw)
    }

    pub fn into_inner(self) -> Option<T> {
        self.ptr
    }
}

impl<T: ComInterface> Default for ComPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ComInterface> From<T> for ComPtr<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ComInterface> From<Option<T>> for ComPtr<T> {
    fn from(value: Option<T>) -> Self {
        Self { ptr: value }
    }
}

impl<T: ComInterface> fmt::Debug for ComPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComPtr").field(&self.as_raw()).finish()
    }
}

impl<T: ComInterface> PartialEq for ComPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_raw() == other.as_raw()
    }
}

impl<T: ComInterface> Eq for ComPtr<T> {}

impl<T: ComInterface> PartialOrd for ComPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ComInterface> Ord for ComPtr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_raw().cmp(&other.as_raw())
    }
}

impl<T: ComInterface> Hash for ComPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_raw().hash(state);
    }
}

/// Deallocation routine for system-allocated buffers.
///
/// # Safety
/// `free` must accept every non-null pointer the matching allocator returns.
pub unsafe trait TaskAllocator {
    /// # Safety
    /// `ptr` is non-null and was allocated by this allocator; it is freed once.
    unsafe fn free(ptr: *mut c_void);
}

/// Owning handle for a buffer that must be returned to the task allocator `A`.
pub struct TaskMem<T, A: TaskAllocator> {
    ptr: *mut T,
    _alloc: PhantomData<A>,
}

impl<T, A: TaskAllocator> TaskMem<T, A> {
    pub const fn null() -> Self {
        Self {
            ptr: ptr::null_mut(),
            _alloc: PhantomData,
        }
    }

    /// Take ownership of a buffer.
    ///
    /// # Safety
    /// `ptr` must be null or a live allocation from `A` that nothing else frees.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            ptr,
            _alloc: PhantomData,
        }
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Borrow the first element. Callers only build handles over valid
    /// buffers, so a non-null pointer is readable.
    pub fn as_ref(&self) -> Option<&T> {
        // SAFETY: from_raw's contract makes a non-null pointer a live allocation.
        unsafe { self.ptr.as_ref() }
    }

    /// Give up ownership without freeing. The handle is left null.
    pub fn release(&mut self) -> *mut T {
        std::mem::replace(&mut self.ptr, ptr::null_mut())
    }

    /// Free the held buffer (if any) and take ownership of `with`.
    ///
    /// # Safety
    /// Same contract as [`TaskMem::from_raw`].
    pub unsafe fn reset(&mut self, with: *mut T) {
        let old = std::mem::replace(&mut self.ptr, with);
        if !old.is_null() {
            A::free(old.cast());
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.ptr, &mut other.ptr);
    }
}

impl<A: TaskAllocator> TaskMem<u16, A> {
    /// Decode a NUL-terminated UTF-16 buffer, replacing invalid sequences.
    ///
    /// # Safety
    /// The buffer must contain a NUL terminator.
    pub unsafe fn to_string_lossy(&self) -> String {
        if self.ptr.is_null() {
            return String::new();
        }
        let mut len = 0;
        while *self.ptr.add(len) != 0 {
            len += 1;
        }
        String::from_utf16_lossy(std::slice::from_raw_parts(self.ptr, len))
    }
}

impl<T, A: TaskAllocator> Drop for TaskMem<T, A> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: the handle owns the allocation and nulls are skipped.
            unsafe { A::free(self.ptr.cast()) };
        }
    }
}

impl<T, A: TaskAllocator> Default for TaskMem<T, A> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T, A: TaskAllocator> fmt::Debug for TaskMem<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskMem").field(&self.ptr).finish()
    }
}

impl<T, A: TaskAllocator> PartialEq for TaskMem<T, A> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T, A: TaskAllocator> Eq for TaskMem<T, A> {}

impl<T, A: TaskAllocator> PartialOrd for TaskMem<T, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, A: TaskAllocator> Ord for TaskMem<T, A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ptr.cmp(&other.ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counted {
        releases: Rc<Cell<u32>>,
        id: Box<u8>,
    }

    impl Counted {
        fn new(releases: &Rc<Cell<u32>>) -> Self {
            Self {
                releases: Rc::clone(releases),
                id: Box::new(0),
            }
        }
    }

    impl ComInterface for Counted {
        fn as_raw(&self) -> *mut c_void {
            &*self.id as *const u8 as *mut c_void
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    thread_local! {
        static FREED: Cell<u32> = const { Cell::new(0) };
    }

    struct BoxAllocator;

    unsafe impl TaskAllocator for BoxAllocator {
        unsafe fn free(ptr: *mut c_void) {
            drop(Box::from_raw(ptr.cast::<u32>()));
            FREED.with(|f| f.set(f.get() + 1));
        }
    }

    fn freed() -> u32 {
        FREED.with(Cell::get)
    }

    fn alloc(value: u32) -> TaskMem<u32, BoxAllocator> {
        unsafe { TaskMem::from_raw(Box::into_raw(Box::new(value))) }
    }

    #[test]
    fn test_com_ptr_releases_once() {
        let releases = Rc::new(Cell::new(0));
        {
            let ptr = ComPtr::new(Counted::new(&releases));
            assert!(!ptr.is_null());
            assert_eq!(releases.get(), 0);
        }
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_com_ptr_take_empties_source() {
        let releases = Rc::new(Cell::new(0));
        let mut source = ComPtr::new(Counted::new(&releases));
        let raw = source.as_raw();
        let moved = source.take();
        assert!(source.is_null());
        assert!(source.as_raw().is_null());
        assert_eq!(moved.as_raw(), raw);
        drop(source);
        assert_eq!(releases.get(), 0);
        drop(moved);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_com_ptr_release_and_reset() {
        let releases = Rc::new(Cell::new(0));
        let mut ptr = ComPtr::new(Counted::new(&releases));

        let owned = ptr.release();
        assert!(ptr.is_null());
        assert_eq!(releases.get(), 0);

        ptr.reset(owned);
        assert!(!ptr.is_null());
        assert_eq!(releases.get(), 0);

        ptr.reset(Some(Counted::new(&releases)));
        assert_eq!(releases.get(), 1);

        ptr.reset(None);
        assert_eq!(releases.get(), 2);
        drop(ptr);
        assert_eq!(releases.get(), 2);
    }

    #[test]
    fn test_com_ptr_empty_dereference_fails() {
        let ptr: ComPtr<Counted> = ComPtr::default();
        assert!(ptr.get().is_none());
        assert_eq!(ptr.try_get().err(), Some(AudioError::EmptyInterface));
    }

    #[test]
    fn test_com_ptr_compares_addresses() {
        let releases = Rc::new(Cell::new(0));
        let mut a = ComPtr::new(Counted::new(&releases));
        let mut b = ComPtr::new(Counted::new(&releases));
        assert_ne!(a, b);
        assert_eq!(ComPtr::<Counted>::null(), ComPtr::null());
        let ordered = a.as_raw() < b.as_raw();
        assert_eq!(a < b, ordered);

        let (raw_a, raw_b) = (a.as_raw(), b.as_raw());
        a.swap(&mut b);
        assert_eq!(a.as_raw(), raw_b);
        assert_eq!(b.as_raw(), raw_a);
    }

    #[test]
    fn test_task_mem_frees_once() {
        let before = freed();
        {
            let mem = alloc(42);
            assert_eq!(mem.as_ref(), Some(&42));
        }
        assert_eq!(freed(), before + 1);
    }

    #[test]
    fn test_task_mem_null_is_not_freed() {
        let before = freed();
        drop(TaskMem::<u32, BoxAllocator>::null());
        drop(TaskMem::<u32, BoxAllocator>::default());
        assert_eq!(freed(), before);
    }

    #[test]
    fn test_task_mem_release_and_reset() {
        let before = freed();
        let mut mem = alloc(1);
        let raw = mem.release();
        assert!(mem.is_null());
        assert_eq!(freed(), before);

        unsafe { mem.reset(raw) };
        assert_eq!(freed(), before);
        unsafe { mem.reset(Box::into_raw(Box::new(2))) };
        assert_eq!(freed(), before + 1);
        assert_eq!(mem.as_ref(), Some(&2));
        drop(mem);
        assert_eq!(freed(), before + 2);
    }

    #[test]
    fn test_task_mem_swap_moves_ownership() {
        let before = freed();
        let mut a = alloc(1);
        let mut b = TaskMem::null();
        a.swap(&mut b);
        assert!(a.is_null());
        assert_eq!(b.as_ref(), Some(&1));
        drop(a);
        assert_eq!(freed(), before);
        drop(b);
        assert_eq!(freed(), before + 1);
    }

    #[test]
    fn test_wide_string() {
        struct Wide;
        unsafe impl TaskAllocator for Wide {
            unsafe fn free(ptr: *mut c_void) {
                drop(Box::from_raw(ptr.cast::<[u16; 4]>()));
            }
        }

        let buffer: Box<[u16; 4]> = Box::new([b'a' as u16, b'b' as u16, 0, b'z' as u16]);
        let mem: TaskMem<u16, Wide> = unsafe { TaskMem::from_raw(Box::into_raw(buffer).cast()) };
        assert_eq!(unsafe { mem.to_string_lossy() }, "ab");
        assert_eq!(unsafe { TaskMem::<u16, Wide>::null().to_string_lossy() }, "");
    }
}
