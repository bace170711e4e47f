//! Atomic pointers paired with a modification counter.
//!
//! A [`TaggedPtr`] stores a pointer and a 64-bit counter in a single 128-bit
//! atomic word, so that both can be loaded and compare-and-swapped as one unit.
//! Each successful [`try_advance`][TaggedPtr::try_advance] increments the
//! counter, which makes every logical update observably distinct: a stale
//! [`Tagged`] snapshot can never be swapped successfully, even when the
//! snapshot's pointer happens to equal the current one, because its memory
//! was freed and re-allocated in the meantime.

use core::fmt;
use core::marker::PhantomData;

use portable_atomic::{AtomicU128, Ordering};

////////////////////////////////////////////////////////////////////////////////////////////////////
// Tagged
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A snapshot of a [`TaggedPtr`], i.e. a pair of a modification counter and a
/// (possibly `null`) pointer.
pub struct Tagged<T> {
    tag: u64,
    ptr: *mut T,
}

/********** impl Clone ****************************************************************************/

impl<T> Clone for Tagged<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Tagged<T> {}

/********** impl inherent *************************************************************************/

impl<T> Tagged<T> {
    /// Creates a new snapshot value from its components.
    #[inline]
    pub const fn new(tag: u64, ptr: *mut T) -> Self {
        Self { tag, ptr }
    }

    /// Returns the modification counter.
    #[inline]
    pub fn tag(self) -> u64 {
        self.tag
    }

    /// Returns the pointer.
    #[inline]
    pub fn as_ptr(self) -> *mut T {
        self.ptr
    }

    /// Returns `true` if the pointer is `null`.
    #[inline]
    pub fn is_null(self) -> bool {
        self.ptr.is_null()
    }

    /// Returns `true` if both snapshots point at the same address, regardless
    /// of their counters.
    #[inline]
    pub fn ptr_eq(self, other: Self) -> bool {
        self.ptr == other.ptr
    }

    #[inline]
    fn into_raw(self) -> u128 {
        (u128::from(self.tag) << 64) | (self.ptr as usize as u128)
    }

    #[inline]
    fn from_raw(raw: u128) -> Self {
        Self { tag: (raw >> 64) as u64, ptr: raw as usize as *mut T }
    }
}

/********** impl PartialEq ************************************************************************/

impl<T> PartialEq for Tagged<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.ptr == other.ptr
    }
}

impl<T> Eq for Tagged<T> {}

/********** impl Debug ****************************************************************************/

impl<T> fmt::Debug for Tagged<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Tagged").field("tag", &self.tag).field("ptr", &self.ptr).finish()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// TaggedPtr
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An atomic pointer with a modification counter, read and written as a single
/// 128-bit unit.
///
/// Whether the 128-bit compare-and-swap is a native (lock-free) instruction
/// depends on the target and the running CPU, which can be queried through
/// [`is_lock_free`][TaggedPtr::is_lock_free].
/// Where it is not, a lock-based fallback is used for the atomic word, which
/// keeps all operations linearizable, but no longer lock-free.
pub struct TaggedPtr<T> {
    inner: AtomicU128,
    _marker: PhantomData<*mut T>,
}

/********** impl inherent *************************************************************************/

impl<T> TaggedPtr<T> {
    /// Creates a new `null` pointer with a counter of 0.
    #[inline]
    pub const fn null() -> Self {
        Self { inner: AtomicU128::new(0), _marker: PhantomData }
    }

    /// Creates a new tagged pointer to `ptr` with a counter of 0.
    #[inline]
    pub fn new(ptr: *mut T) -> Self {
        Self { inner: AtomicU128::new(Tagged::new(0, ptr).into_raw()), _marker: PhantomData }
    }

    /// Returns `true` if the 128-bit atomic operations are lock-free on the
    /// current CPU.
    #[inline]
    pub fn is_lock_free() -> bool {
        AtomicU128::is_lock_free()
    }

    /// Atomically loads a snapshot of both the counter and the pointer.
    #[inline]
    pub fn read(&self, order: Ordering) -> Tagged<T> {
        Tagged::from_raw(self.inner.load(order))
    }

    /// Reads the current value through an exclusive reference, i.e. without
    /// any synchronization.
    #[inline]
    pub fn read_unsync(&mut self) -> Tagged<T> {
        Tagged::from_raw(*self.inner.get_mut())
    }

    /// Attempts to replace the `current` snapshot with `new`, incrementing the
    /// counter.
    ///
    /// The swap succeeds if and only if both the pointer and the counter are
    /// still equal to those of `current`.
    /// If it fails, the caller has to re-read the pointer and retry.
    /// The counter wraps around on overflow.
    #[inline]
    pub fn try_advance(
        &self,
        current: Tagged<T>,
        new: *mut T,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        let new = Tagged::new(current.tag.wrapping_add(1), new);
        self.inner.compare_exchange(current.into_raw(), new.into_raw(), success, failure).is_ok()
    }

    /// Replaces the pointer through an exclusive reference, incrementing the
    /// counter, and returns the previous pointer.
    #[inline]
    pub fn replace_unsync(&mut self, new: *mut T) -> *mut T {
        let prev = self.read_unsync();
        *self.inner.get_mut() = Tagged::new(prev.tag.wrapping_add(1), new).into_raw();
        prev.ptr
    }
}

/********** impl Default **************************************************************************/

impl<T> Default for TaggedPtr<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

/********** impl Debug ****************************************************************************/

impl<T> fmt::Debug for TaggedPtr<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("TaggedPtr").field(&self.read(Ordering::Relaxed)).finish()
    }
}

/********** impl Send & Sync **********************************************************************/

// the `TaggedPtr` itself only stores an address, which is never de-referenced
unsafe impl<T> Send for TaggedPtr<T> {}
unsafe impl<T> Sync for TaggedPtr<T> {}
