//! Hazard pointers for protecting queue nodes from reclamation.

mod list;

use core::cmp;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicPtr, Ordering};

pub(crate) use self::list::HazardList;

/// State of a hazard pointer that is free and can be acquired by any guard.
const FREE: *mut () = 0 as *mut ();
/// State of a hazard pointer that is acquired by a guard but does not
/// currently protect any node.
const RESERVED: *mut () = 1 as *mut ();

////////////////////////////////////////////////////////////////////////////////////////////////////
// HazardPtr
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A pointer that must be visible to all threads, which indicates that the
/// currently pointed-to node is in use by some thread and therefore protected
/// from reclamation, i.e. it must not be de-allocated.
#[derive(Debug)]
pub(crate) struct HazardPtr {
    protected: AtomicPtr<()>,
}

/********** impl inherent *************************************************************************/

impl HazardPtr {
    /// Creates a new [`HazardPtr`] that is already reserved.
    ///
    /// Hazards are only ever created on demand by the guard that needs them,
    /// so a new hazard is never free.
    #[inline]
    pub const fn reserved() -> Self {
        Self { protected: AtomicPtr::new(RESERVED) }
    }

    /// Sets the [`HazardPtr`] free, meaning it can be acquired by other guards
    /// and the previous value is no longer protected.
    #[inline]
    pub fn set_free(&self, order: Ordering) {
        self.protected.store(FREE, order);
    }

    /// Sets the [`HazardPtr`] as reserved, meaning the previous value is no
    /// longer protected but the pointer is still owned by its guard.
    #[inline]
    pub fn set_reserved(&self, order: Ordering) {
        self.protected.store(RESERVED, order);
    }

    /// Publishes `protected` as being in use.
    #[inline]
    pub fn set_protected(&self, protected: NonNull<()>, order: Ordering) {
        debug_assert_eq!(order, Ordering::SeqCst, "this method requires sequential consistency");
        self.protected.store(protected.as_ptr(), Ordering::SeqCst);
    }

    /// Returns the protected pointer, if there is one.
    #[inline]
    pub fn protected(&self, order: Ordering) -> Option<ProtectedPtr> {
        let ptr = self.protected.load(order);
        if ptr == FREE || ptr == RESERVED {
            None
        } else {
            // safety: null is covered by `FREE`
            Some(ProtectedPtr(unsafe { NonNull::new_unchecked(ptr) }))
        }
    }

    /// Attempts to acquire the hazard pointer, if it is currently free.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.protected.load(Ordering::Relaxed) == FREE
            && self
                .protected
                .compare_exchange(FREE, RESERVED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// ProtectedPtr
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An untyped pointer protected from reclamation, because it is stored within a hazard pointer.
///
/// The type information is stripped as it is not needed in order to determine whether a node is
/// protected or not.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub(crate) struct ProtectedPtr(NonNull<()>);

/********** impl inherent *************************************************************************/

impl ProtectedPtr {
    /// Compares the protected address with `ptr`.
    #[inline]
    pub fn compare_with(self, ptr: *const ()) -> cmp::Ordering {
        (self.0.as_ptr() as *const ()).cmp(&ptr)
    }
}

#[cfg(test)]
mod tests {
    use core::ptr::NonNull;
    use core::sync::atomic::Ordering;

    use super::HazardPtr;

    #[test]
    fn hazard_ptr() {
        let hazard = HazardPtr::reserved();
        assert!(hazard.protected(Ordering::Relaxed).is_none());
        hazard.set_protected(NonNull::from(&mut 1).cast(), Ordering::SeqCst);
        assert!(hazard.protected(Ordering::Relaxed).is_some());
        hazard.set_reserved(Ordering::Relaxed);
        assert!(hazard.protected(Ordering::Relaxed).is_none());
        hazard.set_free(Ordering::Relaxed);
        assert!(hazard.protected(Ordering::Relaxed).is_none());
    }

    #[test]
    fn acquire() {
        let hazard = HazardPtr::reserved();
        // a reserved hazard can not be acquired twice
        assert!(!hazard.try_acquire());
        hazard.set_free(Ordering::Relaxed);
        assert!(hazard.try_acquire());
        assert!(!hazard.try_acquire());

        // neither can a hazard that protects some node
        hazard.set_protected(NonNull::from(&mut 1).cast(), Ordering::SeqCst);
        assert!(!hazard.try_acquire());
    }

    #[test]
    fn compare_with() {
        let mut value = 1;
        let ptr = NonNull::from(&mut value).cast::<()>();
        let hazard = HazardPtr::reserved();
        hazard.set_protected(ptr, Ordering::SeqCst);

        let protected = hazard.protected(Ordering::Relaxed).unwrap();
        assert_eq!(protected.compare_with(ptr.as_ptr()), core::cmp::Ordering::Equal);
        let addr = &value as *const i32 as *const ();
        assert_eq!(protected.compare_with(addr), core::cmp::Ordering::Equal);
    }
}
