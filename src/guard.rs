use core::ptr::NonNull;

use portable_atomic::Ordering;

use crate::hazard::HazardPtr;
use crate::tagged::{Tagged, TaggedPtr};

////////////////////////////////////////////////////////////////////////////////////////////////////
// Guard
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An acquired hazard pointer, which can protect one node at a time.
///
/// The hazard is given back to its list when the guard is dropped.
#[derive(Debug)]
pub(crate) struct Guard<'d> {
    hazard: &'d HazardPtr,
}

/********** impl inherent *************************************************************************/

impl<'d> Guard<'d> {
    /// Creates a new guard from a reserved `hazard`.
    #[inline]
    pub fn new(hazard: &'d HazardPtr) -> Self {
        Self { hazard }
    }

    /// Loads a snapshot of `tagged` and protects its pointer.
    ///
    /// When this returns, the pointed-to node is protected from reclamation
    /// and was reachable through `tagged` at some point after the protection
    /// became visible to all threads.
    /// A `null` snapshot releases any previous protection.
    #[inline]
    pub fn protect<T>(&mut self, tagged: &TaggedPtr<T>) -> Tagged<T> {
        let mut curr = tagged.read(Ordering::Relaxed);
        loop {
            match NonNull::new(curr.as_ptr()) {
                None => {
                    self.release();
                    return curr;
                }
                Some(ptr) => {
                    self.hazard.set_protected(ptr.cast(), Ordering::SeqCst);
                    let reread = tagged.read(Ordering::SeqCst);
                    if reread.ptr_eq(curr) {
                        return reread;
                    }

                    curr = reread;
                }
            }
        }
    }

    /// Protects `ptr` without validating it.
    ///
    /// The caller has to validate afterwards that `ptr` is still reachable,
    /// before de-referencing it.
    #[inline]
    pub fn protect_ptr<T>(&mut self, ptr: *mut T) {
        match NonNull::new(ptr) {
            Some(ptr) => self.hazard.set_protected(ptr.cast(), Ordering::SeqCst),
            None => self.release(),
        }
    }

    /// Releases the currently protected pointer, if there is one.
    #[inline]
    pub fn release(&mut self) {
        self.hazard.set_reserved(Ordering::Release);
    }
}

/********** impl Drop *****************************************************************************/

impl Drop for Guard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.hazard.set_free(Ordering::Release);
    }
}
