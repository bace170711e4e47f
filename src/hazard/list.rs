//! Linked list of hazard pointers, which only ever grows.

use core::iter::FusedIterator;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

use crossbeam_utils::CachePadded;

use crate::hazard::HazardPtr;

////////////////////////////////////////////////////////////////////////////////////////////////////
// HazardList
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A linked list of [`HazardNode`]s containing re-usable hazard pointers.
///
/// When requesting a hazard pointer, the list is traversed from head to tail
/// and each node is checked for a free hazard pointer.
/// If none can be found a new node is appended to the list's tail.
/// In order to avoid having to deal with memory reclamation for the list
/// itself, it never shrinks and maintains its maximum extent until it is
/// dropped together with the queue owning it.
#[derive(Debug, Default)]
pub(crate) struct HazardList {
    head: AtomicPtr<HazardNode>,
}

/********** impl inherent *************************************************************************/

impl HazardList {
    /// Creates a new empty list.
    #[inline]
    pub const fn new() -> Self {
        Self { head: AtomicPtr::new(ptr::null_mut()) }
    }

    /// Returns an iterator over all hazard pointers in the list.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        // (LIS:1) this `Acquire` load synchronizes-with the `Release` CAS (LIS:2)
        Iter { curr: unsafe { self.head.load(Ordering::Acquire).as_ref() } }
    }

    /// Acquires a free hazard pointer, which is initially reserved and does not
    /// protect anything.
    #[must_use = "discarding a reserved hazard pointer without freeing it renders it unusable"]
    pub fn acquire_hazard(&self) -> &HazardPtr {
        let mut prev = &self.head;
        let mut curr = self.head.load(Ordering::Acquire);

        while let Some(node) = unsafe { curr.as_ref() } {
            if node.hazard.try_acquire() {
                return &*node.hazard;
            }

            prev = &node.next;
            curr = node.next.load(Ordering::Acquire);
        }

        self.insert_back(prev)
    }

    #[cold]
    fn insert_back<'a>(&'a self, mut tail: &'a AtomicPtr<HazardNode>) -> &'a HazardPtr {
        let node = Box::into_raw(Box::new(HazardNode {
            hazard: CachePadded::new(HazardPtr::reserved()),
            next: CachePadded::new(AtomicPtr::default()),
        }));

        loop {
            // (LIS:2) this `Release` CAS ensures the allocation (write) is published and
            // synchronizes-with all `Acquire` loads of the same `next` field
            match tail.compare_exchange(ptr::null_mut(), node, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => return unsafe { &*(*node).hazard },
                Err(curr) => tail = unsafe { &(*curr).next },
            }
        }
    }
}

/********** impl Drop *****************************************************************************/

impl Drop for HazardList {
    #[inline(never)]
    fn drop(&mut self) {
        // `Relaxed` ordering is sufficient here because no other threads have access during `drop`
        let mut curr = self.head.load(Ordering::Relaxed);
        while !curr.is_null() {
            let node = unsafe { Box::from_raw(curr) };
            curr = node.next.load(Ordering::Relaxed);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Iter
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Iterator over all hazard pointers in a [`HazardList`].
#[derive(Debug)]
pub(crate) struct Iter<'a> {
    curr: Option<&'a HazardNode>,
}

/********** impl Iterator *************************************************************************/

impl<'a> Iterator for Iter<'a> {
    type Item = &'a HazardPtr;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let next = self.curr.take();
        if let Some(node) = next {
            // (LIS:3) this `Acquire` load synchronizes-with the `Release` CAS (LIS:2)
            self.curr = unsafe { node.next.load(Ordering::Acquire).as_ref() };
        }

        next.map(|node| &*node.hazard)
    }
}

/********** impl FusedIterator ********************************************************************/

impl FusedIterator for Iter<'_> {}

////////////////////////////////////////////////////////////////////////////////////////////////////
// HazardNode
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
struct HazardNode {
    hazard: CachePadded<HazardPtr>,
    next: CachePadded<AtomicPtr<HazardNode>>,
}
