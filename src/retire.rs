//! Storage for retired nodes until they can be safely reclaimed.
//!
//! A node is retired once it has been unlinked from the queue's chain, at
//! which point no thread can acquire a new reference to it, but threads that
//! loaded it earlier may still be reading it.
//! Retired nodes are pushed onto a shared lock-free stack, linked through the
//! intrusive header field of each node.
//! A reclaiming thread takes the entire stack at once, frees every node that is
//! not protected by any hazard pointer and pushes the remaining ones back.

use core::ptr;

use crate::hazard::ProtectedPtr;
use crate::node::Node;
use crate::stack::{RawNode, RawStack};

////////////////////////////////////////////////////////////////////////////////////////////////////
// RetiredList
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A linked-list based stack for storing retired nodes.
#[derive(Debug)]
pub(crate) struct RetiredList<T> {
    raw: RawStack<Node<T>>,
}

/********** impl inherent *************************************************************************/

impl<T> RetiredList<T> {
    /// Creates a new empty `RetiredList`.
    #[inline]
    pub const fn new() -> Self {
        Self { raw: RawStack::new() }
    }

    /// Returns `true` if there are no retired nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Pushes `node` into the list of retired nodes.
    ///
    /// # Safety
    ///
    /// `node` must be valid and unlinked from the queue, i.e. no thread may be
    /// able to acquire a new reference to it, and it must not be retired
    /// twice.
    #[inline]
    pub unsafe fn retire(&self, node: *mut Node<T>) {
        self.raw.push(node);
    }

    /// Takes all currently retired nodes out of the list.
    #[inline]
    pub fn take_all(&self) -> Taken<T> {
        Taken { curr: self.raw.take_all() }
    }

    /// Pushes all nodes that could not be reclaimed during a scan back into the
    /// list.
    #[inline]
    pub fn push_back_unreclaimed(&self, unreclaimed: Unreclaimed<T>) {
        unsafe { self.raw.push_many((unreclaimed.first, unreclaimed.last)) };
    }
}

/********** impl Drop *****************************************************************************/

impl<T> Drop for RetiredList<T> {
    #[inline(never)]
    fn drop(&mut self) {
        // when the owning queue is dropped, there can be no longer any active
        // threads accessing it and all remaining nodes can be simply freed
        let mut curr = self.raw.take_all_unsync();
        while !curr.is_null() {
            unsafe {
                let next = Node::link(curr);
                Node::free(curr);
                curr = next;
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Taken
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The retired nodes taken out of a [`RetiredList`] by a reclaiming thread.
#[derive(Debug)]
#[must_use = "taken nodes must either be reclaimed or pushed back"]
pub(crate) struct Taken<T> {
    curr: *mut Node<T>,
}

/********** impl inherent *************************************************************************/

impl<T> Taken<T> {
    /// Frees all nodes whose addresses are not contained in the sorted
    /// `scan_cache` of protected pointers.
    ///
    /// # Safety
    ///
    /// `scan_cache` must be sorted and must contain every pointer that was
    /// protected by any hazard pointer at some point after all taken nodes
    /// had been retired.
    pub unsafe fn reclaim_all_unprotected(mut self, scan_cache: &[ProtectedPtr]) -> Scanned<T> {
        // these pointers will form the list of unreclaimed nodes that need to be pushed back
        let (mut first, mut last): (*mut Node<T>, *mut Node<T>) =
            (ptr::null_mut(), ptr::null_mut());
        let mut reclaimed = 0;

        while !self.curr.is_null() {
            // the link must be read HERE because `curr` may be de-allocated in the next step
            let next = Node::link(self.curr);
            let addr = self.curr.cast::<()>();
            match scan_cache.binary_search_by(|protected| protected.compare_with(addr)) {
                // the node is still protected by some hazard pointer
                Ok(_) => {
                    if first.is_null() {
                        first = self.curr;
                    } else {
                        Node::set_link(last, self.curr);
                    }

                    last = self.curr;
                }
                // the node can be reclaimed
                Err(_) => {
                    Node::free(self.curr);
                    reclaimed += 1;
                }
            }

            self.curr = next;
        }

        let unreclaimed = if first.is_null() { None } else { Some(Unreclaimed { first, last }) };
        Scanned { reclaimed, unreclaimed }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Scanned
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The outcome of a reclamation attempt.
#[derive(Debug)]
pub(crate) struct Scanned<T> {
    /// The number of freed nodes.
    pub reclaimed: u32,
    /// The nodes that are still protected, if there are any.
    pub unreclaimed: Option<Unreclaimed<T>>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Unreclaimed
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A consecutively linked sub-list of nodes that could not be reclaimed.
#[derive(Debug)]
pub(crate) struct Unreclaimed<T> {
    first: *mut Node<T>,
    last: *mut Node<T>,
}
