//! A simple lock-free stack that uses *compare-and-swap* to insert elements at
//! the head and *swap* (exchange) to consume all elements at once, thereby not
//! requiring any dedicated memory reclamation mechanism itself.
//!
//! Retired queue nodes are collected in such a stack until they can be
//! reclaimed.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

////////////////////////////////////////////////////////////////////////////////////////////////////
// RawNode (trait)
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A trait for node types that contain an intrusive link and can be accessed
/// through raw pointers.
pub(crate) trait RawNode {
    /// Returns the `node`'s link pointer.
    ///
    /// # Safety
    ///
    /// The caller has to ensure `node` is a valid pointer to a node and that
    /// no other thread accesses its link concurrently.
    unsafe fn link(node: *mut Self) -> *mut Self;

    /// Sets the `node`'s link pointer to `link`.
    ///
    /// # Safety
    ///
    /// The caller has to ensure `node` is a valid pointer to a node and that
    /// no other thread accesses its link concurrently.
    unsafe fn set_link(node: *mut Self, link: *mut Self);
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// RawStack
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A concurrent linked-list based stack operating on raw pointers.
///
/// Elements are inserted at the front and can only be removed all at once by
/// returning the first node, which contains a link to the next node and so on,
/// and switching the stack to empty.
#[derive(Debug)]
pub(crate) struct RawStack<N> {
    head: AtomicPtr<N>,
}

/********** impl inherent *************************************************************************/

impl<N> RawStack<N> {
    /// Creates a new empty `RawStack`.
    #[inline]
    pub const fn new() -> Self {
        Self { head: AtomicPtr::new(ptr::null_mut()) }
    }
}

impl<N: RawNode> RawStack<N> {
    /// Returns `true` if the stack is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).is_null()
    }

    /// Pushes `node` to the head of the stack.
    ///
    /// # Safety
    ///
    /// `node` must be non-null and valid and its link must not be accessed by
    /// any other thread.
    #[inline]
    pub unsafe fn push(&self, node: *mut N) {
        self.push_many((node, node));
    }

    /// Pushes the sub-list formed by `first` and `last` to the head of the
    /// stack.
    ///
    /// # Safety
    ///
    /// `(first, last)` must form the head and the tail of a consecutively
    /// linked sub-list.
    /// Both must be non-null and valid.
    #[inline]
    pub unsafe fn push_many(&self, (first, last): (*mut N, *mut N)) {
        loop {
            let head = self.head.load(Ordering::Relaxed);
            N::set_link(last, head);

            // (STA:1) this `Release` CAS synchronizes-with the `Acquire` swap (STA:2)
            if self
                .head
                .compare_exchange_weak(head, first, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Swaps out the first node and leaves the `RawStack` empty.
    ///
    /// The returned node (if it is non-`null`) effectively owns all following
    /// nodes and can deallocate or mutate them as desired.
    #[inline]
    pub fn take_all(&self) -> *mut N {
        // (STA:2) this `Acquire` swap synchronizes-with the `Release` CAS (STA:1)
        self.head.swap(ptr::null_mut(), Ordering::Acquire)
    }

    /// Same as take all, but without synchronization or ordering constraints.
    /// Requires exclusive access through the `&mut self` receiver.
    #[inline]
    pub fn take_all_unsync(&mut self) -> *mut N {
        self.head.swap(ptr::null_mut(), Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use super::{RawNode, RawStack};

    struct Link {
        id: usize,
        link: *mut Link,
    }

    impl RawNode for Link {
        unsafe fn link(node: *mut Self) -> *mut Self {
            (*node).link
        }

        unsafe fn set_link(node: *mut Self, link: *mut Self) {
            (*node).link = link;
        }
    }

    fn collect(mut curr: *mut Link) -> Vec<usize> {
        let mut ids = Vec::new();
        while !curr.is_null() {
            let boxed = unsafe { Box::from_raw(curr) };
            ids.push(boxed.id);
            curr = boxed.link;
        }

        ids
    }

    #[test]
    fn push_and_take_all() {
        let stack = RawStack::new();
        assert!(stack.is_empty());

        for id in 0..4 {
            let node = Box::into_raw(Box::new(Link { id, link: ptr::null_mut() }));
            unsafe { stack.push(node) };
        }

        assert!(!stack.is_empty());
        assert_eq!(collect(stack.take_all()), vec![3, 2, 1, 0]);
        assert!(stack.is_empty());
        assert!(stack.take_all().is_null());
    }

    #[test]
    fn push_many() {
        let mut stack = RawStack::new();
        let last = Box::into_raw(Box::new(Link { id: 1, link: ptr::null_mut() }));
        let first = Box::into_raw(Box::new(Link { id: 0, link: last }));

        unsafe { stack.push(Box::into_raw(Box::new(Link { id: 2, link: ptr::null_mut() }))) };
        unsafe { stack.push_many((first, last)) };

        assert_eq!(collect(stack.take_all_unsync()), vec![0, 1, 2]);
    }
}
