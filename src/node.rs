//! The nodes forming the queue's linked chain.

use core::cell::UnsafeCell;
use core::ptr;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use std::alloc::{alloc as raw_alloc, handle_alloc_error, Layout};
    } else {
        use alloc::alloc::{alloc as raw_alloc, handle_alloc_error, Layout};
        use alloc::boxed::Box;
    }
}

use crate::stack::RawNode;
use crate::tagged::TaggedPtr;

////////////////////////////////////////////////////////////////////////////////////////////////////
// Node
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A heap allocated record in the queue's chain.
///
/// The first node in the chain is always the sentinel, whose `elem` has either
/// never been set (the initial sentinel) or has already been handed out by a
/// `dequeue`.
/// The `next` link is set exactly once, from `null` to the node's successor.
#[derive(Debug)]
pub(crate) struct Node<T> {
    /// The link to the next node in the chain.
    pub next: TaggedPtr<Node<T>>,
    /// The element, which is only dropped when the node is reclaimed.
    pub elem: Option<T>,
    /// The intrusive link in the stack of retired nodes, which is only ever
    /// accessed by the thread retiring or reclaiming the node.
    retired: UnsafeCell<*mut Node<T>>,
}

/********** impl inherent *************************************************************************/

impl<T> Node<T> {
    /// Allocates a new sentinel node, which holds no element.
    ///
    /// Aborts the process if the allocation fails, like all infallible
    /// allocations do.
    #[inline]
    pub fn sentinel() -> *mut Self {
        match Self::allocate() {
            Some(node) => unsafe { Self::init(node, None) },
            None => handle_alloc_error(Layout::new::<Self>()),
        }
    }

    /// Attempts to allocate a new node holding `elem`.
    ///
    /// # Errors
    ///
    /// Fails and returns `elem` if the allocator is unable to supply memory.
    #[inline]
    pub fn try_new(elem: T) -> Result<*mut Self, T> {
        match Self::allocate() {
            Some(node) => Ok(unsafe { Self::init(node, Some(elem)) }),
            None => Err(elem),
        }
    }

    /// Frees `node` and drops its element, if there is one.
    ///
    /// # Safety
    ///
    /// `node` must have been allocated by [`try_new`][Node::try_new] or
    /// [`sentinel`][Node::sentinel] and must not be accessed by any other
    /// thread anymore.
    #[inline]
    pub unsafe fn free(node: *mut Self) {
        #[cfg(test)]
        alloc_stats::on_free();
        drop(Box::from_raw(node));
    }

    #[inline]
    fn allocate() -> Option<*mut Self> {
        #[cfg(test)]
        {
            if !alloc_stats::on_alloc() {
                return None;
            }
        }

        // safety: `Self` is never zero-sized, since it contains the `next` pointer
        let node = unsafe { raw_alloc(Layout::new::<Self>()) } as *mut Self;
        if node.is_null() {
            #[cfg(test)]
            alloc_stats::on_free();
            return None;
        }

        Some(node)
    }

    #[inline]
    unsafe fn init(node: *mut Self, elem: Option<T>) -> *mut Self {
        let retired = UnsafeCell::new(ptr::null_mut());
        node.write(Self { next: TaggedPtr::null(), elem, retired });
        node
    }
}

/********** impl RawNode **************************************************************************/

impl<T> RawNode for Node<T> {
    #[inline]
    unsafe fn link(node: *mut Self) -> *mut Self {
        *(*node).retired.get()
    }

    #[inline]
    unsafe fn set_link(node: *mut Self, link: *mut Self) {
        *(*node).retired.get() = link;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// alloc_stats
////////////////////////////////////////////////////////////////////////////////////////////////////


#[cfg(test)]
mod tests {
    use super::{alloc_stats, Node};

    #[test]
    fn alloc_and_free() {
        let before = alloc_stats::live_nodes();

        let sentinel: *mut Node<i32> = Node::sentinel();
        let node = Node::try_new(1).unwrap();
        assert_eq!(alloc_stats::live_nodes(), before + 2);

        unsafe {
            assert!((*sentinel).elem.is_none());
            assert_eq!((*node).elem, Some(1));
            assert!((*node).next.read(portable_atomic::Ordering::Relaxed).is_null());

            Node::free(sentinel);
            Node::free(node);
        }

        assert_eq!(alloc_stats::live_nodes(), before);
    }

    #[test]
    fn failed_alloc_returns_elem() {
        let before = alloc_stats::live_nodes();

        alloc_stats::fail_next_alloc();
        let res = Node::try_new(String::from("task"));
        assert_eq!(res.unwrap_err(), "task");
        assert_eq!(alloc_stats::live_nodes(), before);

        // only a single allocation fails
        let node = Node::try_new(String::from("task")).unwrap();
        unsafe { Node::free(node) };
    }
}
