//! The lock-free FIFO queue.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::fmt;
use core::iter::FromIterator;
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::AtomicIsize;

use cfg_if::cfg_if;
use crossbeam_utils::CachePadded;
use portable_atomic::Ordering::{Acquire, Relaxed, Release, SeqCst};

cfg_if! {
    if #[cfg(feature = "std")] {
        use std::alloc::{handle_alloc_error, Layout};
    } else {
        use alloc::alloc::{handle_alloc_error, Layout};
    }
}

use crate::config::Config;
use crate::domain::Domain;
use crate::error::{AllocError, DestroyError};
use crate::node::Node;
use crate::tagged::TaggedPtr;
use crate::CONFIG;

////////////////////////////////////////////////////////////////////////////////////////////////////
// Queue
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A lock-free multi-producer multi-consumer FIFO queue.
///
/// All operations take `&self` and can be called from any number of threads
/// concurrently, except [`destroy`][Queue::destroy], which consumes the queue.
///
/// Elements are handed out by cloning (see the [crate level docs][crate]).
///
/// # Examples
///
/// ```
/// use taskqueue::Queue;
///
/// let queue = Queue::new();
/// queue.enqueue("A").unwrap();
/// queue.enqueue("B").unwrap();
///
/// assert_eq!(queue.peek(), Some("A"));
/// assert_eq!(queue.dequeue(), Some("A"));
/// assert_eq!(queue.dequeue(), Some("B"));
/// assert_eq!(queue.dequeue(), None);
/// assert_eq!(queue.size(), 0);
/// ```
pub struct Queue<T> {
    head: CachePadded<TaggedPtr<Node<T>>>,
    tail: CachePadded<TaggedPtr<Node<T>>>,
    len: AtomicIsize,
    domain: Domain<T>,
    _marker: PhantomData<*mut T>,
}

/********** impl Send + Sync **********************************************************************/

unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send + Sync> Sync for Queue<T> {}

/********** impl inherent *************************************************************************/

impl<T> Queue<T> {
    /// Creates a new empty queue.
    ///
    /// The queue uses the global [`CONFIG`][crate::CONFIG], if it has been
    /// initialized, or the default configuration otherwise.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(CONFIG.try_get().ok().copied().unwrap_or_default())
    }

    /// Creates a new empty queue with the given reclamation `config`.
    #[inline]
    pub fn with_config(config: Config) -> Self {
        let sentinel = Node::sentinel();
        Self {
            head: CachePadded::new(TaggedPtr::new(sentinel)),
            tail: CachePadded::new(TaggedPtr::new(sentinel)),
            len: AtomicIsize::new(0),
            domain: Domain::new(config),
            _marker: PhantomData,
        }
    }

    /// Returns the queue's reclamation configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        self.domain.config()
    }

    /// Returns the number of elements in the queue.
    ///
    /// The count is only advisory: while other threads are concurrently
    /// enqueueing or dequeueing it may be stale, but it is exact once all
    /// operations have completed.
    #[inline]
    pub fn size(&self) -> usize {
        // a dequeue can decrement the count before the matching enqueue has
        // incremented it
        let len = self.len.load(Relaxed);
        if len < 0 {
            0
        } else {
            len as usize
        }
    }

    /// Returns the number of elements in the queue.
    ///
    /// This is the same as [`size`][Queue::size].
    #[inline]
    pub fn len(&self) -> usize {
        self.size()
    }

    /// Returns `true` if the queue contained no elements at the time of the
    /// call.
    #[inline]
    pub fn is_empty(&self) -> bool {
        let mut guard = self.domain.guard();
        let head = guard.protect(&self.head);
        // safety: `head` is never null and is protected from reclamation
        unsafe { (*head.as_ptr()).next.read(Acquire).is_null() }
    }

    /// Appends `elem` to the back of the queue.
    ///
    /// # Errors
    ///
    /// Fails, if no memory can be allocated for the node holding `elem`.
    /// The queue is left unchanged and `elem` can be recovered with
    /// [`AllocError::into_inner`].
    pub fn enqueue(&self, elem: T) -> Result<(), AllocError<T>> {
        let node = Node::try_new(elem).map_err(AllocError)?;
        let mut guard = self.domain.guard();

        loop {
            let tail = guard.protect(&self.tail);
            // safety: `tail` is never null and is protected from reclamation
            let tail_node = unsafe { &*tail.as_ptr() };
            // (QUE:1) this `Acquire` load synchronizes-with the `Release` CAS (QUE:2)
            let next = tail_node.next.read(Acquire);

            if self.tail.read(Acquire) != tail {
                continue;
            }

            if !next.is_null() {
                // another producer has linked its node but not yet swung the tail
                self.tail.try_advance(tail, next.as_ptr(), Release, Relaxed);
                continue;
            }

            // (QUE:2) this `Release` CAS synchronizes-with the `Acquire` loads (QUE:1), (QUE:3)
            if tail_node.next.try_advance(next, node, Release, Relaxed) {
                // failure means some other thread has already swung the tail
                self.tail.try_advance(tail, node, Release, Relaxed);
                break;
            }
        }

        self.len.fetch_add(1, Relaxed);
        Ok(())
    }

    /// Attempts to free all retired nodes that are no longer in use and
    /// returns how many could be freed.
    ///
    /// Nodes are also reclaimed automatically, once the configured
    /// [`scan_threshold`][Config::scan_threshold] is reached.
    #[inline]
    pub fn try_reclaim(&self) -> usize {
        self.domain.reclaim()
    }

    /// Destroys the queue, calling `destructor` on every element that has not
    /// been dequeued, in FIFO order.
    ///
    /// The queue is consumed, so no other thread can still be accessing it.
    /// All nodes are freed, even if `destructor` fails for some elements.
    ///
    /// # Errors
    ///
    /// Fails, if `destructor` returns an error for at least one element.
    /// The returned error contains all of them.
    ///
    /// # Examples
    ///
    /// ```
    /// use taskqueue::Queue;
    ///
    /// let queue = Queue::new();
    /// queue.extend_from(vec![1, 2, 3]);
    ///
    /// let res = queue.destroy(|elem| if elem == 2 { Err("even") } else { Ok(()) });
    /// assert_eq!(res.unwrap_err().errors(), &["even"]);
    /// ```
    pub fn destroy<E>(
        mut self,
        mut destructor: impl FnMut(T) -> Result<(), E>,
    ) -> Result<(), DestroyError<E>> {
        let mut errors = Vec::new();

        // the sentinel's element (if any) has already been dequeued
        let sentinel = self.head.read_unsync().as_ptr();
        let mut curr = unsafe { (*sentinel).next.read_unsync().as_ptr() };
        while !curr.is_null() {
            // safety: the queue is exclusively owned, so all nodes can be mutated
            let node = unsafe { &mut *curr };
            if let Some(elem) = node.elem.take() {
                if let Err(err) = destructor(elem) {
                    errors.push(err);
                }
            }

            curr = node.next.read_unsync().as_ptr();
        }

        drop(self);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DestroyError::new(errors))
        }
    }

    /// Enqueues all elements of `iter` through a shared reference.
    ///
    /// Aborts the process through [`handle_alloc_error`], if a node can not
    /// be allocated, like other collections do.
    #[inline]
    pub fn extend_from<I: IntoIterator<Item = T>>(&self, iter: I) {
        for elem in iter {
            if self.enqueue(elem).is_err() {
                handle_alloc_error(Layout::new::<Node<T>>());
            }
        }
    }
}

impl<T: Clone> Queue<T> {
    /// Removes the element at the front of the queue and returns it, or `None`
    /// if the queue is empty.
    ///
    /// The queue's own copy of the element is dropped, once the node holding
    /// it is reclaimed.
    pub fn dequeue(&self) -> Option<T> {
        let mut head_guard = self.domain.guard();
        let mut next_guard = self.domain.guard();

        loop {
            let head = head_guard.protect(&self.head);
            let tail = self.tail.read(Acquire);
            // safety: `head` is never null and is protected from reclamation
            // (QUE:3) this `Acquire` load synchronizes-with the `Release` CAS (QUE:2)
            let next = unsafe { (*head.as_ptr()).next.read(Acquire) };
            next_guard.protect_ptr(next.as_ptr());

            // if `head` is still current, `next` is reachable and was protected
            // before it could have been retired
            if self.head.read(SeqCst) != head {
                continue;
            }

            if head.ptr_eq(tail) {
                if next.is_null() {
                    return None;
                }

                // the tail lags behind a node that is linked but not yet swung to
                self.tail.try_advance(tail, next.as_ptr(), Release, Relaxed);
                continue;
            }

            debug_assert!(!next.is_null(), "head behind tail must have a successor");
            if self.head.try_advance(head, next.as_ptr(), Release, Relaxed) {
                // safety: `next` is protected and becomes the new sentinel, its
                // element is only read, never mutated
                let elem = unsafe { (*next.as_ptr()).elem.clone() };
                self.len.fetch_sub(1, Relaxed);

                head_guard.release();
                // safety: the old head is unlinked and only retired by the
                // thread that unlinked it
                unsafe { self.domain.retire(head.as_ptr()) };

                debug_assert!(elem.is_some(), "non-sentinel nodes always hold an element");
                return elem;
            }
        }
    }

    /// Returns a clone of the element at the front of the queue, or `None` if
    /// the queue is empty.
    ///
    /// The element is not removed and may be dequeued by another thread at
    /// any time after the call.
    pub fn peek(&self) -> Option<T> {
        let mut head_guard = self.domain.guard();
        let mut next_guard = self.domain.guard();

        loop {
            let head = head_guard.protect(&self.head);
            // safety: `head` is never null and is protected from reclamation
            let next = unsafe { (*head.as_ptr()).next.read(Acquire) };
            if next.is_null() {
                return None;
            }

            next_guard.protect_ptr(next.as_ptr());
            if self.head.read(SeqCst) != head {
                continue;
            }

            // safety: `next` is protected and was reachable after being protected
            return unsafe { (*next.as_ptr()).elem.clone() };
        }
    }
}

/********** impl Default **************************************************************************/

impl<T> Default for Queue<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/********** impl Debug ****************************************************************************/

impl<T> fmt::Debug for Queue<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Queue")
            .field("len", &self.size())
            .field("config", self.config())
            .field("pending_reclamation", &self.domain.pending())
            .finish()
    }
}

/********** impl Extend ***************************************************************************/

impl<T> Extend<T> for Queue<T> {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.extend_from(iter);
    }
}

/********** impl FromIterator *********************************************************************/

impl<T> FromIterator<T> for Queue<T> {
    #[inline]
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let queue = Self::new();
        queue.extend_from(iter);
        queue
    }
}

/********** impl Drop *****************************************************************************/

impl<T> Drop for Queue<T> {
    #[inline(never)]
    fn drop(&mut self) {
        // frees the sentinel and all linked nodes, retired nodes are freed by
        // the domain
        self.tail.replace_unsync(ptr::null_mut());
        let mut curr = self.head.replace_unsync(ptr::null_mut());
        while !curr.is_null() {
            unsafe {
                let next = (*curr).next.replace_unsync(ptr::null_mut());
                Node::free(curr);
                curr = next;
            }
        }
    }
}
