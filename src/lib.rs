//! A lock-free FIFO queue for handing off tasks to the workers of a thread
//! pool.
//!
//! Producers [`enqueue`][Queue::enqueue] units of deferred work and worker
//! threads [`dequeue`][Queue::dequeue] and execute them, without any thread
//! ever blocking on a lock.
//! The queue is the classic two-pointer linked list design by Michael and
//! Scott [[1]]: a singly linked chain of nodes that always starts with a
//! *sentinel* node, a `head` pointing at the sentinel and a `tail` pointing at
//! (or lagging at most one link behind) the last node.
//!
//! # Tagged Endpoints
//!
//! Both `head` and `tail`, as well as the `next` link of every node, are
//! [`TaggedPtr`]s: a pointer paired with a 64-bit modification counter, which
//! are read and compare-and-swapped as one 128-bit unit.
//! Every successful update increments the counter, so two reads yielding equal
//! [`Tagged`] snapshots denote the same logical state, even if the pointed-to
//! node was freed and a new node was allocated at the same address in between
//! (the *ABA* hazard).
//!
//! # Memory Reclamation
//!
//! Nodes removed from the chain can not be freed right away, because other
//! threads may still be about to read them through a snapshot they took before
//! the node was unlinked.
//! Every queue therefore owns a hazard pointer reclamation domain [[2]]:
//! before any thread dereferences a node, it publishes the node's address in a
//! hazard pointer and re-validates that the node is still reachable.
//! Unlinked nodes are *retired* and only freed after a scan of all hazard
//! pointers determined that no thread protects them anymore.
//! Scans are triggered after a configurable number of retirements (see
//! [`Config`]) or explicitly through [`Queue::try_reclaim`].
//!
//! # Elements
//!
//! Dequeued and peeked elements are handed out as clones, while the queue's
//! own copy lives on until its node is reclaimed.
//! This is what allows [`peek`][Queue::peek] to return an element that a
//! concurrent `dequeue` is removing at the same time.
//! The intended element type is [`Task`], a reference-counted callable whose
//! clones are cheap.
//!
//! [1]: https://dl.acm.org/citation.cfm?id=248106
//! [2]: https://dl.acm.org/citation.cfm?id=987595

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

mod config;
mod domain;
mod error;
mod guard;
mod hazard;
mod node;
mod queue;
mod retire;
mod stack;
mod tagged;
mod task;

use cfg_if::cfg_if;

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{AllocError, DestroyError};
pub use crate::queue::Queue;
pub use crate::tagged::{Tagged, TaggedPtr};
pub use crate::task::Task;

cfg_if! {
    if #[cfg(feature = "std")] {
        use conquer_once::OnceCell;
    } else {
        use conquer_once::spin::OnceCell;
    }
}

/// A [`Queue`] of [`Task`]s, as it is used by a thread pool.
pub type TaskQueue = Queue<Task>;

/// Global one-time configuration for the reclamation parameters of all queues
/// created through [`Queue::new`].
///
/// Queues created before the configuration is initialized use
/// [`Config::default`].
pub static CONFIG: OnceCell<Config> = OnceCell::uninit();

// The ThreadSanitizer can not correctly asses ordering restraints from explicit
// fences, so loads following such fences need stricter ordering than
// `Relaxed`, when instrumentation is chosen.

#[cfg(not(feature = "sanitize-threads"))]
mod sanitize {
    use core::sync::atomic::Ordering;

    pub const RELAXED_LOAD: Ordering = Ordering::Relaxed;
}

#[cfg(feature = "sanitize-threads")]
mod sanitize {
    use core::sync::atomic::Ordering;

    pub const RELAXED_LOAD: Ordering = Ordering::Acquire;
}
