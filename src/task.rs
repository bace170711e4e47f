//! The unit of deferred work handed off through a [`TaskQueue`][crate::TaskQueue].

use core::fmt;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use std::sync::Arc;
    } else {
        use alloc::sync::Arc;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Task
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A callable together with its argument.
///
/// The queue never invokes a task, it only stores it and hands it back.
/// Cloning a task is cheap and all clones refer to the same callable, so the
/// clone returned by [`peek`][crate::Queue::peek] and the one returned by
/// [`dequeue`][crate::Queue::dequeue] run the same work.
/// Dropping the last clone drops the callable and its argument.
#[derive(Clone)]
pub struct Task(Arc<dyn Fn() + Send + Sync>);

/********** impl inherent *************************************************************************/

impl Task {
    /// Creates a new task that calls `func` with a reference to `arg`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// use taskqueue::Task;
    ///
    /// let counter = Arc::new(AtomicUsize::new(0));
    /// let increment = |counter: &Arc<AtomicUsize>| {
    ///     counter.fetch_add(1, Ordering::Relaxed);
    /// };
    /// let task = Task::new(increment, Arc::clone(&counter));
    ///
    /// task.run();
    /// task.run();
    /// assert_eq!(counter.load(Ordering::Relaxed), 2);
    /// ```
    #[inline]
    pub fn new<F, A>(func: F, arg: A) -> Self
    where
        F: Fn(&A) + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        Self(Arc::new(move || func(&arg)))
    }

    /// Creates a new task from a closure that captures its own state.
    #[inline]
    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(func))
    }

    /// Runs the task.
    #[inline]
    pub fn run(&self) {
        (self.0)()
    }

    /// Returns `true` if both tasks are clones of the same task.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/********** impl Debug ****************************************************************************/

impl fmt::Debug for Task {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Task").field(&(Arc::as_ptr(&self.0) as *const ())).finish()
    }
}
