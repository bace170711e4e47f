//! Error types returned by queue operations.

#[cfg(feature = "std")]
use std::error;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::fmt;

////////////////////////////////////////////////////////////////////////////////////////////////////
// AllocError
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Error type for an [`enqueue`][crate::Queue::enqueue] that failed to
/// allocate a node.
///
/// The queue is left unchanged and the element is handed back.
#[derive(Copy, Clone, Eq, Ord, PartialEq, PartialOrd)]
pub struct AllocError<T>(pub(crate) T);

/********** impl inherent *************************************************************************/

impl<T> AllocError<T> {
    /// Returns the element that could not be enqueued.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

/********** impl Debug ****************************************************************************/

impl<T> fmt::Debug for AllocError<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AllocError").finish()
    }
}

/********** impl Display **************************************************************************/

impl<T> fmt::Display for AllocError<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "failed to allocate queue node")
    }
}

/********** impl Error ****************************************************************************/

#[cfg(feature = "std")]
impl<T> error::Error for AllocError<T> {}

////////////////////////////////////////////////////////////////////////////////////////////////////
// DestroyError
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Error type for a [`destroy`][crate::Queue::destroy], in which the
/// destructor failed for at least one of the remaining elements.
///
/// All nodes are freed regardless, the error only reports the destructor's
/// failures in the order they occurred.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DestroyError<E> {
    errors: Vec<E>,
}

/********** impl inherent *************************************************************************/

impl<E> DestroyError<E> {
    #[inline]
    pub(crate) fn new(errors: Vec<E>) -> Self {
        debug_assert!(!errors.is_empty());
        Self { errors }
    }

    /// Returns the errors returned by the destructor.
    #[inline]
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    /// Consumes the error and returns the errors returned by the destructor.
    #[inline]
    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }
}

/********** impl Display **************************************************************************/

impl<E: fmt::Display> fmt::Display for DestroyError<E> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "failed to destroy queued elements"),
            [err] => write!(f, "failed to destroy queued element: {}", err),
            [first, ..] => write!(
                f,
                "failed to destroy {} queued elements, first error: {}",
                self.errors.len(),
                first
            ),
        }
    }
}

/********** impl Error ****************************************************************************/

#[cfg(feature = "std")]
impl<E: fmt::Debug + fmt::Display> error::Error for DestroyError<E> {}
