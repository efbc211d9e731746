//! Stage abstraction behind every [`DataPipe`](crate::DataPipe).
//!
//! A [`Node`] is a cursor factory: each call to [`Node::open`] starts a fresh,
//! independent pass over the data with its own buffers and RNG state. Stages
//! hold their upstream as a `DataPipe` and pull from it on demand, so a chain
//! of nodes is itself just another cursor factory.

use crate::error::Result;
use crate::planner::ExplainStep;

/// A single-pass, pull-based cursor. Items are fallible so that join and
/// source failures reach the consumer at the element that caused them.
pub type Cursor<T> = Box<dyn Iterator<Item = Result<T>>>;

pub trait Node<T>: Send + Sync {
    /// Open a fresh cursor over this stage.
    fn open(&self) -> Cursor<T>;

    /// Number of elements a full pass yields, when it is knowable.
    fn len(&self) -> Option<usize> {
        None
    }

    /// Description of this stage alone.
    fn describe(&self) -> ExplainStep;

    /// Push descriptions of every upstream stage, inputs first.
    fn explain_upstream(&self, _steps: &mut Vec<ExplainStep>) {}
}

/// Cursor wrapper that stops after the first error.
pub(crate) struct FuseOnError<T> {
    inner: Cursor<T>,
    failed: bool,
}

impl<T> FuseOnError<T> {
    pub(crate) fn new(inner: Cursor<T>) -> Self {
        Self {
            inner,
            failed: false,
        }
    }
}

impl<T> Iterator for FuseOnError<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?;
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}
