//! Batching helpers for [`DataPipe`].
//!
//! - [`DataPipe::batch`] groups consecutive elements into `Vec<T>` chunks of a
//!   fixed size, optionally dropping a short final chunk.
//! - [`DataPipe::unbatch`] flattens chunks back into single elements,
//!   preserving order within and across chunks.
//! - [`DataPipe::sort_chunks`] applies a whole-chunk transform such as a
//!   sort; see [`sort_by_key`] for building one from an element key.
//!
//! All three are streaming: a batch holds at most one chunk in memory.

use crate::error::{PipeError, Result};
use crate::node::{Cursor, Node};
use crate::planner::ExplainStep;
use crate::{DataPipe, Element};
use std::sync::Arc;

/// Upper bound on up-front allocation for a chunk; larger chunks grow on demand.
pub(crate) const MAX_PREALLOC: usize = 1 << 16;

/// Whole-chunk transform: receives an entire chunk and returns it reordered.
pub type SortKey<T> = Arc<dyn Fn(Vec<T>) -> Vec<T> + Send + Sync>;

/// Build a [`SortKey`] that stably sorts a chunk by the key `f` extracts.
///
/// ```
/// use ironpipe::*;
///
/// let by_len = sort_by_key(|s: &String| s.len());
/// let sorted = by_len(vec!["ccc".to_string(), "a".into(), "bb".into()]);
/// assert_eq!(sorted, vec!["a", "bb", "ccc"]);
/// ```
pub fn sort_by_key<T, K, F>(f: F) -> SortKey<T>
where
    T: 'static,
    K: 'static + Ord,
    F: 'static + Send + Sync + Fn(&T) -> K,
{
    Arc::new(move |mut chunk: Vec<T>| {
        chunk.sort_by_key(|x| f(x));
        chunk
    })
}

struct BatchOp<T> {
    source: DataPipe<T>,
    size: usize,
    drop_last: bool,
}

struct BatchCursor<T> {
    inner: Cursor<T>,
    size: usize,
    drop_last: bool,
    done: bool,
}

impl<T> Iterator for BatchCursor<T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = Vec::with_capacity(self.size.min(MAX_PREALLOC));
        while chunk.len() < self.size {
            match self.inner.next() {
                Some(Ok(x)) => chunk.push(x),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if chunk.is_empty() || (self.drop_last && chunk.len() < self.size) {
            return None;
        }
        Some(Ok(chunk))
    }
}

impl<T: Element> Node<Vec<T>> for BatchOp<T> {
    fn open(&self) -> Cursor<Vec<T>> {
        Box::new(BatchCursor {
            inner: self.source.iter(),
            size: self.size,
            drop_last: self.drop_last,
            done: false,
        })
    }

    fn len(&self) -> Option<usize> {
        let n = self.source.len()?;
        Some(if self.drop_last {
            n / self.size
        } else {
            n.div_ceil(self.size)
        })
    }

    fn describe(&self) -> ExplainStep {
        let tail = if self.drop_last { "drop" } else { "keep" };
        ExplainStep::new(
            "Batch",
            format!("Group into chunks of {} ({tail} short tail)", self.size),
        )
        .with_buffer(self.size)
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.source.explain_into(steps);
    }
}

struct UnbatchOp<T> {
    source: DataPipe<Vec<T>>,
}

struct UnbatchCursor<T> {
    inner: Cursor<Vec<T>>,
    current: std::vec::IntoIter<T>,
}

impl<T> Iterator for UnbatchCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(x) = self.current.next() {
                return Some(Ok(x));
            }
            match self.inner.next()? {
                Ok(chunk) => self.current = chunk.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<T: Element> Node<T> for UnbatchOp<T> {
    fn open(&self) -> Cursor<T> {
        Box::new(UnbatchCursor {
            inner: self.source.iter(),
            current: Vec::new().into_iter(),
        })
    }

    fn describe(&self) -> ExplainStep {
        ExplainStep::new("Unbatch", "Flatten chunks into elements")
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.source.explain_into(steps);
    }
}

impl<T: Element> DataPipe<T> {
    /// Group elements into chunks of `size`.
    ///
    /// The final chunk may be shorter unless `drop_last` is set, in which case
    /// it is discarded. Length is `ceil(n / size)` or `floor(n / size)`.
    ///
    /// # Errors
    /// [`PipeError::Configuration`] when `size` is zero.
    ///
    /// # Example
    /// ```
    /// use ironpipe::*;
    ///
    /// # fn main() -> Result<()> {
    /// let batches = from_vec((0..10).collect::<Vec<u32>>()).batch(3, false)?;
    /// let sizes: Vec<usize> = batches.collect()?.iter().map(Vec::len).collect();
    /// assert_eq!(sizes, vec![3, 3, 3, 1]);
    /// # Ok(()) }
    /// ```
    pub fn batch(self, size: usize, drop_last: bool) -> Result<DataPipe<Vec<T>>> {
        if size == 0 {
            return Err(PipeError::config("batch size is required to be larger than 0"));
        }
        Ok(DataPipe::from_node(BatchOp {
            source: self,
            size,
            drop_last,
        }))
    }
}

impl<T: Element> DataPipe<Vec<T>> {
    /// Flatten chunks back into a flat sequence.
    #[must_use]
    pub fn unbatch(self) -> DataPipe<T> {
        DataPipe::from_node(UnbatchOp { source: self })
    }

    /// Apply a whole-chunk transform (typically a sort) to every chunk.
    #[must_use]
    pub fn sort_chunks(self, sort_key: SortKey<T>) -> Self {
        self.map_labeled("SortChunks", move |chunk| sort_key(chunk))
    }
}
