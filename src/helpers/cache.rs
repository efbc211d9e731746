//! In-memory caching of a pipe.
//!
//! [`DataPipe::in_memory_cache`] records elements as the first complete pass
//! streams through. Later passes replay the recording instead of recomputing
//! the upstream chain. With a `limit`, the cache is FIFO-bounded: once it
//! holds `limit` elements the oldest is dropped for each new one, and a
//! replay re-reads the dropped prefix from the source before serving the
//! cached tail.
//!
//! A pass only loads the cache when it runs to completion without error; an
//! abandoned or failed pass leaves the cache empty for the next one.
//!
//! ```
//! use ironpipe::*;
//!
//! # fn main() -> Result<()> {
//! let cached = from_fn(|| (0..5u32).map(|x| x * x)).in_memory_cache(None)?;
//! assert_eq!(cached.len(), None);
//!
//! assert_eq!(cached.collect()?, vec![0, 1, 4, 9, 16]);
//! assert_eq!(cached.len(), Some(5));
//! # Ok(()) }
//! ```

use crate::error::{PipeError, Result};
use crate::node::{Cursor, Node};
use crate::planner::ExplainStep;
use crate::{DataPipe, Element};
use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Contents of a loaded cache.
struct Loaded<T> {
    /// Leading source elements that fell out of the cache.
    skipped: usize,
    items: Arc<Vec<T>>,
}

type Slot<T> = Arc<Mutex<Option<Loaded<T>>>>;

fn lock<T>(slot: &Slot<T>) -> MutexGuard<'_, Option<Loaded<T>>> {
    // the slot is written in a single assignment, so a poisoned value is still whole
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

struct CacheOp<T> {
    source: DataPipe<T>,
    limit: Option<usize>,
    slot: Slot<T>,
}

/// First pass: forward the source and record what passes through.
struct FillCursor<T> {
    inner: Cursor<T>,
    cache: VecDeque<T>,
    skipped: usize,
    limit: Option<usize>,
    slot: Slot<T>,
    done: bool,
}

impl<T: Clone> Iterator for FillCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(x)) => {
                self.cache.push_back(x.clone());
                if self.limit.is_some_and(|limit| self.cache.len() > limit) {
                    self.cache.pop_front();
                    self.skipped += 1;
                }
                Some(Ok(x))
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                let mut slot = lock(&self.slot);
                if slot.is_none() {
                    debug!(
                        "in-memory cache loaded: {} cached, {} skipped",
                        self.cache.len(),
                        self.skipped
                    );
                    *slot = Some(Loaded {
                        skipped: self.skipped,
                        items: Arc::new(std::mem::take(&mut self.cache).into()),
                    });
                }
                None
            }
        }
    }
}

impl<T: Element + Clone> Node<T> for CacheOp<T> {
    fn open(&self) -> Cursor<T> {
        if let Some(loaded) = lock(&self.slot).as_ref() {
            let items = Arc::clone(&loaded.items);
            let replay = (0..items.len()).map(move |i| Ok::<T, PipeError>(items[i].clone()));
            // a fully cached pass never reopens the source
            if loaded.skipped == 0 {
                return Box::new(replay);
            }
            return Box::new(self.source.iter().take(loaded.skipped).chain(replay));
        }
        Box::new(FillCursor {
            inner: self.source.iter(),
            cache: VecDeque::new(),
            skipped: 0,
            limit: self.limit,
            slot: Arc::clone(&self.slot),
            done: false,
        })
    }

    fn len(&self) -> Option<usize> {
        self.source.len().or_else(|| {
            lock(&self.slot)
                .as_ref()
                .map(|loaded| loaded.skipped + loaded.items.len())
        })
    }

    fn describe(&self) -> ExplainStep {
        match self.limit {
            Some(limit) => ExplainStep::new(
                "InMemoryCache",
                format!("Cache up to {limit} elements for replay"),
            )
            .with_buffer(limit),
            None => ExplainStep::new("InMemoryCache", "Cache every element for replay"),
        }
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.source.explain_into(steps);
    }
}

impl<T: Element + Clone> DataPipe<T> {
    /// Cache the elements of the first complete pass in memory and replay
    /// them on later passes. `None` caches everything; `Some(limit)` keeps
    /// only the most recent `limit` elements.
    ///
    /// The length is the source's when known, otherwise it becomes known
    /// once the cache has loaded.
    ///
    /// # Errors
    /// [`PipeError::Configuration`] when `limit` is `Some(0)`.
    pub fn in_memory_cache(self, limit: Option<usize>) -> Result<Self> {
        if limit == Some(0) {
            return Err(PipeError::config(
                "cache limit is required to be either None or a positive integer",
            ));
        }
        Ok(Self::from_node(CacheOp {
            source: self,
            limit,
            slot: Arc::new(Mutex::new(None)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn abandoned_pass_does_not_load() -> Result<()> {
        let cached = from_fn(|| 0..4u32).in_memory_cache(None)?;
        let mut it = cached.iter();
        assert!(matches!(it.next(), Some(Ok(0))));
        drop(it);
        assert_eq!(cached.len(), None);
        assert_eq!(cached.collect()?, vec![0, 1, 2, 3]);
        assert_eq!(cached.len(), Some(4));
        Ok(())
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(matches!(
            from_vec(vec![1u8]).in_memory_cache(Some(0)),
            Err(PipeError::Configuration { .. })
        ));
    }
}
