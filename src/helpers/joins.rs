//! Stream-stream key join (the "key zipper").
//!
//! A [`KeyZipper`] walks a *primary* pipe in order and, for every primary
//! element, finds the element with the same key in each *secondary* pipe.
//! Secondary elements pulled while searching are parked in a per-source
//! [`MatchBuffer`] until their primary counterpart arrives, so secondaries
//! need not be perfectly co-ordered with the primary, only close enough for
//! the buffer to bridge the gap.
//!
//! ## Failure modes
//! - a secondary yields the same key twice → [`PipeError::DuplicateKey`]
//! - a secondary runs out before the primary key shows up →
//!   [`PipeError::MatchNotFound`] naming the primary element
//! - a bounded buffer overflows → the oldest parked entry is evicted and a
//!   warning is logged once per zipper; iteration continues, but an evicted
//!   entry can later surface as `MatchNotFound`
//!
//! ## Example
//! ```
//! use ironpipe::*;
//!
//! # fn main() -> Result<()> {
//! let left = from_vec(vec![("a", 100), ("b", 200), ("c", 300)]);
//! let right = from_vec(vec![("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
//!
//! let joined = left
//!     .zip_with_iter(right, |l| l.0, |r| r.0, KeyZipConfig::default())?
//!     .with_merge(|l, rs| l.1 + rs[0].1)
//!     .into_keyed_pipe();
//!
//! assert_eq!(joined.collect()?, vec![("a", 101), ("b", 202), ("c", 303)]);
//! # Ok(()) }
//! ```

use crate::config::KeyZipConfig;
use crate::error::{PipeError, Result};
use crate::match_buffer::MatchBuffer;
use crate::node::{Cursor, Node};
use crate::planner::ExplainStep;
use crate::{DataPipe, Element};
use log::{debug, warn};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Computes a join key from an element.
pub type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Combines a primary element with its matches, one per secondary source in
/// declaration order.
pub type MergeFn<P, S, O> = Arc<dyn Fn(P, Vec<S>) -> O + Send + Sync>;

/// Wrap a closure as a [`KeyFn`].
pub fn key_fn<T, K, F>(f: F) -> KeyFn<T, K>
where
    T: 'static,
    K: 'static,
    F: 'static + Send + Sync + Fn(&T) -> K,
{
    Arc::new(f)
}

/// Bound for join keys.
pub trait JoinKey: Element + Hash + Eq + Clone + Debug {}
impl<K> JoinKey for K where K: Element + Hash + Eq + Clone + Debug {}

/// Joins a primary pipe against one or more secondary pipes by key.
///
/// Built once, immutable afterwards; each pass opens fresh buffers and fresh
/// cursors over every source. Clones share the overflow-warning flag, so the
/// warning fires at most once per zipper no matter how many passes run.
pub struct KeyZipper<P, S, K, O> {
    primary: DataPipe<P>,
    secondaries: Vec<DataPipe<S>>,
    primary_key: KeyFn<P, K>,
    secondary_keys: Vec<KeyFn<S, K>>,
    merge: MergeFn<P, S, O>,
    buffer_size: Option<usize>,
    overflow_warned: Arc<AtomicBool>,
}

impl<P, S, K, O> Clone for KeyZipper<P, S, K, O> {
    fn clone(&self) -> Self {
        Self {
            primary: self.primary.clone(),
            secondaries: self.secondaries.clone(),
            primary_key: Arc::clone(&self.primary_key),
            secondary_keys: self.secondary_keys.clone(),
            merge: Arc::clone(&self.merge),
            buffer_size: self.buffer_size,
            overflow_warned: Arc::clone(&self.overflow_warned),
        }
    }
}

impl<P, S, K> KeyZipper<P, S, K, (P, Vec<S>)>
where
    P: Element + Debug,
    S: Element,
    K: JoinKey,
{
    /// Join `primary` against `secondaries`.
    ///
    /// `secondary_keys` holds either one function shared by every secondary
    /// or exactly one per secondary. Without [`with_merge`](Self::with_merge)
    /// the output is the raw `(primary, matches)` tuple.
    ///
    /// # Errors
    /// [`PipeError::Configuration`] when there are no secondaries, the key
    /// function count does not fit, or the buffer size is zero.
    pub fn new(
        primary: DataPipe<P>,
        primary_key: KeyFn<P, K>,
        secondaries: Vec<DataPipe<S>>,
        secondary_keys: Vec<KeyFn<S, K>>,
        config: KeyZipConfig,
    ) -> Result<Self> {
        if secondaries.is_empty() {
            return Err(PipeError::config(
                "KeyZipper needs at least two datapipes to draw from, but got 1",
            ));
        }
        let secondary_keys = match secondary_keys.len() {
            1 => vec![Arc::clone(&secondary_keys[0]); secondaries.len()],
            n if n == secondaries.len() => secondary_keys,
            n => {
                return Err(PipeError::config(format!(
                    "The number of datapipes and key functions mismatches: {} != {}",
                    secondaries.len() + 1,
                    n + 1
                )));
            }
        };
        config.validate()?;

        Ok(Self {
            primary,
            secondaries,
            primary_key,
            secondary_keys,
            merge: Arc::new(|p: P, matches: Vec<S>| (p, matches)),
            buffer_size: config.buffer_size,
            overflow_warned: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl<T, K> KeyZipper<T, T, K, (T, Vec<T>)>
where
    T: Element + Debug,
    K: JoinKey,
{
    /// Join homogeneous sources: the first is primary, the rest secondary.
    ///
    /// `key_fns` holds one function applied to every source, or exactly one
    /// per source.
    ///
    /// # Errors
    /// [`PipeError::Configuration`] when fewer than two sources are given,
    /// the key function count does not fit, or the buffer size is zero.
    pub fn from_sources(
        sources: Vec<DataPipe<T>>,
        key_fns: Vec<KeyFn<T, K>>,
        config: KeyZipConfig,
    ) -> Result<Self> {
        if sources.len() < 2 {
            return Err(PipeError::config(format!(
                "KeyZipper needs at least two datapipes to draw from, but got {}",
                sources.len()
            )));
        }
        let (primary_key, secondary_keys) = match key_fns.len() {
            1 => (Arc::clone(&key_fns[0]), key_fns),
            n if n == sources.len() => {
                let mut fns = key_fns.into_iter();
                let first = fns.next().ok_or_else(|| PipeError::config("no key function"))?;
                (first, fns.collect())
            }
            n => {
                return Err(PipeError::config(format!(
                    "The number of datapipes and key functions mismatches: {} != {n}",
                    sources.len()
                )));
            }
        };
        let mut sources = sources.into_iter();
        let primary = sources
            .next()
            .ok_or_else(|| PipeError::config("no primary datapipe"))?;
        Self::new(primary, primary_key, sources.collect(), secondary_keys, config)
    }
}

impl<P, S, K, O> KeyZipper<P, S, K, O>
where
    P: Element + Debug,
    S: Element,
    K: JoinKey,
    O: Element,
{
    /// Replace the merge function.
    #[must_use]
    pub fn with_merge<O2, F>(self, f: F) -> KeyZipper<P, S, K, O2>
    where
        O2: Element,
        F: 'static + Send + Sync + Fn(P, Vec<S>) -> O2,
    {
        KeyZipper {
            primary: self.primary,
            secondaries: self.secondaries,
            primary_key: self.primary_key,
            secondary_keys: self.secondary_keys,
            merge: Arc::new(f),
            buffer_size: self.buffer_size,
            overflow_warned: self.overflow_warned,
        }
    }

    /// Same as the primary's length, when known.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.primary.len()
    }

    /// Whether any pass of this zipper has had to evict from a buffer.
    #[must_use]
    pub fn overflow_warned(&self) -> bool {
        self.overflow_warned.load(Ordering::Relaxed)
    }

    /// Pipe of `(key, merged)` pairs.
    #[must_use]
    pub fn into_keyed_pipe(self) -> DataPipe<(K, O)> {
        DataPipe::from_node(self)
    }

    /// Pipe of merged values, key dropped.
    #[must_use]
    pub fn into_pipe(self) -> DataPipe<O> {
        self.into_keyed_pipe().map_labeled("DropKey", |(_, out)| out)
    }
}

impl<P, S, K, O> KeyZipper<P, S, K, O>
where
    P: Element + Debug,
    S: Element,
    K: JoinKey,
    O: Element,
{
    fn cursor(&self) -> ZipCursor<P, S, K, O> {
        ZipCursor {
            primary: self.primary.iter(),
            secondaries: self.secondaries.iter().map(DataPipe::iter).collect(),
            buffers: self.secondaries.iter().map(|_| MatchBuffer::new()).collect(),
            primary_key: Arc::clone(&self.primary_key),
            secondary_keys: self.secondary_keys.clone(),
            merge: Arc::clone(&self.merge),
            buffer_size: self.buffer_size,
            overflow_warned: Arc::clone(&self.overflow_warned),
        }
    }
}

struct ZipCursor<P, S, K, O> {
    primary: Cursor<P>,
    secondaries: Vec<Cursor<S>>,
    buffers: Vec<MatchBuffer<K, S>>,
    primary_key: KeyFn<P, K>,
    secondary_keys: Vec<KeyFn<S, K>>,
    merge: MergeFn<P, S, O>,
    buffer_size: Option<usize>,
    overflow_warned: Arc<AtomicBool>,
}

impl<P, S, K, O> ZipCursor<P, S, K, O>
where
    P: Debug,
    K: Hash + Eq + Clone + Debug,
{
    fn match_one(&mut self, parent: P) -> Result<(K, O)> {
        let key = (self.primary_key)(&parent);
        let mut matches = Vec::with_capacity(self.secondaries.len());
        for idx in 0..self.secondaries.len() {
            matches.push(self.take_match(idx, &key, &parent)?);
        }
        let out = (self.merge)(parent, matches);
        Ok((key, out))
    }

    /// Pull from secondary `idx` until `key` is buffered, then take it out.
    fn take_match(&mut self, idx: usize, key: &K, parent: &P) -> Result<S> {
        let buffer = &mut self.buffers[idx];
        while !buffer.contains(key) {
            let child = match self.secondaries[idx].next() {
                Some(Ok(child)) => child,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(PipeError::MatchNotFound {
                        element: format!("{parent:?}"),
                        source_index: idx + 1,
                    });
                }
            };
            let child_key = (self.secondary_keys[idx])(&child);
            if let Err((dup, _)) = buffer.insert(child_key, child) {
                return Err(PipeError::DuplicateKey {
                    key: format!("{dup:?}"),
                    source_index: idx + 1,
                });
            }

            let Some(bound) = self.buffer_size else {
                continue;
            };
            if buffer.len() > bound {
                if !self.overflow_warned.swap(true, Ordering::Relaxed) {
                    warn!(
                        "Buffer reaches the upper limit ({bound}), so reference key-data pairs begin to be \
                         removed from buffer in FIFO order. Please consider increasing the buffer size."
                    );
                }
                if let Some((evicted, _)) = buffer.evict_oldest() {
                    debug!("evicted key {evicted:?} from buffer of reference data pipe {}", idx + 1);
                }
            }
        }
        buffer.pop(key).ok_or_else(|| PipeError::MatchNotFound {
            element: format!("{parent:?}"),
            source_index: idx + 1,
        })
    }
}

impl<P, S, K, O> Iterator for ZipCursor<P, S, K, O>
where
    P: Debug,
    K: Hash + Eq + Clone + Debug,
{
    type Item = Result<(K, O)>;

    fn next(&mut self) -> Option<Self::Item> {
        let parent = match self.primary.next()? {
            Ok(parent) => parent,
            Err(e) => return Some(Err(e)),
        };
        Some(self.match_one(parent))
    }
}

impl<P, S, K, O> Node<(K, O)> for KeyZipper<P, S, K, O>
where
    P: Element + Debug,
    S: Element,
    K: JoinKey,
    O: Element,
{
    fn open(&self) -> Cursor<(K, O)> {
        debug!(
            "opening key zipper over {} reference data pipe(s), buffer size {:?}",
            self.secondaries.len(),
            self.buffer_size
        );
        Box::new(self.cursor())
    }

    fn len(&self) -> Option<usize> {
        self.primary.len()
    }

    fn describe(&self) -> ExplainStep {
        let n = self.secondaries.len();
        let step = ExplainStep::new(
            "KeyZipper",
            format!("Join primary with {n} reference pipe(s) by key"),
        );
        match self.buffer_size {
            Some(bound) => step.with_buffer(bound.saturating_add(1).saturating_mul(n)),
            None => step,
        }
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.primary.explain_into(steps);
        for s in &self.secondaries {
            s.explain_into(steps);
        }
    }
}

impl<T: Element + Debug> DataPipe<T> {
    /// Two-way key join of this pipe against `reference`.
    ///
    /// Output order follows this pipe. See [`KeyZipper`] for the buffering
    /// and failure semantics.
    ///
    /// # Errors
    /// [`PipeError::Configuration`] for a zero buffer size.
    pub fn zip_with_iter<S, K, F, G>(
        self,
        reference: DataPipe<S>,
        key_fn: F,
        ref_key_fn: G,
        config: KeyZipConfig,
    ) -> Result<KeyZipper<T, S, K, (T, Vec<S>)>>
    where
        S: Element,
        K: JoinKey,
        F: 'static + Send + Sync + Fn(&T) -> K,
        G: 'static + Send + Sync + Fn(&S) -> K,
    {
        KeyZipper::new(
            self,
            Arc::new(key_fn),
            vec![reference],
            vec![Arc::new(ref_key_fn) as KeyFn<S, K>],
            config,
        )
    }
}
