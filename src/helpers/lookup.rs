//! Stream-table key join.
//!
//! [`MapZipper`] enriches every element of a pipe with the value a random-access
//! [`Lookup`] table holds under the element's key. No buffering is involved:
//! a missing key fails the pass immediately with [`PipeError::KeyNotFound`].
//!
//! ```
//! use ironpipe::*;
//! use std::collections::HashMap;
//!
//! # fn main() -> Result<()> {
//! let events = from_vec(vec![("a", 1), ("b", 2), ("c", 3)]);
//! let table: HashMap<&str, i32> = [("a", 100), ("b", 200), ("c", 300), ("d", 400)].into();
//!
//! let joined = events
//!     .zip_with_map(table, |e| e.0)
//!     .with_merge(|e, v| (e.0, e.1 + v))
//!     .into_pipe();
//! assert_eq!(joined.collect()?, vec![("a", 101), ("b", 202), ("c", 303)]);
//! # Ok(()) }
//! ```

use crate::error::{PipeError, Result};
use crate::node::{Cursor, Node};
use crate::planner::ExplainStep;
use crate::{DataPipe, Element, JoinKey};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::{BuildHasher, Hash};
use std::sync::{Arc, OnceLock};

/// Random-access key → value table.
///
/// `get` returns `None` only when the key is absent; present values are
/// returned as owned clones.
pub trait Lookup<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    /// Number of entries, when the table knows it.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

impl<K, V, H> Lookup<K, V> for HashMap<K, V, H>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    H: BuildHasher + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        Self::get(self, key).cloned()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len())
    }
}

impl<K, V> Lookup<K, V> for BTreeMap<K, V>
where
    K: Ord + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        Self::get(self, key).cloned()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len())
    }
}

/// A vector is a table indexed by position.
impl<V: Clone + Send + Sync> Lookup<usize, V> for Vec<V> {
    fn get(&self, key: &usize) -> Option<V> {
        self.as_slice().get(*key).cloned()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.len())
    }
}

impl<K, V, L: Lookup<K, V> + ?Sized> Lookup<K, V> for Arc<L> {
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn size_hint(&self) -> Option<usize> {
        (**self).size_hint()
    }
}

/// Joins a pipe against a [`Lookup`] table by key.
pub struct MapZipper<T, K, V, O> {
    source: DataPipe<T>,
    table: Arc<dyn Lookup<K, V>>,
    key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>,
    merge: Arc<dyn Fn(T, V) -> O + Send + Sync>,
    length: Arc<OnceLock<Option<usize>>>,
}

impl<T, K, V> MapZipper<T, K, V, (T, V)>
where
    T: Element + Debug,
    K: JoinKey,
    V: Element,
{
    /// Join `source` against `table`; without a merge function the output is
    /// the `(element, value)` pair.
    pub fn new<L, F>(source: DataPipe<T>, table: L, key_fn: F) -> Self
    where
        L: Lookup<K, V> + 'static,
        F: 'static + Send + Sync + Fn(&T) -> K,
    {
        Self {
            source,
            table: Arc::new(table),
            key_fn: Arc::new(key_fn),
            merge: Arc::new(|t: T, v: V| (t, v)),
            length: Arc::new(OnceLock::new()),
        }
    }
}

impl<T, K, V, O> MapZipper<T, K, V, O>
where
    T: Element + Debug,
    K: JoinKey,
    V: Element,
    O: Element,
{
    /// Replace the merge function.
    #[must_use]
    pub fn with_merge<O2, F>(self, f: F) -> MapZipper<T, K, V, O2>
    where
        O2: Element,
        F: 'static + Send + Sync + Fn(T, V) -> O2,
    {
        MapZipper {
            source: self.source,
            table: self.table,
            key_fn: self.key_fn,
            merge: Arc::new(f),
            length: self.length,
        }
    }

    /// Length of the source, computed once and cached.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        *self.length.get_or_init(|| self.source.len())
    }

    #[must_use]
    pub fn into_pipe(self) -> DataPipe<O> {
        DataPipe::from_node(self)
    }
}

impl<T, K, V, O> Node<O> for MapZipper<T, K, V, O>
where
    T: Element + Debug,
    K: JoinKey,
    V: Element,
    O: Element,
{
    fn open(&self) -> Cursor<O> {
        let table = Arc::clone(&self.table);
        let key_fn = Arc::clone(&self.key_fn);
        let merge = Arc::clone(&self.merge);
        Box::new(self.source.iter().map(move |r| {
            let item = r?;
            let key = key_fn(&item);
            match table.get(&key) {
                Some(value) => Ok(merge(item, value)),
                None => Err(PipeError::KeyNotFound {
                    element: format!("{item:?}"),
                    key: format!("{key:?}"),
                }),
            }
        }))
    }

    fn len(&self) -> Option<usize> {
        Self::len(self)
    }

    fn describe(&self) -> ExplainStep {
        let size = self
            .table
            .size_hint()
            .map_or_else(|| "unknown size".to_string(), |n| format!("{n} entries"));
        ExplainStep::new("MapZipper", format!("Look up every element in a table ({size})"))
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.source.explain_into(steps);
    }
}

impl<T: Element + Debug> DataPipe<T> {
    /// Join this pipe against a lookup table by key.
    #[must_use]
    pub fn zip_with_map<K, V, L, F>(self, table: L, key_fn: F) -> MapZipper<T, K, V, (T, V)>
    where
        K: JoinKey,
        V: Element,
        L: Lookup<K, V> + 'static,
        F: 'static + Send + Sync + Fn(&T) -> K,
    {
        MapZipper::new(self, table, key_fn)
    }
}
