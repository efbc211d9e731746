use crate::error::{PipeError, Result};
use crate::node::{Cursor, FuseOnError, Node};
use crate::planner::{ExplainStep, PlanExplanation};
use std::sync::Arc;

/// Bound shared by every element type flowing through a pipe.
pub trait Element: 'static + Send + Sync {}
impl<T> Element for T where T: 'static + Send + Sync {}

/// A lazy, restartable, single-pass sequence.
///
/// `DataPipe` is a cheap handle (an `Arc`) over a chain of stages. Cloning it
/// never copies data, and building stages on top of it never pulls data:
/// work only happens when a cursor returned by [`iter`](DataPipe::iter) is
/// advanced. Every call to `iter` opens a fresh pass with fresh buffers.
pub struct DataPipe<T> {
    pub(crate) node: Arc<dyn Node<T>>,
}

impl<T> Clone for DataPipe<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

/// Create a pipe over an in-memory vector. The pipe has a known length and
/// every pass yields clones of the stored elements.
pub fn from_vec<T: Element + Clone>(data: Vec<T>) -> DataPipe<T> {
    DataPipe::from_node(VecSource {
        data: Arc::new(data),
    })
}

/// Create a pipe from an iterator factory. The factory is called once per
/// pass; the resulting pipe has no known length (see [`DataPipe::with_len`]).
pub fn from_fn<T, I, F>(factory: F) -> DataPipe<T>
where
    T: Element,
    I: IntoIterator<Item = T>,
    I::IntoIter: 'static,
    F: 'static + Send + Sync + Fn() -> I,
{
    DataPipe::from_node(FnSource { factory })
}

/// Like [`from_fn`], for sources that can fail mid-stream. A failed item is
/// reported as [`PipeError::Source`] and ends the pass.
pub fn from_fallible_fn<T, I, F>(factory: F) -> DataPipe<T>
where
    T: Element,
    I: IntoIterator<Item = anyhow::Result<T>>,
    I::IntoIter: 'static,
    F: 'static + Send + Sync + Fn() -> I,
{
    DataPipe::from_node(FallibleFnSource { factory })
}

impl<T: Element> DataPipe<T> {
    /// Wrap a custom stage.
    pub fn from_node<N: Node<T> + 'static>(node: N) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    /// Open a fresh cursor. The cursor stops after yielding its first error.
    #[must_use]
    pub fn iter(&self) -> Cursor<T> {
        Box::new(FuseOnError::new(self.node.open()))
    }

    /// Number of elements one full pass yields, if knowable.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.node.len()
    }

    /// Like [`len`](DataPipe::len) but reports an unknown length as an error.
    ///
    /// # Errors
    /// [`PipeError::LengthUnsupported`] when the length cannot be known.
    pub fn try_len(&self) -> Result<usize> {
        self.len().ok_or_else(|| PipeError::LengthUnsupported {
            pipe: self.node.describe().node_type.to_string(),
        })
    }

    /// Drain one full pass into a vector.
    ///
    /// # Errors
    /// The first error raised by any stage of the chain.
    pub fn collect(&self) -> Result<Vec<T>> {
        self.iter().collect()
    }

    /// Attach a known length to a pipe whose source cannot report one.
    #[must_use]
    pub fn with_len(self, len: usize) -> Self {
        Self::from_node(LenHint { source: self, len })
    }

    /// Describe the stage chain feeding this pipe, in execution order.
    #[must_use]
    pub fn explain(&self) -> PlanExplanation {
        let mut steps = Vec::new();
        self.explain_into(&mut steps);
        PlanExplanation::new(steps)
    }

    pub(crate) fn explain_into(&self, steps: &mut Vec<ExplainStep>) {
        self.node.explain_upstream(steps);
        steps.push(self.node.describe());
    }
}

impl<T: Element> IntoIterator for &DataPipe<T> {
    type Item = Result<T>;
    type IntoIter = Cursor<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---- sources ----

struct VecSource<T> {
    data: Arc<Vec<T>>,
}

impl<T: Element + Clone> Node<T> for VecSource<T> {
    fn open(&self) -> Cursor<T> {
        let data = Arc::clone(&self.data);
        Box::new((0..data.len()).map(move |i| Ok(data[i].clone())))
    }

    fn len(&self) -> Option<usize> {
        Some(self.data.len())
    }

    fn describe(&self) -> ExplainStep {
        ExplainStep::new(
            "Source",
            format!("Read in-memory source ({} elements)", self.data.len()),
        )
    }
}

struct FnSource<F> {
    factory: F,
}

impl<T, I, F> Node<T> for FnSource<F>
where
    T: Element,
    I: IntoIterator<Item = T>,
    I::IntoIter: 'static,
    F: 'static + Send + Sync + Fn() -> I,
{
    fn open(&self) -> Cursor<T> {
        Box::new((self.factory)().into_iter().map(Ok))
    }

    fn describe(&self) -> ExplainStep {
        ExplainStep::new("Source", "Read iterator source (unknown size)")
    }
}

struct FallibleFnSource<F> {
    factory: F,
}

impl<T, I, F> Node<T> for FallibleFnSource<F>
where
    T: Element,
    I: IntoIterator<Item = anyhow::Result<T>>,
    I::IntoIter: 'static,
    F: 'static + Send + Sync + Fn() -> I,
{
    fn open(&self) -> Cursor<T> {
        Box::new((self.factory)().into_iter().map(|r| r.map_err(PipeError::from)))
    }

    fn describe(&self) -> ExplainStep {
        ExplainStep::new("Source", "Read fallible iterator source (unknown size)")
    }
}

struct LenHint<T> {
    source: DataPipe<T>,
    len: usize,
}

impl<T: Element> Node<T> for LenHint<T> {
    fn open(&self) -> Cursor<T> {
        self.source.iter()
    }

    fn len(&self) -> Option<usize> {
        Some(self.len)
    }

    fn describe(&self) -> ExplainStep {
        ExplainStep::new("LenHint", format!("Declare length {}", self.len))
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.source.explain_into(steps);
    }
}
