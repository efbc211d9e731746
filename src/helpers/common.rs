use crate::node::{Cursor, Node};
use crate::planner::ExplainStep;
use crate::{DataPipe, Element};
use std::marker::PhantomData;
use std::sync::Arc;

/// Element-wise transform. Also used for whole-chunk transforms after a
/// `batch`, where each element is itself a chunk.
pub(crate) struct MapOp<I, O, F> {
    pub(crate) source: DataPipe<I>,
    pub(crate) f: Arc<F>,
    pub(crate) label: &'static str,
    pub(crate) _o: PhantomData<fn() -> O>,
}

impl<I, O, F> Node<O> for MapOp<I, O, F>
where
    I: Element,
    O: Element,
    F: 'static + Send + Sync + Fn(I) -> O,
{
    fn open(&self) -> Cursor<O> {
        let f = Arc::clone(&self.f);
        Box::new(self.source.iter().map(move |r| r.map(|x| f(x))))
    }

    fn len(&self) -> Option<usize> {
        self.source.len()
    }

    fn describe(&self) -> ExplainStep {
        ExplainStep::new(self.label, "Apply function to every element")
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.source.explain_into(steps);
    }
}

struct FilterOp<T, P> {
    source: DataPipe<T>,
    pred: Arc<P>,
}

impl<T, P> Node<T> for FilterOp<T, P>
where
    T: Element,
    P: 'static + Send + Sync + Fn(&T) -> bool,
{
    fn open(&self) -> Cursor<T> {
        let pred = Arc::clone(&self.pred);
        // errors always pass through
        Box::new(self.source.iter().filter(move |r| match r {
            Ok(x) => pred(x),
            Err(_) => true,
        }))
    }

    fn describe(&self) -> ExplainStep {
        ExplainStep::new("Filter", "Keep elements matching a predicate")
    }

    fn explain_upstream(&self, steps: &mut Vec<ExplainStep>) {
        self.source.explain_into(steps);
    }
}

impl<T: Element> DataPipe<T> {
    /// Apply `f` to every element. Length is preserved.
    #[must_use]
    pub fn map<O, F>(self, f: F) -> DataPipe<O>
    where
        O: Element,
        F: 'static + Send + Sync + Fn(T) -> O,
    {
        self.map_labeled("Map", f)
    }

    /// Keep only elements for which `pred` returns true. Length becomes unknown.
    #[must_use]
    pub fn filter<P>(self, pred: P) -> Self
    where
        P: 'static + Send + Sync + Fn(&T) -> bool,
    {
        Self::from_node(FilterOp {
            source: self,
            pred: Arc::new(pred),
        })
    }

    pub(crate) fn map_labeled<O, F>(self, label: &'static str, f: F) -> DataPipe<O>
    where
        O: Element,
        F: 'static + Send + Sync + Fn(T) -> O,
    {
        DataPipe::from_node(MapOp {
            source: self,
            f: Arc::new(f),
            label,
            _o: PhantomData,
        })
    }
}
