//! Plan explanation for chained pipes.
//!
//! Pipes are built eagerly as a chain of [`Node`](crate::node::Node)s; no data
//! moves until a cursor is pulled. [`PlanExplanation`] lists that chain in
//! execution order (inputs before the stages that consume them) together with
//! the memory bound of every buffering stage, so a caller can check what a
//! composed plan will hold in memory before iterating it.

use std::fmt;

/// A single stage in an explained plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainStep {
    /// Step number in execution order (assigned by [`PlanExplanation::new`]).
    pub step: usize,
    /// Kind of stage, e.g. `"Batch"` or `"KeyZipper"`.
    pub node_type: &'static str,
    /// Human-readable description of the operation.
    pub description: String,
    /// Maximum number of elements this stage holds at once, if it buffers.
    pub buffer_bound: Option<usize>,
}

impl ExplainStep {
    pub fn new(node_type: &'static str, description: impl Into<String>) -> Self {
        Self {
            step: 0,
            node_type,
            description: description.into(),
            buffer_bound: None,
        }
    }

    #[must_use]
    pub const fn with_buffer(mut self, bound: usize) -> Self {
        self.buffer_bound = Some(bound);
        self
    }
}

/// Ordered description of a pipe's stage chain.
#[derive(Debug, Clone)]
pub struct PlanExplanation {
    pub steps: Vec<ExplainStep>,
}

impl PlanExplanation {
    pub(crate) fn new(mut steps: Vec<ExplainStep>) -> Self {
        for (idx, s) in steps.iter_mut().enumerate() {
            s.step = idx + 1;
        }
        Self { steps }
    }

    /// Node types in execution order.
    #[must_use]
    pub fn node_types(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.node_type).collect()
    }

    /// Count of stages that buffer elements.
    #[must_use]
    pub fn buffering_stages(&self) -> usize {
        self.steps.iter().filter(|s| s.buffer_bound.is_some()).count()
    }
}

impl fmt::Display for PlanExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "┌─ Pipe Plan ──────────────────────────────────────────────────┐"
        )?;
        for s in &self.steps {
            write!(f, "│ {:>2}. [{}] {}", s.step, s.node_type, s.description)?;
            if let Some(bound) = s.buffer_bound {
                write!(f, " (buffers ≤ {bound})")?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "└──────────────────────────────────────────────────────────────┘"
        )
    }
}
