//! Subject collectors: where the sampling loop learns which node to watch

mod graph;
mod reported;

pub use graph::{GraphError, Link, NodeGraph};
pub use reported::ReportedSubject;

use crate::history::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a tracked node: the tree it lives in plus its own name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId {
    pub container: String,
    pub item: String,
}

impl SubjectId {
    pub fn new(container: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            item: item.into(),
        }
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.item)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSample {
    pub id: SubjectId,
    pub position: Position,
}

pub trait SubjectCollector: Send + Sync {
    /// The node currently relevant to the user, if any, with its location.
    fn current_subject(&self) -> Option<SubjectSample>;
}
