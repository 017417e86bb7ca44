//! Suite/case tree produced by the loader and annotated by the engine.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::verdict::FailureReason;

/// Id of the synthetic suite wrapping the command-line targets.
pub const ROOT_ID: &str = "cmdl";

/// Per-node result. `Pending` until the engine reaches the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Pending,
    Pass,
    Fail,
}

impl Outcome {
    pub fn is_pass(self) -> bool {
        self == Outcome::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Suite(Suite),
    Case(Case),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Suite(suite) => &suite.id,
            Node::Case(case) => &case.id,
        }
    }

    pub fn result(&self) -> Outcome {
        match self {
            Node::Suite(suite) => suite.result,
            Node::Case(case) => case.result,
        }
    }

    pub fn as_suite(&self) -> Option<&Suite> {
        match self {
            Node::Suite(suite) => Some(suite),
            Node::Case(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suite {
    pub id: String,
    /// Absolute path of the defining suite file. Empty for the command-line root.
    pub source_path: PathBuf,
    pub children: Vec<Node>,
    pub result: Outcome,
}

impl Suite {
    pub fn new(id: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source_path: source_path.into(),
            children: Vec::new(),
            result: Outcome::Pending,
        }
    }

    /// Fail iff any child failed; pass otherwise.
    ///
    /// Children must already be terminal. Child suites carry their own
    /// aggregate, so one level is enough to cover transitive descendants.
    pub fn derive_result(&self) -> Outcome {
        if self.children.iter().any(|child| child.result() == Outcome::Fail) {
            Outcome::Fail
        } else {
            Outcome::Pass
        }
    }

    /// Total number of nodes below this suite.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                Node::Suite(suite) => 1 + suite.descendant_count(),
                Node::Case(_) => 1,
            })
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Case {
    pub id: String,
    pub executable: PathBuf,
    pub options: Vec<String>,
    pub result: Outcome,
    pub planned: Option<u32>,
    pub observed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl Case {
    pub fn new(id: impl Into<String>, executable: impl Into<PathBuf>, options: Vec<String>) -> Self {
        Self {
            id: id.into(),
            executable: executable.into(),
            options,
            result: Outcome::Pending,
            planned: None,
            observed: None,
            failure: None,
        }
    }
}
