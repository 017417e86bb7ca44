//! Box-drawing rendering of an annotated suite tree.

use std::fmt;

use crate::tree::{Node, Outcome, Suite};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

/// One rendered node: `<indent><connector><glyph> <id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLine {
    /// Accumulated indent followed by this node's connector.
    pub prefix: String,
    pub outcome: Outcome,
    pub id: String,
}

impl TreeLine {
    /// Anything short of a pass is drawn as a failure.
    pub fn glyph(&self) -> &'static str {
        if self.outcome.is_pass() { "✓" } else { "✗" }
    }
}

impl fmt::Display for TreeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.prefix, self.glyph(), self.id)
    }
}

/// Render every descendant of `root`, depth-first, one line per node.
///
/// The root itself is not drawn; callers print their own summary line above.
pub fn render_tree(root: &Suite) -> Vec<TreeLine> {
    let mut lines = Vec::with_capacity(root.descendant_count());
    render_children(&root.children, "", &mut lines);
    lines
}

fn render_children(children: &[Node], indent: &str, lines: &mut Vec<TreeLine>) {
    for (idx, child) in children.iter().enumerate() {
        let last = idx + 1 == children.len();
        let (connector, extension) = if last {
            (LAST_BRANCH, SPACE)
        } else {
            (BRANCH, PIPE)
        };
        lines.push(TreeLine {
            prefix: format!("{indent}{connector}"),
            outcome: child.result(),
            id: child.id().to_string(),
        });
        if let Node::Suite(suite) = child {
            render_children(&suite.children, &format!("{indent}{extension}"), lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{case_with, suite_with};

    fn sample() -> Suite {
        let mut inner = suite_with(
            "0001-inner.yaml",
            vec![
                case_with("0002-a", Outcome::Pass),
                case_with("0003-b", Outcome::Fail),
            ],
        );
        inner.result = Outcome::Fail;
        suite_with(
            "cmdl",
            vec![
                Node::Suite(inner),
                case_with("0004-c", Outcome::Pass),
            ],
        )
    }

    #[test]
    fn renders_nested_connectors() {
        let lines: Vec<String> = render_tree(&sample())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            lines,
            vec![
                "├── ✗ 0001-inner.yaml",
                "│   ├── ✓ 0002-a",
                "│   └── ✗ 0003-b",
                "└── ✓ 0004-c",
            ]
        );
    }

    #[test]
    fn last_suite_children_use_blank_indent() {
        let inner = suite_with("0001-s", vec![case_with("0002-x", Outcome::Pass)]);
        let root = suite_with("cmdl", vec![Node::Suite(inner)]);
        let lines: Vec<String> = render_tree(&root)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(lines, vec!["└── ✗ 0001-s", "    └── ✓ 0002-x"]);
    }

    #[test]
    fn pending_renders_as_failure() {
        let root = suite_with("cmdl", vec![case_with("0000-p", Outcome::Pending)]);
        assert_eq!(render_tree(&root)[0].glyph(), "✗");
    }

    #[test]
    fn rendering_is_idempotent() {
        let root = sample();
        assert_eq!(render_tree(&root), render_tree(&root));
    }

    #[test]
    fn empty_root_renders_nothing() {
        let root = Suite::new("cmdl", "");
        assert!(render_tree(&root).is_empty());
    }
}
