//! Structural and result invariants of a suite tree.

use std::collections::HashSet;

use crate::tree::{Node, Outcome, Suite};

/// Check invariants that must hold after loading:
/// - No duplicate ids
pub fn validate_structure(root: &Suite) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    check_ids(root, &mut seen, &mut errors, &root.id);
    errors
}

fn check_ids<'a>(
    suite: &'a Suite,
    seen: &mut HashSet<&'a str>,
    errors: &mut Vec<String>,
    path: &str,
) {
    if !seen.insert(suite.id.as_str()) {
        errors.push(format!("duplicate id '{}' at {}", suite.id, path));
    }
    for child in &suite.children {
        let child_path = format!("{}/{}", path, child.id());
        match child {
            Node::Suite(nested) => check_ids(nested, seen, errors, &child_path),
            Node::Case(case) => {
                if !seen.insert(case.id.as_str()) {
                    errors.push(format!("duplicate id '{}' at {}", case.id, child_path));
                }
            }
        }
    }
}

/// Check invariants that must hold after a complete run:
/// - No node is still pending
/// - A suite fails iff one of its children fails
/// - A passing case has `planned == observed`
pub fn validate_results(root: &Suite) -> Vec<String> {
    let mut errors = Vec::new();
    check_results(root, &mut errors, &root.id);
    errors
}

fn check_results(suite: &Suite, errors: &mut Vec<String>, path: &str) {
    if suite.result == Outcome::Pending {
        errors.push(format!("{}: suite still pending", path));
    } else if suite.result != suite.derive_result() {
        errors.push(format!(
            "{}: suite result {:?} disagrees with children",
            path, suite.result
        ));
    }
    for child in &suite.children {
        let child_path = format!("{}/{}", path, child.id());
        match child {
            Node::Suite(nested) => check_results(nested, errors, &child_path),
            Node::Case(case) => match case.result {
                Outcome::Pending => errors.push(format!("{}: case still pending", child_path)),
                Outcome::Pass if case.planned.is_none() || case.planned != case.observed => {
                    errors.push(format!(
                        "{}: passing case has plan {:?} but observed {:?}",
                        child_path, case.planned, case.observed
                    ));
                }
                Outcome::Pass | Outcome::Fail => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{case_with, passed_case, suite_with};

    #[test]
    fn duplicate_ids_are_reported() {
        let root = suite_with(
            "cmdl",
            vec![case_with("0000-a", Outcome::Pass), case_with("0000-a", Outcome::Pass)],
        );
        let errors = validate_structure(&root);
        assert!(errors.iter().any(|err| err.contains("duplicate id '0000-a'")));
    }

    #[test]
    fn unique_tree_has_no_structure_errors() {
        let inner = suite_with("0000-s", vec![case_with("0001-a", Outcome::Pending)]);
        let root = suite_with("cmdl", vec![Node::Suite(inner), case_with("0002-a", Outcome::Pending)]);
        assert!(validate_structure(&root).is_empty());
    }

    #[test]
    fn result_errors_cover_pending_and_mismatch() {
        let mut root = suite_with(
            "cmdl",
            vec![case_with("0000-a", Outcome::Pending), case_with("0001-b", Outcome::Pass)],
        );
        root.result = Outcome::Fail;
        let errors = validate_results(&root);
        assert!(errors.iter().any(|err| err.contains("case still pending")));
        assert!(errors.iter().any(|err| err.contains("disagrees with children")));
        assert!(errors.iter().any(|err| err.contains("passing case has plan")));
    }

    #[test]
    fn consistent_run_has_no_result_errors() {
        let mut root = suite_with("cmdl", vec![passed_case("0000-a", 2)]);
        root.result = Outcome::Pass;
        assert!(validate_results(&root).is_empty());
    }
}
