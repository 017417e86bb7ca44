//! Loading YAML suite files into a [`Suite`] tree.
//!
//! A suite file is a sequence of entries:
//!
//! ```yaml
//! - suite: nested/more.yaml
//! - case: bin/check-links.sh
//!   name: links
//!   opts: ["--fixtures", "<base>/fixtures"]
//! ```
//!
//! Paths are relative to the directory of the file that names them, and
//! `<base>` inside an option expands to that same directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::naming::NameAllocator;
use crate::tree::{Case, Node, ROOT_ID, Suite};

/// Placeholder replaced by the suite file's directory inside case options.
pub const BASE_PLACEHOLDER: &str = "<base>";

/// Fatal suite loading failure.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read suite {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse suite {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("suite {} must be a sequence of entries", .path.display())]
    NotASequence { path: PathBuf },
    #[error("error, missing suite/case in suite {suite} (entry {index}): {detail}")]
    InvalidEntry {
        suite: String,
        index: usize,
        detail: String,
    },
    #[error("entry {index} in suite {suite} declares both suite and case")]
    AmbiguousEntry { suite: String, index: usize },
    #[error("suite {} includes itself", .path.display())]
    Cycle { path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    suite: Option<PathBuf>,
    case: Option<PathBuf>,
    name: Option<String>,
    #[serde(default)]
    opts: Vec<String>,
}

/// Load a suite file and everything it references.
pub fn load_suite(path: &Path, names: &mut NameAllocator) -> Result<Suite, LoadError> {
    SuiteLoader::new(names).load(path)
}

/// Build the root suite for the targets given on the command line.
///
/// Targets ending in `.yaml`/`.yml` load as suites; anything else is a bare
/// case without options. Relative targets resolve against `cwd`.
pub fn load_invocation(
    targets: &[PathBuf],
    cwd: &Path,
    names: &mut NameAllocator,
) -> Result<Suite, LoadError> {
    let mut root = Suite::new(ROOT_ID, PathBuf::new());
    let mut loader = SuiteLoader::new(names);
    for target in targets {
        let path = cwd.join(target);
        if is_suite_file(target) {
            root.children.push(Node::Suite(loader.load(&path)?));
        } else {
            let id = loader.names.allocate(&base_name(target));
            root.children.push(Node::Case(Case::new(id, path, Vec::new())));
        }
    }
    Ok(root)
}

pub fn is_suite_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

/// Replace every `<base>` in `option` with `dir`.
pub fn substitute_base(option: &str, dir: &Path) -> String {
    option.replace(BASE_PLACEHOLDER, &dir.to_string_lossy())
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

struct SuiteLoader<'a> {
    names: &'a mut NameAllocator,
    /// Canonical paths of the suites currently being loaded.
    stack: Vec<PathBuf>,
}

impl<'a> SuiteLoader<'a> {
    fn new(names: &'a mut NameAllocator) -> Self {
        Self {
            names,
            stack: Vec::new(),
        }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn load(&mut self, path: &Path) -> Result<Suite, LoadError> {
        let path = std::path::absolute(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut suite = Suite::new(self.names.allocate(&base_name(&path)), path.clone());

        let contents = fs::read_to_string(&path).map_err(|source| LoadError::Read {
            path: path.clone(),
            source,
        })?;
        let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if self.stack.contains(&canonical) {
            return Err(LoadError::Cycle { path });
        }

        let entries = parse_entries(&path, &contents)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        self.stack.push(canonical);
        for (index, entry) in entries.into_iter().enumerate() {
            let raw: RawEntry =
                serde_yaml::from_value(entry).map_err(|err| LoadError::InvalidEntry {
                    suite: suite.id.clone(),
                    index,
                    detail: err.to_string(),
                })?;
            let child = match (raw.suite, raw.case) {
                (Some(nested), None) => Node::Suite(self.load(&dir.join(nested))?),
                (None, Some(case)) => {
                    let label = raw.name.unwrap_or_else(|| base_name(&case));
                    let options = raw
                        .opts
                        .iter()
                        .map(|opt| substitute_base(opt, &dir))
                        .collect();
                    Node::Case(Case::new(
                        self.names.allocate(&label),
                        dir.join(case),
                        options,
                    ))
                }
                (Some(_), Some(_)) => {
                    return Err(LoadError::AmbiguousEntry {
                        suite: suite.id.clone(),
                        index,
                    });
                }
                (None, None) => {
                    return Err(LoadError::InvalidEntry {
                        suite: suite.id.clone(),
                        index,
                        detail: "entry has neither `suite` nor `case`".to_string(),
                    });
                }
            };
            suite.children.push(child);
        }
        self.stack.pop();

        debug!(id = %suite.id, children = suite.children.len(), "suite loaded");
        Ok(suite)
    }
}

fn parse_entries(path: &Path, contents: &str) -> Result<Vec<Value>, LoadError> {
    let doc: Value = serde_yaml::from_str(contents).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match doc {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(entries) => Ok(entries),
        _ => Err(LoadError::NotASequence {
            path: path.to_path_buf(),
        }),
    }
}
