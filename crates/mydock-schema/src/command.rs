use crate::types::CommandName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A fully resolved command definition. Every optional field already carries
/// its default, so nothing downstream has to guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: CommandName,
    pub dockerfile: PathBuf,
    pub share: Vec<PathBuf>,
    pub append: String,
    pub options: IndexMap<String, RunOption>,
    pub prompt: IndexMap<String, String>,
    pub password: IndexMap<String, String>,
    pub prebuild: String,
    pub postbuild: String,
    pub source: SourceLocation,
}

impl CommandSpec {
    /// Image tag used for every build of this command.
    pub fn tag(&self) -> String {
        format!("mydock-{}", self.name)
    }

    /// Build context: the directory holding the base Dockerfile.
    pub fn context_dir(&self) -> &Path {
        self.dockerfile.parent().unwrap_or(Path::new("."))
    }

    /// Effective Dockerfile text: the base file followed by the appended fragment.
    pub fn effective_dockerfile(&self) -> std::io::Result<String> {
        let base = std::fs::read_to_string(&self.dockerfile)?;
        Ok(format!("{base}\n{}", self.append))
    }

    pub fn is_customized(&self) -> bool {
        !self.append.is_empty()
    }
}

/// One `docker run` option from the `options` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunOption {
    Flag(bool),
    Value(String),
    List(Vec<String>),
}

impl RunOption {
    /// Render as long command-line flags: `--key=value`, `--key`, or one
    /// flag per list item. `false` renders nothing.
    pub fn to_args(&self, key: &str) -> Vec<String> {
        match self {
            Self::Flag(true) => vec![format!("--{key}")],
            Self::Flag(false) => Vec::new(),
            Self::Value(v) => vec![format!("--{key}={v}")],
            Self::List(items) => items.iter().map(|v| format!("--{key}={v}")).collect(),
        }
    }
}

/// Where a command was declared, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: Option<usize>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.file.display()),
            None => write!(f, "{}", self.file.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(append: &str) -> CommandSpec {
        CommandSpec {
            name: CommandName::new("dev"),
            dockerfile: PathBuf::from("/work/dev.Dockerfile"),
            share: Vec::new(),
            append: append.to_owned(),
            options: IndexMap::new(),
            prompt: IndexMap::new(),
            password: IndexMap::new(),
            prebuild: String::new(),
            postbuild: String::new(),
            source: SourceLocation {
                file: PathBuf::from("/work/commands.yaml"),
                line: Some(4),
            },
        }
    }

    #[test]
    fn tag_and_context() {
        let s = spec("");
        assert_eq!(s.tag(), "mydock-dev");
        assert_eq!(s.context_dir(), Path::new("/work"));
        assert!(!s.is_customized());
        assert!(spec("RUN true").is_customized());
    }

    #[test]
    fn run_option_rendering() {
        assert_eq!(RunOption::Flag(true).to_args("init"), vec!["--init"]);
        assert!(RunOption::Flag(false).to_args("init").is_empty());
        assert_eq!(
            RunOption::Value("2g".to_owned()).to_args("memory"),
            vec!["--memory=2g"]
        );
        assert_eq!(
            RunOption::List(vec!["A=1".to_owned(), "B=2".to_owned()]).to_args("env"),
            vec!["--env=A=1", "--env=B=2"]
        );
    }

    #[test]
    fn source_location_display() {
        let s = spec("");
        assert_eq!(s.source.to_string(), "/work/commands.yaml:4");
        let no_line = SourceLocation {
            file: PathBuf::from("/c.yaml"),
            line: None,
        };
        assert_eq!(no_line.to_string(), "/c.yaml");
    }

    #[test]
    fn effective_dockerfile_appends_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.Dockerfile");
        std::fs::write(&path, "FROM alpine").unwrap();
        let mut s = spec("RUN apk add git");
        s.dockerfile = path;
        assert_eq!(
            s.effective_dockerfile().unwrap(),
            "FROM alpine\nRUN apk add git"
        );
    }
}
