//! Commands file loading.
//!
//! The document is parsed into an ordered YAML tree and every command entry
//! is validated field by field. A malformed entry is rejected on its own with
//! an [`EntryError`] naming the offending field; the rest of the document is
//! still loaded.

use crate::command::{CommandSpec, RunOption, SourceLocation};
use crate::types::CommandName;
use indexmap::IndexMap;
use regex::Regex;
use serde_yaml_ng::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read commands file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse commands file: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
    #[error("expected a mapping of command names at the top level of {0}")]
    NotAMapping(PathBuf),
}

/// Why a single command entry was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("invalid command name: \"{0}\"")]
    InvalidName(String),
    #[error("entry \"{name}\" must be a mapping of fields")]
    NotAMapping { name: String },
    #[error("invalid or missing \"dockerfile\" entry in \"{name}\"")]
    MissingDockerfile { name: String },
    #[error("Dockerfile \"{}\" from \"{name}\" not found", path.display())]
    DockerfileNotFound { name: String, path: PathBuf },
    #[error("expecting string or list of strings in \"{field}\" entry in \"{name}\"")]
    ExpectedText { name: String, field: &'static str },
    #[error("expecting object (dictionary) in \"{field}\" entry in \"{name}\"")]
    ExpectedMapping { name: String, field: &'static str },
    #[error("unsupported value for option \"{key}\" in \"{name}\"")]
    InvalidOption { name: String, key: String },
    #[error("unknown field \"{field}\" in \"{name}\"")]
    UnknownField { name: String, field: String },
}

const KNOWN_FIELDS: &[&str] = &[
    "dockerfile",
    "share",
    "append",
    "options",
    "prompt",
    "password",
    "prebuild",
    "postbuild",
];

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-z_](?:[0-9.a-z_-]*[0-9a-z_])?$").expect("valid name regex")
});

/// Written to a commands file that does not exist yet.
pub const TEMPLATE: &str = r#"#
# Development containers available as commands.
#
# command_name:                 # Becomes an executable on your PATH.
#   dockerfile: relative/path/to.Dockerfile
#   share:
#     # Optional. A string or a list of strings. Each absolute directory is
#     # mounted in the container at the same location as on the host.
#     - /path/to/shared/directory
#   append: |
#     # Optional. String or list of strings appended to the Dockerfile.
#     RUN git config --global user.name "Mona Lisa"
#   options:
#     # Optional. `docker run` long flags, e.g. `memory: 2g` -> --memory=2g.
#     memory: 2g
#   prompt:
#     # Optional. Build args asked for at build time: NAME: prompt text.
#     GIT_EMAIL: Your git e-mail
#   password:
#     # Optional. Build secrets asked for at build time (never stored).
#     NPM_TOKEN: npm token
#   prebuild: |
#     # Optional. Bash script run before the image build.
#   postbuild: |
#     # Optional. Bash script run after a successful build.
#
# After renaming commands, run `mydock` again to refresh the launchers.
#

"#;

/// The validated content of one commands file.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub commands: IndexMap<CommandName, CommandSpec>,
    pub rejected: Vec<EntryError>,
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }
}

pub fn is_valid_command_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Load the commands file, creating it from [`TEMPLATE`] when missing.
pub fn load_commands_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
    if !path.exists() {
        info!("creating commands file {}", path.display());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, TEMPLATE)?;
    }
    let text = std::fs::read_to_string(path)?;
    parse_commands_str(&text, path)
}

/// Parse and validate a commands document. Relative Dockerfile paths are
/// resolved against the directory of `path`.
pub fn parse_commands_str(text: &str, path: &Path) -> Result<LoadedConfig, ConfigError> {
    let mut loaded = LoadedConfig {
        path: path.to_path_buf(),
        commands: IndexMap::new(),
        rejected: Vec::new(),
        warnings: Vec::new(),
    };

    let root: Value = serde_yaml_ng::from_str(text)?;
    let mapping = match root {
        Value::Null => {
            info!("no commands defined in {}", path.display());
            return Ok(loaded);
        }
        Value::Mapping(m) => m,
        _ => return Err(ConfigError::NotAMapping(path.to_path_buf())),
    };

    let base_dir = path.parent().unwrap_or(Path::new("."));
    for (key, entry) in &mapping {
        let Some(name) = scalar_to_string(key) else {
            let err = EntryError::InvalidName(format!("{key:?}"));
            error!("{err}");
            loaded.rejected.push(err);
            continue;
        };
        let location = SourceLocation {
            file: path.to_path_buf(),
            line: find_line(text, &name),
        };
        match validate_entry(&name, entry, base_dir, location, &mut loaded.warnings) {
            Ok(spec) => {
                debug!("loaded command {name}");
                loaded.commands.insert(spec.name.clone(), spec);
            }
            Err(err) => {
                error!("{err}");
                loaded.rejected.push(err);
            }
        }
    }
    Ok(loaded)
}

fn validate_entry(
    name: &str,
    entry: &Value,
    base_dir: &Path,
    source: SourceLocation,
    warnings: &mut Vec<String>,
) -> Result<CommandSpec, EntryError> {
    if !is_valid_command_name(name) {
        return Err(EntryError::InvalidName(name.to_owned()));
    }
    let Value::Mapping(fields) = entry else {
        return Err(EntryError::NotAMapping {
            name: name.to_owned(),
        });
    };
    for key in fields.keys() {
        let field = scalar_to_string(key).unwrap_or_else(|| format!("{key:?}"));
        if !KNOWN_FIELDS.contains(&field.as_str()) {
            return Err(EntryError::UnknownField {
                name: name.to_owned(),
                field,
            });
        }
    }

    let Some(Value::String(dockerfile)) = fields.get("dockerfile") else {
        return Err(EntryError::MissingDockerfile {
            name: name.to_owned(),
        });
    };
    let dockerfile = base_dir.join(dockerfile);
    if !dockerfile.is_file() {
        return Err(EntryError::DockerfileNotFound {
            name: name.to_owned(),
            path: dockerfile,
        });
    }

    Ok(CommandSpec {
        name: CommandName::new(name),
        dockerfile,
        share: share_field(fields, name, warnings)?,
        append: text_field(fields, name, "append")?,
        options: options_field(fields, name)?,
        prompt: string_map_field(fields, name, "prompt")?,
        password: string_map_field(fields, name, "password")?,
        prebuild: text_field(fields, name, "prebuild")?,
        postbuild: text_field(fields, name, "postbuild")?,
        source,
    })
}

fn share_field(
    fields: &Mapping,
    name: &str,
    warnings: &mut Vec<String>,
) -> Result<Vec<PathBuf>, EntryError> {
    let items: Vec<&Value> = match fields.get("share") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Sequence(seq)) => seq.iter().collect(),
        Some(other) => vec![other],
    };
    let mut share = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(dir) = item else {
            return Err(EntryError::ExpectedText {
                name: name.to_owned(),
                field: "share",
            });
        };
        let path = PathBuf::from(dir);
        if path.is_absolute() && path.is_dir() {
            share.push(path);
        } else {
            let msg = format!("invalid share \"{dir}\" in \"{name}\"");
            warn!("{msg}");
            warnings.push(msg);
        }
    }
    Ok(share)
}

fn text_field(fields: &Mapping, name: &str, field: &'static str) -> Result<String, EntryError> {
    let expected = || EntryError::ExpectedText {
        name: name.to_owned(),
        field,
    };
    match fields.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Sequence(lines)) => {
            let mut out = Vec::with_capacity(lines.len());
            for line in lines {
                let Value::String(s) = line else {
                    return Err(expected());
                };
                out.push(s.as_str());
            }
            Ok(out.join("\n"))
        }
        Some(_) => Err(expected()),
    }
}

fn options_field(fields: &Mapping, name: &str) -> Result<IndexMap<String, RunOption>, EntryError> {
    let map = match fields.get("options") {
        None | Some(Value::Null) => return Ok(IndexMap::new()),
        Some(Value::Mapping(m)) => m,
        Some(_) => {
            return Err(EntryError::ExpectedMapping {
                name: name.to_owned(),
                field: "options",
            })
        }
    };
    let mut options = IndexMap::with_capacity(map.len());
    for (key, value) in map {
        let invalid = || EntryError::InvalidOption {
            name: name.to_owned(),
            key: scalar_to_string(key).unwrap_or_else(|| format!("{key:?}")),
        };
        let Some(key_str) = scalar_to_string(key) else {
            return Err(invalid());
        };
        let option = match value {
            Value::Bool(b) => RunOption::Flag(*b),
            Value::Sequence(items) => RunOption::List(
                items
                    .iter()
                    .map(scalar_to_string)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(invalid)?,
            ),
            other => RunOption::Value(scalar_to_string(other).ok_or_else(invalid)?),
        };
        options.insert(key_str, option);
    }
    Ok(options)
}

fn string_map_field(
    fields: &Mapping,
    name: &str,
    field: &'static str,
) -> Result<IndexMap<String, String>, EntryError> {
    let expected = || EntryError::ExpectedMapping {
        name: name.to_owned(),
        field,
    };
    let map = match fields.get(field) {
        None | Some(Value::Null) => return Ok(IndexMap::new()),
        Some(Value::Mapping(m)) => m,
        Some(_) => return Err(expected()),
    };
    let mut out = IndexMap::with_capacity(map.len());
    for (key, value) in map {
        let (Some(k), Some(v)) = (scalar_to_string(key), scalar_to_string(value)) else {
            return Err(expected());
        };
        out.insert(k, v);
    }
    Ok(out)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 1-based line of the `name:` key at the start of a line, if present.
fn find_line(text: &str, name: &str) -> Option<usize> {
    let key = format!("{name}:");
    if text.starts_with(&key) {
        return Some(1);
    }
    let needle = format!("\n{key}");
    text.find(&needle)
        .map(|idx| text[..idx].matches('\n').count() + 2)
}
