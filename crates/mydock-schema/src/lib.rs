//! Commands file schema for mydock.
//!
//! This crate defines the configuration layer: loading the YAML commands file,
//! validating each entry field by field into a fully resolved [`CommandSpec`],
//! and the string newtypes (`CommandName`, `ImageId`, `ContainerId`,
//! `Fingerprint`) shared by the runtime and core crates.

pub mod command;
pub mod config;
pub mod types;

pub use command::{CommandSpec, RunOption, SourceLocation};
pub use config::{
    is_valid_command_name, load_commands_file, parse_commands_str, ConfigError, EntryError,
    LoadedConfig, TEMPLATE,
};
pub use types::{CommandName, ContainerId, Fingerprint, ImageId};
