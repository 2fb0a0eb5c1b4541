use crate::lifecycle::RetryPolicy;
use std::path::{Path, PathBuf};

/// Where mydock keeps its files and how it polls the engine.
#[derive(Debug, Clone)]
pub struct Settings {
    /// The commands file.
    pub config_path: PathBuf,
    /// Scratch Dockerfiles and the control panel token.
    pub data_dir: PathBuf,
    pub retry: RetryPolicy,
    /// Directories searched for, and receiving, command launchers.
    pub bin_dirs: Vec<PathBuf>,
}

fn home() -> PathBuf {
    std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from)
}

impl Settings {
    pub fn new(config_path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            data_dir: data_dir.into(),
            retry: RetryPolicy::default(),
            bin_dirs: Vec::new(),
        }
    }

    /// `~/.config/mydock/commands.yaml`
    pub fn default_config_path() -> PathBuf {
        home().join(".config").join("mydock").join("commands.yaml")
    }

    /// `~/.local/share/mydock`
    pub fn default_data_dir() -> PathBuf {
        home().join(".local").join("share").join("mydock")
    }

    /// Effective Dockerfile written for each build of `name`.
    pub fn scratch_dockerfile(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.Dockerfile"))
    }

    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join("private-key.txt")
    }

    pub fn config_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or(Path::new("."))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(Self::default_config_path(), Self::default_data_dir())
    }
}
