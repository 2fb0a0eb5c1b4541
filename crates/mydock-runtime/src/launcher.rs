//! Per-command launcher scripts placed on the user's `PATH`.
//!
//! A launcher is a tiny `sh` script that calls back into `mydock run <name> -- ...`.
//! Launchers carry a marker line; files without it belong to someone else and
//! are never overwritten.

use crate::RuntimeError;
use std::ffi::OsStr;
use std::io::Read as _;
use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MARKER: &str = "# mydock-generated launcher";

/// Bin directories under `home` listed in `path_var`, best candidate first.
///
/// Directories whose path mentions `env` (virtualenvs, pyenv shims) are
/// skipped. `bin`/`sbin` directories and those under a `*local` parent win;
/// ties go to the shorter path, then to `PATH` order.
pub fn bin_dirs(path_var: &OsStr, home: &Path) -> Vec<PathBuf> {
    let Ok(home) = home.canonicalize() else {
        return Vec::new();
    };
    let mut scored: Vec<(i64, PathBuf)> = Vec::new();
    for (index, entry) in std::env::split_paths(path_var).enumerate() {
        let Ok(dir) = entry.canonicalize() else {
            continue;
        };
        if dir == home || !dir.starts_with(&home) {
            continue;
        }
        if dir.to_string_lossy().contains("env") {
            continue;
        }
        if scored.iter().any(|(_, seen)| seen == &dir) {
            continue;
        }
        let mut score = dir.as_os_str().len() as i64 * 1000 + index as i64;
        if matches!(
            dir.file_name().and_then(OsStr::to_str),
            Some("bin" | "sbin")
        ) {
            score -= 1_000_000;
        }
        if dir
            .parent()
            .and_then(Path::file_name)
            .and_then(OsStr::to_str)
            .is_some_and(|p| p.ends_with("local"))
        {
            score -= 1_000_000;
        }
        scored.push((score, dir));
    }
    scored.sort_by_key(|(score, _)| *score);
    scored.into_iter().map(|(_, dir)| dir).collect()
}

/// Bin directories for the current process environment.
pub fn default_bin_dirs() -> Vec<PathBuf> {
    match (std::env::var_os("PATH"), std::env::var_os("HOME")) {
        (Some(path), Some(home)) => bin_dirs(&path, Path::new(&home)),
        _ => Vec::new(),
    }
}

/// First existing `name` in `dirs`.
pub fn find_command(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter().map(|d| d.join(name)).find(|p| p.exists())
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

pub fn launcher_script(exe: &Path, name: &str) -> String {
    format!(
        "#!/bin/sh\n{MARKER}\nexec {} run {} -- \"$@\"\n",
        shell_quote(&exe.to_string_lossy()),
        shell_quote(name)
    )
}

fn is_ours(path: &Path) -> Result<bool, RuntimeError> {
    let mut head = Vec::with_capacity(512);
    std::fs::File::open(path)?
        .take(512)
        .read_to_end(&mut head)?;
    Ok(String::from_utf8_lossy(&head)
        .lines()
        .any(|line| line == MARKER))
}

fn write_launcher(path: &Path, script: &str) -> Result<(), RuntimeError> {
    if path.exists() {
        if !path.is_file() {
            return Err(RuntimeError::Launcher(format!(
                "cannot override '{}': not a regular file",
                path.display()
            )));
        }
        if !is_ours(path)? {
            return Err(RuntimeError::Launcher(format!(
                "cannot override '{}': it was not created by mydock",
                path.display()
            )));
        }
    }
    std::fs::write(path, script)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// Write the launcher for `name` and return where it went.
///
/// An existing launcher's directory is reused; otherwise the best writable
/// directory from `dirs` is taken.
pub fn install_launcher(name: &str, exe: &Path, dirs: &[PathBuf]) -> Result<PathBuf, RuntimeError> {
    if dirs.is_empty() {
        return Err(RuntimeError::Launcher(
            "no bin directory under $HOME is listed in PATH; add ~/.local/bin to PATH".to_owned(),
        ));
    }
    let script = launcher_script(exe, name);
    let candidates: Vec<PathBuf> = match find_command(name, dirs) {
        Some(existing) => existing.parent().map(Path::to_path_buf).into_iter().collect(),
        None => dirs.to_vec(),
    };

    let mut last_error = None;
    for dir in candidates {
        let path = dir.join(name);
        match write_launcher(&path, &script) {
            Ok(()) => {
                debug!("launcher for {name} at {}", path.display());
                return Ok(path);
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| RuntimeError::Launcher(format!("no place for '{name}'"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn path_of(dirs: &[&Path]) -> OsString {
        std::env::join_paths(dirs).unwrap()
    }

    #[test]
    fn bin_dirs_prefer_local_bin_and_skip_env() {
        let home = tempfile::tempdir().unwrap();
        let h = home.path();
        for d in ["scripts", ".local/bin", "bin", ".pyenv/shims"] {
            std::fs::create_dir_all(h.join(d)).unwrap();
        }
        let outside = tempfile::tempdir().unwrap();
        let path = path_of(&[
            outside.path(),
            &h.join("scripts"),
            &h.join("bin"),
            &h.join(".local/bin"),
            &h.join(".pyenv/shims"),
            &h.join("bin"),
        ]);
        let dirs = bin_dirs(&path, h);
        let canon = |d: &str| h.join(d).canonicalize().unwrap();
        assert_eq!(dirs, vec![canon(".local/bin"), canon("bin"), canon("scripts")]);
    }

    #[test]
    fn launcher_script_quotes() {
        let script = launcher_script(Path::new("/opt/my dock/mydock"), "dev");
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains(MARKER));
        assert!(script.contains("exec '/opt/my dock/mydock' run 'dev' -- \"$@\""));
    }

    #[test]
    fn install_and_overwrite_own_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = vec![dir.path().to_path_buf()];
        let path = install_launcher("dev", Path::new("/usr/bin/mydock"), &dirs).unwrap();
        assert_eq!(path, dir.path().join("dev"));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        install_launcher("dev", Path::new("/usr/local/bin/mydock"), &dirs).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("/usr/local/bin/mydock"));
        assert_eq!(find_command("dev", &dirs), Some(path));
    }

    #[test]
    fn foreign_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let foreign = dir.path().join("dev");
        std::fs::write(&foreign, "#!/bin/sh\necho mine\n").unwrap();
        let err = install_launcher("dev", Path::new("/usr/bin/mydock"), &[dir.path().to_path_buf()])
            .unwrap_err();
        assert!(err.to_string().contains("not created by mydock"));
        assert_eq!(
            std::fs::read_to_string(&foreign).unwrap(),
            "#!/bin/sh\necho mine\n"
        );
    }

    #[test]
    fn no_dirs_is_an_error() {
        assert!(install_launcher("dev", Path::new("/usr/bin/mydock"), &[]).is_err());
    }
}
