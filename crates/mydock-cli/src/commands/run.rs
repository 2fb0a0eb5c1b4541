//! Entry point of the PATH launchers: `mydock run <name> [flags] [args...]`.
//!
//! Leading arguments starting with `-` are launcher flags until the first
//! argument that is not; everything from there on runs inside the container.
//! A doubled dash is accepted for every flag (`--stop` is `-stop`).

use super::{exit_byte, Session, EXIT_SUCCESS};
use mydock_core::{CoreError, EXIT_CONFIG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherAction {
    Execute,
    Build,
    Stop,
    Dispose,
    DisposeImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherArgs {
    pub action: LauncherAction,
    pub quiet: bool,
    pub args: Vec<String>,
}

/// Split launcher flags from the in-container command line. When several
/// action flags are given the last one wins.
pub fn parse_launcher_args(raw: &[String]) -> Result<LauncherArgs, String> {
    let mut action = LauncherAction::Execute;
    let mut quiet = false;
    let mut rest = raw;
    while let Some((first, tail)) = rest.split_first() {
        if !first.starts_with('-') {
            break;
        }
        let flag = first.strip_prefix('-').unwrap_or(first);
        let flag = flag.strip_prefix('-').unwrap_or(flag);
        match flag {
            "q" => quiet = true,
            "d" | "del" | "delete" => action = LauncherAction::Dispose,
            "del-img" | "delete-img" | "del-image" | "delete-image" => {
                action = LauncherAction::DisposeImage;
            }
            "s" | "stop" => action = LauncherAction::Stop,
            "b" | "build" => action = LauncherAction::Build,
            _ => return Err(format!("Unknown option \"{first}\".")),
        }
        rest = tail;
    }
    Ok(LauncherArgs {
        action,
        quiet,
        args: rest.to_vec(),
    })
}

pub fn run(session: &Session, name: &str, raw: &[String]) -> Result<u8, CoreError> {
    let parsed = match parse_launcher_args(raw) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{message}");
            return Ok(exit_byte(EXIT_CONFIG));
        }
    };
    let mut reconciler = session.reconciler()?;
    let quiet = parsed.quiet;
    match parsed.action {
        LauncherAction::Execute => reconciler.execute(name, &parsed.args, quiet)?,
        LauncherAction::Build => reconciler.build(name, quiet)?,
        LauncherAction::Stop => reconciler.stop(name, quiet)?,
        LauncherAction::Dispose => reconciler.dispose(name, quiet)?,
        LauncherAction::DisposeImage => reconciler.dispose_image(name, quiet)?,
    }
    Ok(EXIT_SUCCESS)
}
