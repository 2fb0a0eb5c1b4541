use super::{exit_byte, json_pretty, Session, EXIT_SUCCESS};
use mydock_core::{CoreError, EXIT_FAILURE};
use mydock_runtime::{check_engine_prereqs, format_missing, launcher::default_bin_dirs};
use mydock_schema::load_commands_file;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
}

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    status: CheckStatus,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
        }
    }
}

fn check_prereqs(session: &Session, checks: &mut Vec<Check>) {
    if session.engine != "docker" {
        checks.push(Check::new(
            "engine_prereqs",
            CheckStatus::Info,
            format!("Engine '{}' needs no host tools", session.engine),
        ));
        return;
    }
    let missing = check_engine_prereqs();
    if missing.is_empty() {
        checks.push(Check::new(
            "engine_prereqs",
            CheckStatus::Pass,
            "docker, docker buildx and bash are available",
        ));
    } else {
        checks.push(Check::new(
            "engine_prereqs",
            CheckStatus::Fail,
            format_missing(&missing),
        ));
    }
}

fn check_commands_file(session: &Session, checks: &mut Vec<Check>) {
    let path = &session.settings.config_path;
    match load_commands_file(path) {
        Ok(loaded) if loaded.rejected.is_empty() => checks.push(Check::new(
            "commands_file",
            CheckStatus::Pass,
            format!(
                "{} defines {} command(s)",
                path.display(),
                loaded.commands.len()
            ),
        )),
        Ok(loaded) => {
            let reasons: Vec<String> = loaded.rejected.iter().map(ToString::to_string).collect();
            checks.push(Check::new(
                "commands_file",
                CheckStatus::Warn,
                format!(
                    "{} has {} rejected entr{}: {}",
                    path.display(),
                    reasons.len(),
                    if reasons.len() == 1 { "y" } else { "ies" },
                    reasons.join("; ")
                ),
            ));
        }
        Err(e) => checks.push(Check::new(
            "commands_file",
            CheckStatus::Fail,
            format!("{}: {e}", path.display()),
        )),
    }
}

fn check_bin_dir(checks: &mut Vec<Check>) {
    match default_bin_dirs().first() {
        Some(dir) => checks.push(Check::new(
            "launcher_dir",
            CheckStatus::Pass,
            format!("Launchers go to {}", dir.display()),
        )),
        None => checks.push(Check::new(
            "launcher_dir",
            CheckStatus::Warn,
            "No bin directory under $HOME is on PATH; add ~/.local/bin to PATH",
        )),
    }
}

/// Run every check and report.
pub fn run(session: &Session, json_output: bool) -> Result<u8, CoreError> {
    let mut checks = Vec::new();
    check_prereqs(session, &mut checks);
    check_commands_file(session, &mut checks);
    check_bin_dir(&mut checks);
    print_results(&checks, json_output)
}

fn print_results(checks: &[Check], json_output: bool) -> Result<u8, CoreError> {
    let all_pass = checks.iter().all(|c| c.status != CheckStatus::Fail);
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks,
        });
        println!("{}", json_pretty(&json)?);
    } else {
        println!("mydock doctor\n");
        for check in checks {
            let icon = match check.status {
                CheckStatus::Pass => "✓",
                CheckStatus::Fail => "✗",
                CheckStatus::Warn => "⚠",
                CheckStatus::Info => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass {
        EXIT_SUCCESS
    } else {
        exit_byte(EXIT_FAILURE)
    })
}
