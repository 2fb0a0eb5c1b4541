use super::{colorize_container, colorize_freshness, json_pretty, Session, EXIT_SUCCESS};
use console::style;
use mydock_core::{CommandStatus, CoreError, Reconciler, StatusReport};
use std::fmt::Write as _;
use tracing::warn;

const INDENT: &str = "        ";

fn format_command(cmd: &CommandStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", style(cmd.name.as_str()).bold());

    match &cmd.container {
        Some(c) => {
            let _ = writeln!(
                out,
                "{INDENT}Container:  {} {} {}",
                colorize_container(Some(c.status)),
                c.id,
                c.name
            );
        }
        None => {
            let _ = writeln!(out, "{INDENT}Container:  {}", colorize_container(None));
        }
    }
    if cmd.has_conflict() {
        let _ = writeln!(
            out,
            "{INDENT}            {}",
            style(format!("{} containers share this command", cmd.container_count)).red()
        );
    }

    match &cmd.image {
        Some(image) => {
            let _ = writeln!(
                out,
                "{INDENT}Image:      {} {} {}",
                colorize_freshness(cmd.freshness),
                image.id,
                image.tags.join(", ")
            );
        }
        None => {
            let _ = writeln!(out, "{INDENT}Image:      {}", colorize_freshness(cmd.freshness));
        }
    }

    match &cmd.executable {
        Some(path) => {
            let _ = writeln!(out, "{INDENT}Executable: {}", path.display());
        }
        None => {
            let _ = writeln!(out, "{INDENT}Executable: {}", style("Unavailable").red());
        }
    }

    let _ = writeln!(
        out,
        "{INDENT}Dockerfile: {}{}",
        cmd.dockerfile.display(),
        if cmd.customized {
            " (customized in yaml file)"
        } else {
            ""
        }
    );

    let mut label = "Share:";
    for dir in &cmd.share {
        let _ = writeln!(out, "{INDENT}{label:<12}{}", dir.display());
        label = "";
    }

    let _ = writeln!(out, "{INDENT}Config:     {}", cmd.source);
    out
}

/// Human-readable report, one block per command.
pub fn format_report(report: &StatusReport) -> String {
    let mut out = format!("\nConfiguration file: {}\n", report.config_path.display());
    for rejected in &report.rejected {
        let _ = writeln!(out, "{} {rejected}", style("rejected:").red());
    }
    if report.commands.is_empty() {
        let _ = writeln!(out, "\nNo commands defined yet. Edit the file above to add some.");
    }
    for cmd in &report.commands {
        out.push_str(&format_command(cmd));
    }
    out
}

fn install_launchers(reconciler: &Reconciler) {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            warn!("cannot locate the mydock executable: {e}");
            return;
        }
    };
    for (name, result) in reconciler.install_launchers(&exe) {
        if let Err(e) = result {
            eprintln!(
                "{} cannot create the executable for \"{name}\": {e}",
                style("warning:").yellow()
            );
        }
    }
}

/// Refresh the launchers, print the status of every command, and offer to
/// rebuild outdated images when a user is at the terminal.
pub fn run(session: &Session, json: bool, no_rebuild: bool) -> Result<u8, CoreError> {
    let mut reconciler = session.reconciler()?;
    for warning in reconciler.registry().warnings() {
        eprintln!("{} {warning}", style("warning:").yellow());
    }

    if json {
        let report = reconciler.status()?;
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    install_launchers(&reconciler);
    let report = reconciler.status()?;
    print!("{}", format_report(&report));

    let stale = report.stale();
    if stale.is_empty() || no_rebuild || !console::user_attended() {
        return Ok(EXIT_SUCCESS);
    }
    let failures = reconciler.rebuild_stale(&stale)?;
    for (name, err) in &failures {
        if !err.is_silent() {
            eprintln!("{} {name}: {err}", style("error:").red());
        }
    }
    reconciler.reload()?;
    let report = reconciler.status()?;
    print!("{}", format_report(&report));
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mydock_core::{ContainerSummary, ImageFreshness, ImageSummary};
    use mydock_runtime::ContainerStatus;
    use mydock_schema::CommandName;
    use std::path::PathBuf;

    fn command(name: &str) -> CommandStatus {
        CommandStatus {
            name: CommandName::new(name),
            container: None,
            container_count: 0,
            freshness: ImageFreshness::Deleted,
            image: None,
            executable: None,
            dockerfile: PathBuf::from("/cfg/dev.Dockerfile"),
            customized: false,
            share: Vec::new(),
            source: "/cfg/commands.yaml:3".to_owned(),
        }
    }

    fn report(commands: Vec<CommandStatus>) -> StatusReport {
        StatusReport {
            config_path: PathBuf::from("/cfg/commands.yaml"),
            commands,
            rejected: Vec::new(),
        }
    }

    fn plain(report: &StatusReport) -> String {
        console::strip_ansi_codes(&format_report(report)).into_owned()
    }

    #[test]
    fn empty_command_block() {
        let text = plain(&report(vec![command("dev")]));
        assert!(text.contains("Configuration file: /cfg/commands.yaml"));
        assert!(text.contains("Container:  [Deleted]"));
        assert!(text.contains("Image:      [Deleted]"));
        assert!(text.contains("Executable: Unavailable"));
        assert!(text.contains("Dockerfile: /cfg/dev.Dockerfile\n"));
        assert!(text.contains("Config:     /cfg/commands.yaml:3"));
    }

    #[test]
    fn populated_command_block() {
        let mut cmd = command("dev");
        cmd.container = Some(ContainerSummary {
            id: "0123456789ab".to_owned(),
            name: "dev-1".to_owned(),
            status: ContainerStatus::Running,
        });
        cmd.container_count = 1;
        cmd.freshness = ImageFreshness::Outdated;
        cmd.image = Some(ImageSummary {
            id: "abcdef012345".to_owned(),
            tags: vec!["mydock-dev:latest".to_owned()],
        });
        cmd.executable = Some(PathBuf::from("/home/u/.local/bin/dev"));
        cmd.customized = true;
        cmd.share = vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")];

        let text = plain(&report(vec![cmd]));
        assert!(text.contains("[Running] 0123456789ab dev-1"));
        assert!(text.contains("[Outdated] abcdef012345 mydock-dev:latest"));
        assert!(text.contains("Executable: /home/u/.local/bin/dev"));
        assert!(text.contains("(customized in yaml file)"));
        assert!(text.contains("Share:      /srv/a"));
        assert!(text.contains("            /srv/b"));
        assert!(!text.contains("containers share this command"));
    }

    #[test]
    fn conflicts_and_rejections_are_shown() {
        let mut cmd = command("dev");
        cmd.container_count = 3;
        let mut r = report(vec![cmd]);
        r.rejected.push("invalid command name \"bad name\"".to_owned());
        let text = plain(&r);
        assert!(text.contains("3 containers share this command"));
        assert!(text.contains("bad name"));
    }

    #[test]
    fn empty_config_hint() {
        let text = plain(&report(Vec::new()));
        assert!(text.contains("No commands defined yet"));
    }
}
