use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn succeeds(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check the tools mydock shells out to.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_engine_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !succeeds("docker", &["--version"]) {
        missing.push(MissingPrereq {
            name: "docker",
            purpose: "building images and running containers",
            install_hint: "https://docs.docker.com/engine/install/",
        });
    } else if !succeeds("docker", &["buildx", "version"]) {
        missing.push(MissingPrereq {
            name: "docker buildx",
            purpose: "image builds with build secrets",
            install_hint: "apt install docker-buildx-plugin | dnf install docker-buildx-plugin | pacman -S docker-buildx",
        });
    }

    if !succeeds("bash", &["--version"]) {
        missing.push(MissingPrereq {
            name: "bash",
            purpose: "pre-build and post-build scripts",
            install_hint: "apt install bash | dnf install bash | pacman -S bash",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nmydock drives the docker CLI and needs these tools on PATH.");
    msg
}
