//! CLI subprocess integration tests.
//!
//! These tests invoke the `mydock` binary against the in-memory engine with
//! a throwaway HOME, commands file and data directory.

use std::path::Path;
use std::process::{Command, Output};

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> std::path::PathBuf {
        self.path().join("config").join("commands.yaml")
    }

    fn with_dev_command(self) -> Self {
        let config_dir = self.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("dev.Dockerfile"), "FROM alpine\n").unwrap();
        std::fs::write(self.config(), "dev:\n  dockerfile: dev.Dockerfile\n").unwrap();
        self
    }

    fn mydock(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_mydock"));
        cmd.env("HOME", self.path())
            .env("PATH", "/usr/bin:/bin")
            .env("MYDOCK_ENGINE", "mock")
            .env("MYDOCK_CONFIG", self.config())
            .env("MYDOCK_DATA_DIR", self.path().join("data"))
            .env_remove("MYDOCK_LOG")
            .current_dir(self.path());
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.mydock().args(args).output().unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn version_exits_zero() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("mydock"));
}

#[test]
fn help_lists_subcommands() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for sub in ["build", "start", "stop", "dispose", "exec", "status", "serve"] {
        assert!(text.contains(sub), "help must list '{sub}': {text}");
    }
}

#[test]
fn status_json_creates_template_config() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["status", "--json", "--no-rebuild"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["commands"].as_array().unwrap().len(), 0);
    assert!(sandbox.config().exists(), "template must be written");
}

#[test]
fn status_json_reports_declared_command() {
    let sandbox = Sandbox::new().with_dev_command();
    let output = sandbox.run(&["status", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let commands = report["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["name"], "dev");
    assert_eq!(commands[0]["freshness"], "deleted");
    assert!(commands[0]["source"]
        .as_str()
        .unwrap()
        .ends_with("commands.yaml:1"));
}

#[test]
fn plain_status_prints_report() {
    let sandbox = Sandbox::new().with_dev_command();
    let output = sandbox.run(&[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = console::strip_ansi_codes(&stdout(&output)).into_owned();
    assert!(text.contains("Configuration file:"));
    assert!(text.contains("Container:  [Deleted]"));
    assert!(text.contains("Executable: Unavailable"));
}

#[test]
fn exec_on_mock_engine_succeeds() {
    let sandbox = Sandbox::new().with_dev_command();
    let output = sandbox.run(&["exec", "-q", "dev", "--", "true"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn unknown_command_exits_with_config_code() {
    let sandbox = Sandbox::new().with_dev_command();
    let output = sandbox.run(&["start", "nope"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("\"nope\""));
}

#[test]
fn launcher_rejects_unknown_flag() {
    let sandbox = Sandbox::new().with_dev_command();
    let output = sandbox.run(&["run", "dev", "--", "-x"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Unknown option \"-x\"."));
}

#[test]
fn launcher_stop_without_container_succeeds() {
    let sandbox = Sandbox::new().with_dev_command();
    let output = sandbox.run(&["run", "dev", "--", "-q", "--stop"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn unknown_engine_exits_with_engine_code() {
    let sandbox = Sandbox::new().with_dev_command();
    let output = sandbox
        .mydock()
        .args(["--engine", "podman-compose", "status", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).starts_with("error:"));
}

#[test]
fn install_reports_missing_bin_dir() {
    let sandbox = Sandbox::new().with_dev_command();
    let output = sandbox.run(&["install"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("dev:"));
}

#[test]
fn install_writes_launchers_into_home_bin() {
    let sandbox = Sandbox::new().with_dev_command();
    let bin = sandbox.path().join(".local").join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let output = sandbox
        .mydock()
        .env("PATH", format!("{}:/usr/bin:/bin", bin.display()))
        .arg("install")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let script = std::fs::read_to_string(bin.join("dev")).unwrap();
    assert!(script.contains("run 'dev' --"));
}

#[test]
fn doctor_json_is_parseable() {
    let sandbox = Sandbox::new().with_dev_command();
    let output = sandbox.run(&["doctor", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(report["checks"].as_array().unwrap().len() >= 3);
    assert_eq!(report["healthy"], true);
}

#[test]
fn completions_for_bash() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("mydock"));
}

#[test]
fn man_pages_are_written() {
    let sandbox = Sandbox::new();
    let dir = sandbox.path().join("man");
    let output = sandbox.run(&["man-pages", dir.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.join("mydock.1").exists());
    assert!(dir.join("mydock-status.1").exists());
}
