use crate::engine::{
    BuildRequest, ContainerEngine, ContainerInfo, ContainerStatus, ImageInfo, RunRequest,
};
use crate::{exit_code, RuntimeError};
use mydock_schema::{ContainerId, ImageId};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Environment variable prefix through which build secrets reach the builder.
pub const SECRET_ENV_PREFIX: &str = "MYDOCK_SECRET_";

/// [`ContainerEngine`] backed by the `docker` command-line client.
pub struct DockerEngine {
    program: String,
}

impl Default for DockerEngine {
    fn default() -> Self {
        Self {
            program: "docker".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageInspect {
    id: String,
    #[serde(default)]
    repo_tags: Option<Vec<String>>,
    #[serde(default)]
    config: Option<InspectConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerInspect {
    id: String,
    name: String,
    state: InspectState,
    #[serde(default)]
    config: Option<InspectConfig>,
}

impl DockerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run a captured docker command and return its stdout.
    fn run_captured(&self, args: &[&str]) -> Result<String, RuntimeError> {
        debug!("{} {}", self.program, args.join(" "));
        let output = Command::new(&self.program).args(args).output()?;
        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: format!("{} {}", self.program, args.first().unwrap_or(&"")),
                code: exit_code(output.status),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn list_ids(&self, args: &[&str]) -> Result<Vec<String>, RuntimeError> {
        let stdout = self.run_captured(args)?;
        let mut ids: Vec<String> = Vec::new();
        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !ids.iter().any(|id| id == line) {
                ids.push(line.to_owned());
            }
        }
        Ok(ids)
    }

    fn inspect<T: serde::de::DeserializeOwned>(
        &self,
        kind: &str,
        ids: &[String],
    ) -> Result<Vec<T>, RuntimeError> {
        let mut args = vec![kind, "inspect"];
        args.extend(ids.iter().map(String::as_str));
        let stdout = self.run_captured(&args)?;
        serde_json::from_str(&stdout)
            .map_err(|e| RuntimeError::Parse(format!("{kind} inspect output: {e}")))
    }
}

pub(crate) fn parse_image_inspect(json: &str) -> Result<Vec<ImageInfo>, RuntimeError> {
    let raw: Vec<ImageInspect> = serde_json::from_str(json)
        .map_err(|e| RuntimeError::Parse(format!("image inspect output: {e}")))?;
    Ok(raw.into_iter().filter_map(image_from_inspect).collect())
}

fn image_from_inspect(raw: ImageInspect) -> Option<ImageInfo> {
    let tags = raw.repo_tags.unwrap_or_default();
    if tags.is_empty() {
        return None;
    }
    Some(ImageInfo {
        id: ImageId::new(raw.id),
        tags,
        labels: raw.config.and_then(|c| c.labels).unwrap_or_default(),
    })
}

fn container_from_inspect(raw: ContainerInspect) -> Result<ContainerInfo, RuntimeError> {
    Ok(ContainerInfo {
        id: ContainerId::new(raw.id),
        name: raw.name.trim_start_matches('/').to_owned(),
        status: raw.state.status.parse()?,
        labels: raw.config.and_then(|c| c.labels).unwrap_or_default(),
    })
}

pub(crate) fn parse_container_inspect(json: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
    let raw: Vec<ContainerInspect> = serde_json::from_str(json)
        .map_err(|e| RuntimeError::Parse(format!("container inspect output: {e}")))?;
    raw.into_iter().map(container_from_inspect).collect()
}

fn run_args(request: &RunRequest) -> Vec<String> {
    let mut args = vec!["run".to_owned(), "-d".to_owned()];
    if request.privileged {
        args.push("--privileged".to_owned());
    }
    args.push("--name".to_owned());
    args.push(request.name.clone());
    for (k, v) in &request.labels {
        args.push("--label".to_owned());
        args.push(format!("{k}={v}"));
    }
    for mount in &request.mounts {
        args.push("-v".to_owned());
        args.push(format!(
            "{}:{}",
            mount.host.display(),
            mount.container.display()
        ));
    }
    args.extend(request.options.iter().cloned());
    args.push(request.image.to_string());
    args.extend(request.command.iter().cloned());
    args
}

fn build_args(request: &BuildRequest) -> Vec<String> {
    let mut args = vec![
        "buildx".to_owned(),
        "build".to_owned(),
        "-f".to_owned(),
        request.dockerfile.display().to_string(),
        "-t".to_owned(),
        request.tag.clone(),
    ];
    for (k, v) in &request.labels {
        args.push("--label".to_owned());
        args.push(format!("{k}={v}"));
    }
    for (k, v) in &request.build_args {
        args.push("--build-arg".to_owned());
        args.push(format!("{k}={v}"));
    }
    for secret in &request.secrets {
        args.push("--secret".to_owned());
        args.push(format!("id={},env={SECRET_ENV_PREFIX}{}", secret.id, secret.id));
    }
    args.push(".".to_owned());
    args
}

impl ContainerEngine for DockerEngine {
    fn name(&self) -> &str {
        "docker"
    }

    fn available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn list_images(&self, key: &str, value: &str) -> Result<Vec<ImageInfo>, RuntimeError> {
        let filter = format!("label={key}={value}");
        let ids = self.list_ids(&["image", "ls", "-q", "--no-trunc", "--filter", &filter])?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<ImageInspect> = self.inspect("image", &ids)?;
        Ok(raw.into_iter().filter_map(image_from_inspect).collect())
    }

    fn list_containers(&self, key: &str, value: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let filter = format!("label={key}={value}");
        let ids = self.list_ids(&["ps", "-a", "-q", "--no-trunc", "--filter", &filter])?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<ContainerInspect> = self.inspect("container", &ids)?;
        raw.into_iter().map(container_from_inspect).collect()
    }

    fn build_image(&self, request: &BuildRequest) -> Result<i32, RuntimeError> {
        debug!(
            "building {} from {} ({} build args, {} secrets)",
            request.tag,
            request.dockerfile.display(),
            request.build_args.len(),
            request.secrets.len()
        );
        let mut cmd = Command::new(&self.program);
        cmd.args(build_args(request)).current_dir(&request.context);
        for secret in &request.secrets {
            cmd.env(format!("{SECRET_ENV_PREFIX}{}", secret.id), &secret.value);
        }
        let status = cmd.status()?;
        Ok(exit_code(status))
    }

    fn run_container(&self, request: &RunRequest) -> Result<ContainerId, RuntimeError> {
        let args = run_args(request);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.run_captured(&refs)?;
        let id = stdout.trim();
        if id.is_empty() {
            return Err(RuntimeError::Parse(
                "docker run printed no container id".to_owned(),
            ));
        }
        Ok(ContainerId::new(id))
    }

    fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        self.run_captured(&["start", id.as_str()]).map(drop)
    }

    fn stop_container(&self, id: &ContainerId, timeout_secs: u32) -> Result<(), RuntimeError> {
        let timeout = timeout_secs.to_string();
        self.run_captured(&["stop", "-t", &timeout, id.as_str()])
            .map(drop)
    }

    fn unpause_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        self.run_captured(&["unpause", id.as_str()]).map(drop)
    }

    fn remove_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        self.run_captured(&["rm", "-f", id.as_str()]).map(drop)
    }

    fn remove_image(&self, id: &ImageId) -> Result<(), RuntimeError> {
        self.run_captured(&["rmi", "-f", id.as_str()]).map(drop)
    }

    fn install_executable(
        &self,
        id: &ContainerId,
        local: &Path,
        dest: &str,
    ) -> Result<(), RuntimeError> {
        let local = local.display().to_string();
        let target = format!("{id}:{dest}");
        self.run_captured(&["cp", &local, &target])?;
        self.run_captured(&["exec", id.as_str(), "chmod", "+x", dest])
            .map(drop)
    }

    fn exec(
        &self,
        id: &ContainerId,
        env: &[(String, String)],
        command: &[String],
    ) -> Result<i32, RuntimeError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["exec", "-i"]);
        if std::io::stdin().is_terminal() {
            cmd.arg("-t");
        }
        for (k, v) in env {
            cmd.arg("-e").arg(format!("{k}={v}"));
        }
        cmd.arg(id.as_str()).args(command);
        debug!("docker exec {} {command:?}", id.short());
        let status = cmd.status()?;
        Ok(exit_code(status))
    }
}
