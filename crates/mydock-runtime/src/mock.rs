use crate::engine::{
    BuildRequest, ContainerEngine, ContainerInfo, ContainerStatus, ImageInfo, RunRequest,
};
use crate::RuntimeError;
use mydock_schema::{ContainerId, ImageId};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct MockContainer {
    info: ContainerInfo,
    /// Listings left before a restarting container settles as running.
    /// `None` keeps it restarting forever.
    restart_polls: Option<u32>,
    /// Removed instead of settling as running.
    vanishes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRecord {
    pub container: ContainerId,
    pub env: Vec<(String, String)>,
    pub command: Vec<String>,
}

#[derive(Default)]
struct MockState {
    images: Vec<ImageInfo>,
    containers: Vec<MockContainer>,
    calls: Vec<String>,
    builds: Vec<BuildRequest>,
    runs: Vec<RunRequest>,
    execs: Vec<ExecRecord>,
    installed: Vec<(ContainerId, String)>,
    build_exit_code: i32,
    exec_exit_code: i32,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn container_mut(&mut self, id: &ContainerId) -> Result<&mut MockContainer, RuntimeError> {
        self.containers
            .iter_mut()
            .find(|c| &c.info.id == id)
            .ok_or_else(|| failed("container", &format!("No such container: {id}")))
    }
}

fn failed(command: &str, stderr: &str) -> RuntimeError {
    RuntimeError::CommandFailed {
        command: format!("mock {command}"),
        code: 1,
        stderr: stderr.to_owned(),
    }
}

fn labels_of(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

/// In-memory [`ContainerEngine`] that behaves like docker closely enough to
/// drive the reconciler: builds move the `latest` tag, `run` starts the
/// container, and operations on containers in the wrong state fail.
pub struct MockEngine {
    state: Mutex<MockState>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_image(&self, tags: &[&str], labels: &[(&str, &str)]) -> ImageId {
        let mut state = self.lock();
        let id = ImageId::new(format!("sha256:{:064x}", state.next_id()));
        state.images.push(ImageInfo {
            id: id.clone(),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            labels: labels_of(labels),
        });
        id
    }

    pub fn add_container(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        status: ContainerStatus,
    ) -> ContainerId {
        let mut state = self.lock();
        let id = ContainerId::new(format!("{:064x}", state.next_id()));
        state.containers.push(MockContainer {
            info: ContainerInfo {
                id: id.clone(),
                name: name.to_owned(),
                status,
                labels: labels_of(labels),
            },
            restart_polls: None,
            vanishes: false,
        });
        id
    }

    pub fn set_status(&self, id: &ContainerId, status: ContainerStatus) {
        let mut state = self.lock();
        if let Ok(container) = state.container_mut(id) {
            container.info.status = status;
            container.restart_polls = None;
            container.vanishes = false;
        }
    }

    /// Put a container into `restarting`. With `Some(n)` the next `n + 1`
    /// listings still report it restarting, later ones report it running.
    pub fn set_restarting(&self, id: &ContainerId, recover_after: Option<u32>) {
        let mut state = self.lock();
        if let Ok(container) = state.container_mut(id) {
            container.info.status = ContainerStatus::Restarting;
            container.restart_polls = recover_after;
        }
    }

    /// Like [`MockEngine::set_restarting`], but the container is gone once
    /// the polls run out, as if removed by someone else meanwhile.
    pub fn set_restarting_then_gone(&self, id: &ContainerId, polls: u32) {
        let mut state = self.lock();
        if let Ok(container) = state.container_mut(id) {
            container.info.status = ContainerStatus::Restarting;
            container.restart_polls = Some(polls);
            container.vanishes = true;
        }
    }

    pub fn set_build_exit_code(&self, code: i32) {
        self.lock().build_exit_code = code;
    }

    pub fn set_exec_exit_code(&self, code: i32) {
        self.lock().exec_exit_code = code;
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls whose first word is `verb`.
    pub fn count(&self, verb: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Every stored image, tagged or not.
    pub fn images(&self) -> Vec<ImageInfo> {
        self.lock().images.clone()
    }

    pub fn containers(&self) -> Vec<ContainerInfo> {
        self.lock()
            .containers
            .iter()
            .map(|c| c.info.clone())
            .collect()
    }

    pub fn builds(&self) -> Vec<BuildRequest> {
        self.lock().builds.clone()
    }

    pub fn runs(&self) -> Vec<RunRequest> {
        self.lock().runs.clone()
    }

    pub fn execs(&self) -> Vec<ExecRecord> {
        self.lock().execs.clone()
    }

    pub fn installed(&self) -> Vec<(ContainerId, String)> {
        self.lock().installed.clone()
    }
}

impl ContainerEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn list_images(&self, key: &str, value: &str) -> Result<Vec<ImageInfo>, RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("images {key}={value}"));
        Ok(state
            .images
            .iter()
            .filter(|i| !i.tags.is_empty() && i.label(key) == Some(value))
            .cloned()
            .collect())
    }

    fn list_containers(&self, key: &str, value: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("ps {key}={value}"));
        let mut found = Vec::new();
        for container in &mut state.containers {
            if container.info.labels.get(key).map(String::as_str) != Some(value) {
                continue;
            }
            found.push(container.info.clone());
            if container.info.status == ContainerStatus::Restarting {
                match container.restart_polls {
                    Some(0) => {
                        container.info.status = ContainerStatus::Running;
                        container.restart_polls = None;
                    }
                    Some(n) => container.restart_polls = Some(n - 1),
                    None => {}
                }
            }
        }
        state
            .containers
            .retain(|c| !(c.vanishes && c.info.status == ContainerStatus::Running));
        Ok(found)
    }

    fn build_image(&self, request: &BuildRequest) -> Result<i32, RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("build {}", request.tag));
        state.builds.push(request.clone());
        if state.build_exit_code != 0 {
            return Ok(state.build_exit_code);
        }
        let latest = format!("{}:latest", request.tag);

        // Identical inputs hit the layer cache and yield the same image.
        if let Some(image) = state
            .images
            .iter_mut()
            .find(|i| i.labels == request.labels && i.tags.contains(&latest))
        {
            image.tags = vec![latest];
            return Ok(0);
        }
        for image in &mut state.images {
            image.tags.retain(|t| t != &latest);
        }
        let id = ImageId::new(format!("sha256:{:064x}", state.next_id()));
        state.images.push(ImageInfo {
            id,
            tags: vec![latest],
            labels: request.labels.clone(),
        });
        Ok(0)
    }

    fn run_container(&self, request: &RunRequest) -> Result<ContainerId, RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("run {}", request.name));
        if !state.images.iter().any(|i| i.id == request.image) {
            return Err(failed(
                "run",
                &format!("Unable to find image '{}'", request.image),
            ));
        }
        if state.containers.iter().any(|c| c.info.name == request.name) {
            return Err(failed(
                "run",
                &format!("Conflict. The container name \"/{}\" is already in use", request.name),
            ));
        }
        let id = ContainerId::new(format!("{:064x}", state.next_id()));
        state.runs.push(request.clone());
        state.containers.push(MockContainer {
            info: ContainerInfo {
                id: id.clone(),
                name: request.name.clone(),
                status: ContainerStatus::Running,
                labels: request.labels.clone(),
            },
            restart_polls: None,
            vanishes: false,
        });
        Ok(id)
    }

    fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("start {id}"));
        let container = state.container_mut(id)?;
        match container.info.status {
            ContainerStatus::Created | ContainerStatus::Exited | ContainerStatus::Running => {
                container.info.status = ContainerStatus::Running;
                Ok(())
            }
            other => Err(failed(
                "start",
                &format!("cannot start a {other} container"),
            )),
        }
    }

    fn stop_container(&self, id: &ContainerId, _timeout_secs: u32) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("stop {id}"));
        let container = state.container_mut(id)?;
        match container.info.status {
            ContainerStatus::Running => {
                container.info.status = ContainerStatus::Exited;
                Ok(())
            }
            ContainerStatus::Created | ContainerStatus::Exited => Ok(()),
            other => Err(failed("stop", &format!("cannot stop a {other} container"))),
        }
    }

    fn unpause_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("unpause {id}"));
        let container = state.container_mut(id)?;
        if container.info.status != ContainerStatus::Paused {
            return Err(failed("unpause", &format!("Container {id} is not paused")));
        }
        container.info.status = ContainerStatus::Running;
        Ok(())
    }

    fn remove_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("rm {id}"));
        let before = state.containers.len();
        state.containers.retain(|c| &c.info.id != id);
        if state.containers.len() == before {
            return Err(failed("rm", &format!("No such container: {id}")));
        }
        Ok(())
    }

    fn remove_image(&self, id: &ImageId) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("rmi {id}"));
        let before = state.images.len();
        state.images.retain(|i| &i.id != id);
        if state.images.len() == before {
            return Err(failed("rmi", &format!("No such image: {id}")));
        }
        Ok(())
    }

    fn install_executable(
        &self,
        id: &ContainerId,
        local: &Path,
        dest: &str,
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("cp {id}"));
        if !local.is_file() {
            return Err(failed("cp", &format!("{} does not exist", local.display())));
        }
        if state.container_mut(id)?.info.status != ContainerStatus::Running {
            return Err(failed("cp", &format!("container {id} is not running")));
        }
        state.installed.push((id.clone(), dest.to_owned()));
        Ok(())
    }

    fn exec(
        &self,
        id: &ContainerId,
        env: &[(String, String)],
        command: &[String],
    ) -> Result<i32, RuntimeError> {
        let mut state = self.lock();
        state.calls.push(format!("exec {id}"));
        if state.container_mut(id)?.info.status != ContainerStatus::Running {
            return Err(failed("exec", &format!("container {id} is not running")));
        }
        state.execs.push(ExecRecord {
            container: id.clone(),
            env: env.to_vec(),
            command: command.to_vec(),
        });
        Ok(state.exec_exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Mount;

    fn build_request(fingerprint: &str) -> BuildRequest {
        BuildRequest {
            dockerfile: "/tmp/dev.Dockerfile".into(),
            context: "/tmp".into(),
            tag: "mydock-dev".to_owned(),
            labels: labels_of(&[("mydock.name", "dev"), ("mydock.fingerprint", fingerprint)]),
            build_args: Vec::new(),
            secrets: Vec::new(),
        }
    }

    fn run_request(image: ImageId) -> RunRequest {
        RunRequest {
            image,
            name: "mydock-dev".to_owned(),
            command: vec!["sleep".to_owned(), "infinity".to_owned()],
            mounts: vec![Mount::same_path("/dev/bus/usb")],
            privileged: true,
            labels: labels_of(&[("mydock.name", "dev")]),
            options: Vec::new(),
        }
    }

    #[test]
    fn rebuild_moves_latest_tag() {
        let engine = MockEngine::new();
        engine.build_image(&build_request("a")).unwrap();
        engine.build_image(&build_request("b")).unwrap();
        let listed = engine.list_images("mydock.name", "dev").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].label("mydock.fingerprint"), Some("b"));
        // The old image stays around untagged until removed.
        assert_eq!(engine.images().len(), 2);
    }

    #[test]
    fn identical_build_reuses_image() {
        let engine = MockEngine::new();
        engine.build_image(&build_request("a")).unwrap();
        let first = engine.list_images("mydock.name", "dev").unwrap();
        engine.build_image(&build_request("a")).unwrap();
        let second = engine.list_images("mydock.name", "dev").unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(engine.images().len(), 1);
    }

    #[test]
    fn failing_build_changes_nothing() {
        let engine = MockEngine::new();
        engine.set_build_exit_code(2);
        assert_eq!(engine.build_image(&build_request("a")).unwrap(), 2);
        assert!(engine.images().is_empty());
    }

    #[test]
    fn run_starts_container_and_rejects_name_conflict() {
        let engine = MockEngine::new();
        let image = engine.add_image(&["mydock-dev:latest"], &[("mydock.name", "dev")]);
        let id = engine.run_container(&run_request(image.clone())).unwrap();
        let listed = engine.list_containers("mydock.name", "dev").unwrap();
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].status, ContainerStatus::Running);
        assert!(engine.run_container(&run_request(image)).is_err());
    }

    #[test]
    fn state_rules() {
        let engine = MockEngine::new();
        let id = engine.add_container("c", &[("mydock.name", "dev")], ContainerStatus::Paused);
        assert!(engine.stop_container(&id, 1).is_err());
        assert!(engine.start_container(&id).is_err());
        engine.unpause_container(&id).unwrap();
        assert!(engine.unpause_container(&id).is_err());
        engine.stop_container(&id, 1).unwrap();
        assert_eq!(engine.containers()[0].status, ContainerStatus::Exited);
        engine.start_container(&id).unwrap();
        // Rejected calls are recorded too.
        assert_eq!(engine.count("start"), 2);
        assert_eq!(engine.count("stop"), 2);
    }

    #[test]
    fn restarting_container_settles_after_polls() {
        let engine = MockEngine::new();
        let id = engine.add_container("c", &[("mydock.name", "dev")], ContainerStatus::Running);
        engine.set_restarting(&id, Some(1));
        let status = |e: &MockEngine| e.list_containers("mydock.name", "dev").unwrap()[0].status;
        assert_eq!(status(&engine), ContainerStatus::Restarting);
        assert_eq!(status(&engine), ContainerStatus::Restarting);
        assert_eq!(status(&engine), ContainerStatus::Running);
    }

    #[test]
    fn restarting_container_can_vanish() {
        let engine = MockEngine::new();
        let id = engine.add_container("c", &[("mydock.name", "dev")], ContainerStatus::Running);
        engine.set_restarting_then_gone(&id, 0);
        let listed = engine.list_containers("mydock.name", "dev").unwrap();
        assert_eq!(listed[0].status, ContainerStatus::Restarting);
        assert!(engine.list_containers("mydock.name", "dev").unwrap().is_empty());
    }

    #[test]
    fn exec_requires_running_container() {
        let engine = MockEngine::new();
        let id = engine.add_container("c", &[("mydock.name", "dev")], ContainerStatus::Exited);
        assert!(engine.exec(&id, &[], &["bash".to_owned()]).is_err());
        engine.set_status(&id, ContainerStatus::Running);
        engine.set_exec_exit_code(3);
        assert_eq!(engine.exec(&id, &[], &["bash".to_owned()]).unwrap(), 3);
        assert_eq!(engine.execs()[0].command, vec!["bash"]);
    }

    #[test]
    fn label_filter_is_exact() {
        let engine = MockEngine::new();
        engine.add_container("a", &[("mydock.name", "dev")], ContainerStatus::Running);
        engine.add_container("b", &[("mydock.name", "dev2")], ContainerStatus::Running);
        assert_eq!(engine.list_containers("mydock.name", "dev").unwrap().len(), 1);
    }
}
