use crate::interaction::Interaction;
use crate::lifecycle::{start_action, stop_action, StartAction, StopAction};
use crate::registry::{Registry, LABEL_FINGERPRINT, LABEL_NAME};
use crate::settings::Settings;
use crate::status::{CommandStatus, ContainerSummary, ImageFreshness, ImageSummary, StatusReport};
use crate::CoreError;
use mydock_runtime::launcher::{find_command, install_launcher};
use mydock_runtime::{
    run_script, write_entrypoint_helper, BuildRequest, BuildSecret, ContainerEngine,
    ContainerInfo, ContainerStatus, HostUser, ImageInfo, Mount, RunRequest, RuntimeError,
    SourceTree, ENTRYPOINT_PATH,
};
use mydock_schema::CommandName;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Device tree bind-mounted into every container for USB access.
pub const USB_BUS: &str = "/dev/bus/usb";
/// Environment variable carrying the caller's working directory into `exec`.
pub const PWD_ENV: &str = "_MYDOCK_PWD";
/// Grace period for `stop`; dev containers are not services.
pub const STOP_TIMEOUT_SECS: u32 = 1;

const HELPER_NAME: &str = "mydock-start";
const DEFAULT_SHELL: &str = "bash";

/// Drives each command's image and container toward the requested state.
///
/// Every decision is taken on a fresh engine observation: the registry caches
/// are dropped after each mutating engine call, and the commands file is
/// re-read after nested operations.
pub struct Reconciler {
    engine: Box<dyn ContainerEngine>,
    tree: Box<dyn SourceTree>,
    interaction: Box<dyn Interaction>,
    registry: Registry,
    settings: Settings,
    host: HostUser,
}

impl Reconciler {
    pub fn new(
        settings: Settings,
        engine: Box<dyn ContainerEngine>,
        tree: Box<dyn SourceTree>,
        interaction: Box<dyn Interaction>,
    ) -> Result<Self, CoreError> {
        let registry = Registry::load(&settings.config_path)?;
        Ok(Self {
            engine,
            tree,
            interaction,
            registry,
            settings,
            host: HostUser::current(),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &dyn ContainerEngine {
        self.engine.as_ref()
    }

    pub fn reload(&mut self) -> Result<(), CoreError> {
        self.registry.reload()
    }

    fn container(&mut self, name: &str) -> Result<Option<ContainerInfo>, CoreError> {
        self.registry.container(name, self.engine.as_ref())
    }

    /// Build (or rebuild) the image of `name`.
    ///
    /// The previous container and image are removed only after the new image
    /// is present, container first. The new image is never removed.
    pub fn build(&mut self, name: &str, quiet: bool) -> Result<(), CoreError> {
        let spec = self.registry.spec(name)?.clone();
        let old_image = self.registry.image(name, self.engine.as_ref())?;
        let old_container = self.container(name)?;

        if old_container.is_some()
            && !quiet
            && !self.interaction.confirm(
                &format!(
                    "The container for \"{name}\" exists. Building the image will delete\nit and all its content."
                ),
                "Do you want to continue?",
            )?
        {
            return Err(CoreError::Cancelled);
        }

        let scratch = self.settings.scratch_dockerfile(name);
        std::fs::create_dir_all(&self.settings.data_dir)?;
        std::fs::write(&scratch, spec.effective_dockerfile()?)?;

        let tag = spec.tag();
        let mut script_env = vec![
            ("MYDOCK_COMMAND".to_owned(), name.to_owned()),
            (
                "MYDOCK_DOCKERFILE".to_owned(),
                spec.dockerfile.display().to_string(),
            ),
            (
                "MYDOCK_CONFIG".to_owned(),
                self.registry.config_path().display().to_string(),
            ),
            ("MYDOCK_TAG".to_owned(), tag.clone()),
        ];
        let mut build_args = self.host.build_args();
        for (key, text) in &spec.prompt {
            let value = self.interaction.input(text)?;
            script_env.push((format!("PROMPT_{key}"), value.clone()));
            build_args.push((key.clone(), value));
        }
        let mut secrets = Vec::new();
        for (key, text) in &spec.password {
            let value = self.interaction.password(text)?;
            script_env.push((format!("PASSWORD_{key}"), value.clone()));
            secrets.push(BuildSecret {
                id: key.clone(),
                value,
            });
        }

        let fingerprint = self.registry.fingerprint(name, self.tree.as_ref())?;
        run_script(&spec.prebuild, &script_env)?;

        let request = BuildRequest {
            dockerfile: scratch,
            context: spec.context_dir().to_path_buf(),
            tag,
            labels: BTreeMap::from([
                (LABEL_NAME.to_owned(), name.to_owned()),
                (LABEL_FINGERPRINT.to_owned(), fingerprint.to_string()),
            ]),
            build_args,
            secrets,
        };
        info!(
            "building {name} (prompts: {:?}, secrets: {})",
            spec.prompt.keys().collect::<Vec<_>>(),
            request.secrets.len()
        );
        let code = self.engine.build_image(&request)?;
        self.registry.invalidate();
        if code != 0 {
            return Err(CoreError::BuildFailed(code));
        }
        run_script(&spec.postbuild, &script_env)?;

        let new_image = self
            .registry
            .image(name, self.engine.as_ref())?
            .ok_or_else(|| CoreError::MissingImage(name.to_owned()))?;
        if let Some(container) = old_container {
            debug!("removing outdated container {}", container.id.short());
            self.engine.remove_container(&container.id)?;
            self.registry.invalidate();
        }
        if let Some(image) = old_image.filter(|old| old.id != new_image.id) {
            debug!("removing outdated image {}", image.id.short());
            self.engine.remove_image(&image.id)?;
            self.registry.invalidate();
        }
        Ok(())
    }

    /// Re-observe the container while it is restarting, bounded by the
    /// retry policy. `None` means it went away meanwhile.
    fn settle(
        &mut self,
        name: &str,
        container: ContainerInfo,
    ) -> Result<Option<ContainerInfo>, CoreError> {
        if container.status != ContainerStatus::Restarting {
            return Ok(Some(container));
        }
        let policy = self.settings.retry;
        let mut first = Some(container);
        let settled = policy.wait_while(
            || match first.take() {
                Some(c) => Ok(Some(c)),
                None => {
                    self.registry.invalidate();
                    self.registry.container(name, self.engine.as_ref())
                }
            },
            |c| {
                c.as_ref()
                    .is_some_and(|c| c.status == ContainerStatus::Restarting)
            },
        )?;
        match settled {
            Some(c) if c.status == ContainerStatus::Restarting => {
                Err(CoreError::StuckRestarting {
                    name: name.to_owned(),
                    attempts: policy.max_attempts,
                })
            }
            other => Ok(other),
        }
    }

    fn create_container(&mut self, name: &str, image: &ImageInfo) -> Result<(), CoreError> {
        let spec = self.registry.spec(name)?;
        let mut mounts: Vec<Mount> = spec.share.iter().map(Mount::same_path).collect();
        mounts.push(Mount::same_path(USB_BUS));
        let request = RunRequest {
            image: image.id.clone(),
            name: spec.tag(),
            command: vec!["sleep".to_owned(), "infinity".to_owned()],
            mounts,
            privileged: true,
            labels: BTreeMap::from([(LABEL_NAME.to_owned(), name.to_owned())]),
            options: spec
                .options
                .iter()
                .flat_map(|(key, value)| value.to_args(key))
                .collect(),
        };
        info!("creating container {} for {name}", request.name);
        let id = self.engine.run_container(&request)?;
        self.registry.invalidate();
        let helper = write_entrypoint_helper()?;
        self.engine
            .install_executable(&id, helper.path(), ENTRYPOINT_PATH)?;
        Ok(())
    }

    /// Bring the container of `name` to `running`, building and creating
    /// whatever is missing.
    pub fn start(&mut self, name: &str, quiet: bool) -> Result<(), CoreError> {
        self.registry.spec(name)?;
        let image = match self.registry.image(name, self.engine.as_ref())? {
            Some(image) => image,
            None => {
                self.build(name, quiet)?;
                self.reload()?;
                self.registry
                    .image(name, self.engine.as_ref())?
                    .ok_or_else(|| CoreError::MissingImage(name.to_owned()))?
            }
        };

        let container = match self.container(name)? {
            Some(container) => container,
            None => {
                self.create_container(name, &image)?;
                self.container(name)?
                    .ok_or_else(|| CoreError::MissingContainer(name.to_owned()))?
            }
        };

        let container = self
            .settle(name, container)?
            .ok_or_else(|| CoreError::MissingContainer(name.to_owned()))?;
        match start_action(container.status) {
            StartAction::Nothing => {}
            StartAction::Start => {
                self.engine.start_container(&container.id)?;
                self.registry.invalidate();
            }
            StartAction::Unpause => {
                self.engine.unpause_container(&container.id)?;
                self.registry.invalidate();
            }
            StartAction::Wait => {
                return Err(CoreError::StuckRestarting {
                    name: name.to_owned(),
                    attempts: self.settings.retry.max_attempts,
                });
            }
            StartAction::Refuse => {
                return Err(CoreError::NotStartable {
                    name: name.to_owned(),
                    status: container.status,
                });
            }
        }
        Ok(())
    }

    pub fn stop(&mut self, name: &str, _quiet: bool) -> Result<(), CoreError> {
        let Some(container) = self.container(name)? else {
            return Ok(());
        };
        let Some(container) = self.settle(name, container)? else {
            return Ok(());
        };
        match stop_action(container.status) {
            StopAction::Nothing => return Ok(()),
            StopAction::UnpauseThenStop => {
                self.engine.unpause_container(&container.id)?;
                self.registry.invalidate();
                self.engine
                    .stop_container(&container.id, STOP_TIMEOUT_SECS)?;
            }
            StopAction::Stop => {
                self.engine
                    .stop_container(&container.id, STOP_TIMEOUT_SECS)?;
            }
            StopAction::Wait => {
                return Err(CoreError::StuckRestarting {
                    name: name.to_owned(),
                    attempts: self.settings.retry.max_attempts,
                });
            }
        }
        self.registry.invalidate();
        Ok(())
    }

    /// Remove the container of `name` with everything changed inside it.
    pub fn dispose(&mut self, name: &str, quiet: bool) -> Result<(), CoreError> {
        let Some(container) = self.container(name)? else {
            return Ok(());
        };
        if !quiet
            && !self.interaction.confirm(
                &format!("You will lose all changes made in the \"{name}\" container."),
                "Do you want to continue?",
            )?
        {
            return Err(CoreError::Cancelled);
        }
        self.engine.remove_container(&container.id)?;
        self.registry.invalidate();
        Ok(())
    }

    pub fn dispose_image(&mut self, name: &str, quiet: bool) -> Result<(), CoreError> {
        self.dispose(name, quiet)?;
        self.reload()?;
        if let Some(image) = self.registry.image(name, self.engine.as_ref())? {
            self.engine.remove_image(&image.id)?;
            self.registry.invalidate();
        }
        Ok(())
    }

    /// Run `args` (a shell when empty) inside the container of `name`, starting
    /// it first if needed. A non-zero exit becomes [`CoreError::ExitStatus`].
    pub fn execute(&mut self, name: &str, args: &[String], quiet: bool) -> Result<(), CoreError> {
        let mut container = self.container(name)?;
        if container
            .as_ref()
            .is_none_or(|c| c.status != ContainerStatus::Running)
        {
            self.start(name, quiet)?;
            self.reload()?;
            container = self.container(name)?;
        }
        let container = container.ok_or_else(|| CoreError::MissingContainer(name.to_owned()))?;

        let mut command = vec![HELPER_NAME.to_owned()];
        if args.is_empty() {
            command.push(DEFAULT_SHELL.to_owned());
        } else {
            command.extend(args.iter().cloned());
        }
        let cwd = std::env::current_dir()?;
        let env = [(PWD_ENV.to_owned(), cwd.display().to_string())];
        let code = self.engine.exec(&container.id, &env, &command)?;
        if code != 0 {
            return Err(CoreError::ExitStatus(code));
        }
        Ok(())
    }

    fn command_status(&mut self, name: &CommandName) -> Result<CommandStatus, CoreError> {
        let containers = self.registry.containers(name, self.engine.as_ref())?;
        let image = self.registry.image(name, self.engine.as_ref())?;
        let freshness = match &image {
            None => ImageFreshness::Deleted,
            Some(image) => match self.registry.fingerprint(name, self.tree.as_ref()) {
                Ok(fp) if image.label(LABEL_FINGERPRINT) == Some(fp.as_str()) => {
                    ImageFreshness::UpToDate
                }
                Ok(_) => ImageFreshness::Outdated,
                Err(e) => {
                    error!("cannot fingerprint {name}: {e}");
                    ImageFreshness::Outdated
                }
            },
        };
        let spec = self.registry.spec(name)?;
        Ok(CommandStatus {
            name: name.clone(),
            container: containers.first().map(|c| ContainerSummary {
                id: c.id.short().to_owned(),
                name: c.name.clone(),
                status: c.status,
            }),
            container_count: containers.len(),
            freshness,
            image: image.map(|i| ImageSummary {
                id: i.id.short().to_owned(),
                tags: i.tags,
            }),
            executable: find_command(name, &self.settings.bin_dirs),
            dockerfile: spec.dockerfile.clone(),
            customized: spec.is_customized(),
            share: spec.share.clone(),
            source: spec.source.to_string(),
        })
    }

    /// Observe every command. Nothing is changed.
    pub fn status(&mut self) -> Result<StatusReport, CoreError> {
        let mut commands = Vec::new();
        for name in self.registry.names() {
            commands.push(self.command_status(&name)?);
        }
        Ok(StatusReport {
            config_path: self.registry.config_path().to_path_buf(),
            commands,
            rejected: self
                .registry
                .rejected()
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }

    /// Offer one confirmation for rebuilding all `stale` commands, then build
    /// them one by one. Failures are collected, not fatal.
    pub fn rebuild_stale(
        &mut self,
        stale: &[CommandName],
    ) -> Result<Vec<(CommandName, CoreError)>, CoreError> {
        if stale.is_empty()
            || !self.interaction.confirm(
                "You have some images that are out of date.",
                "Do you want to rebuild them?",
            )?
        {
            return Ok(Vec::new());
        }
        let mut failures = Vec::new();
        for name in stale {
            if let Err(e) = self.build(name, false) {
                failures.push((name.clone(), e));
            }
            self.reload()?;
        }
        Ok(failures)
    }

    /// Write a launcher for every command that calls back into `exe`.
    pub fn install_launchers(&self, exe: &Path) -> Vec<(CommandName, Result<PathBuf, RuntimeError>)> {
        self.registry
            .names()
            .into_iter()
            .map(|name| {
                let result = install_launcher(&name, exe, &self.settings.bin_dirs);
                (name, result)
            })
            .collect()
    }
}
