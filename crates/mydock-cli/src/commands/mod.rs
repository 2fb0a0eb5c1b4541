pub mod build;
pub mod completions;
pub mod dispose;
pub mod doctor;
pub mod exec;
pub mod install;
pub mod man_pages;
pub mod run;
pub mod serve;
pub mod start;
pub mod status;
pub mod stop;

use crate::interaction::DialoguerInteraction;
use indicatif::{ProgressBar, ProgressStyle};
use mydock_core::{CoreError, ImageFreshness, Reconciler, Settings};
use mydock_runtime::{
    check_engine_prereqs, format_missing, select_engine, ContainerStatus, GitSourceTree,
    RuntimeError,
};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;

/// Everything needed to open a reconciler for one invocation.
#[derive(Debug, Clone)]
pub struct Session {
    pub settings: Settings,
    pub engine: String,
}

impl Session {
    pub fn reconciler(&self) -> Result<Reconciler, CoreError> {
        if self.engine == "docker" && std::env::var("MYDOCK_SKIP_PREREQS").as_deref() != Ok("1")
        {
            let missing = check_engine_prereqs();
            if !missing.is_empty() {
                return Err(RuntimeError::EngineUnavailable(format_missing(&missing)).into());
            }
        }
        let engine = select_engine(&self.engine)?;
        Reconciler::new(
            self.settings.clone(),
            engine,
            Box::new(GitSourceTree::new()),
            Box::new(DialoguerInteraction),
        )
    }
}

/// Clamp a failure code into a process exit byte; 0 and out-of-range codes
/// become 1.
pub fn exit_byte(code: i32) -> u8 {
    match u8::try_from(code) {
        Ok(0) | Err(_) => 1,
        Ok(code) => code,
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CoreError> {
    serde_json::to_string_pretty(value).map_err(|e| CoreError::Io(e.into()))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}

pub fn colorize_container(status: Option<ContainerStatus>) -> String {
    use console::Style;
    let label = mydock_core::status::container_label(status);
    let style = match status {
        Some(ContainerStatus::Running) => Style::new().green(),
        Some(ContainerStatus::Created | ContainerStatus::Exited) => Style::new().blue(),
        Some(ContainerStatus::Dead) => Style::new().red(),
        Some(ContainerStatus::Paused | ContainerStatus::Restarting | ContainerStatus::Removing)
        | None => Style::new().yellow(),
    };
    style.apply_to(label).to_string()
}

pub fn colorize_freshness(freshness: ImageFreshness) -> String {
    use console::Style;
    let style = match freshness {
        ImageFreshness::UpToDate => Style::new().green(),
        ImageFreshness::Outdated => Style::new().red(),
        ImageFreshness::Deleted => Style::new().yellow(),
    };
    style.apply_to(freshness.label()).to_string()
}
