use mydock_runtime::{ContainerInfo, ContainerStatus};
use std::time::Duration;
use tracing::debug;

/// Lifecycle state of a command, derived from its observed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Empty,
    Stopped,
    Running,
}

impl LifecycleState {
    pub fn of(container: Option<&ContainerInfo>) -> Self {
        match container.map(|c| c.status) {
            None => Self::Empty,
            Some(ContainerStatus::Running) => Self::Running,
            Some(_) => Self::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAction {
    Nothing,
    Start,
    Unpause,
    Wait,
    Refuse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAction {
    Nothing,
    Stop,
    UnpauseThenStop,
    Wait,
}

pub fn start_action(status: ContainerStatus) -> StartAction {
    match status {
        ContainerStatus::Running => StartAction::Nothing,
        ContainerStatus::Created | ContainerStatus::Exited => StartAction::Start,
        ContainerStatus::Paused => StartAction::Unpause,
        ContainerStatus::Restarting => StartAction::Wait,
        ContainerStatus::Removing | ContainerStatus::Dead => StartAction::Refuse,
    }
}

/// Paused containers are unpaused before stopping; stopping a frozen
/// container is not defined by every engine.
pub fn stop_action(status: ContainerStatus) -> StopAction {
    match status {
        ContainerStatus::Running => StopAction::Stop,
        ContainerStatus::Paused => StopAction::UnpauseThenStop,
        ContainerStatus::Restarting => StopAction::Wait,
        ContainerStatus::Created
        | ContainerStatus::Exited
        | ContainerStatus::Removing
        | ContainerStatus::Dead => StopAction::Nothing,
    }
}

/// Bounded fixed-interval polling for transient engine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_attempts: 30,
        }
    }
}

impl RetryPolicy {
    /// Observe, then keep sleeping and re-observing while `pending` holds,
    /// at most `max_attempts` times. Returns the last observation.
    pub fn wait_while<T, E>(
        &self,
        mut observe: impl FnMut() -> Result<T, E>,
        pending: impl Fn(&T) -> bool,
    ) -> Result<T, E> {
        let mut current = observe()?;
        let mut attempt = 0;
        while pending(&current) && attempt < self.max_attempts {
            attempt += 1;
            debug!(
                "waiting {:?} for a transient state (attempt {attempt}/{})",
                self.interval, self.max_attempts
            );
            std::thread::sleep(self.interval);
            current = observe()?;
        }
        Ok(current)
    }
}
