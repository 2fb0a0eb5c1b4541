use crate::CoreError;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Questions the reconciler asks the operator.
pub trait Interaction: Send + Sync {
    /// Show `message` and ask a yes/no `question`, defaulting to yes.
    fn confirm(&self, message: &str, question: &str) -> Result<bool, CoreError>;

    /// Read a visible line of input for a build arg.
    fn input(&self, prompt: &str) -> Result<String, CoreError>;

    /// Read a hidden line of input for a build secret.
    fn password(&self, prompt: &str) -> Result<String, CoreError>;
}

impl<T: Interaction + ?Sized> Interaction for std::sync::Arc<T> {
    fn confirm(&self, message: &str, question: &str) -> Result<bool, CoreError> {
        (**self).confirm(message, question)
    }

    fn input(&self, prompt: &str) -> Result<String, CoreError> {
        (**self).input(prompt)
    }

    fn password(&self, prompt: &str) -> Result<String, CoreError> {
        (**self).password(prompt)
    }
}

/// For callers without a terminal: confirms everything, cannot read input.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Interaction for AssumeYes {
    fn confirm(&self, _message: &str, _question: &str) -> Result<bool, CoreError> {
        Ok(true)
    }

    fn input(&self, prompt: &str) -> Result<String, CoreError> {
        Err(CoreError::Interaction(format!(
            "no terminal to ask \"{prompt}\""
        )))
    }

    fn password(&self, prompt: &str) -> Result<String, CoreError> {
        self.input(prompt)
    }
}

#[derive(Default)]
struct Script {
    answers: VecDeque<bool>,
    inputs: VecDeque<String>,
    asked: Vec<String>,
}

/// Replays prepared answers and records every question asked.
#[derive(Default)]
pub struct ScriptedInteraction {
    script: Mutex<Script>,
}

impl ScriptedInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn answer(self, yes: bool) -> Self {
        self.lock().answers.push_back(yes);
        self
    }

    /// Queue a reply for the next `input` or `password` call.
    #[must_use]
    pub fn reply(self, text: &str) -> Self {
        self.lock().inputs.push_back(text.to_owned());
        self
    }

    /// Every prompt shown so far, confirmations first-line only.
    pub fn asked(&self) -> Vec<String> {
        self.lock().asked.clone()
    }
}

impl Interaction for ScriptedInteraction {
    fn confirm(&self, message: &str, _question: &str) -> Result<bool, CoreError> {
        let mut script = self.lock();
        script
            .asked
            .push(message.lines().next().unwrap_or_default().to_owned());
        script
            .answers
            .pop_front()
            .ok_or_else(|| CoreError::Interaction(format!("unexpected confirmation: {message}")))
    }

    fn input(&self, prompt: &str) -> Result<String, CoreError> {
        let mut script = self.lock();
        script.asked.push(prompt.to_owned());
        script
            .inputs
            .pop_front()
            .ok_or_else(|| CoreError::Interaction(format!("unexpected prompt: {prompt}")))
    }

    fn password(&self, prompt: &str) -> Result<String, CoreError> {
        self.input(prompt)
    }
}
