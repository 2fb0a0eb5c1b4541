use dialoguer::{Confirm, Input, Password};
use mydock_core::{CoreError, Interaction};

/// Terminal prompts on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerInteraction;

fn interaction_error(err: dialoguer::Error) -> CoreError {
    CoreError::Interaction(err.to_string())
}

impl Interaction for DialoguerInteraction {
    fn confirm(&self, message: &str, question: &str) -> Result<bool, CoreError> {
        eprintln!();
        eprintln!("{}", console::style(message).yellow());
        Confirm::new()
            .with_prompt(question)
            .default(true)
            .interact()
            .map_err(interaction_error)
    }

    fn input(&self, prompt: &str) -> Result<String, CoreError> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(interaction_error)
    }

    fn password(&self, prompt: &str) -> Result<String, CoreError> {
        Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(interaction_error)
    }
}
