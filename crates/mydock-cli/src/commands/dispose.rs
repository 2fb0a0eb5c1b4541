use super::{Session, EXIT_SUCCESS};
use mydock_core::CoreError;

/// Remove the container of `name`.
pub fn run(session: &Session, name: &str, quiet: bool) -> Result<u8, CoreError> {
    let mut reconciler = session.reconciler()?;
    reconciler.dispose(name, quiet)?;
    if !quiet {
        println!("removed container of {name}");
    }
    Ok(EXIT_SUCCESS)
}

/// Remove the container and the image of `name`.
pub fn run_image(session: &Session, name: &str, quiet: bool) -> Result<u8, CoreError> {
    let mut reconciler = session.reconciler()?;
    reconciler.dispose_image(name, quiet)?;
    if !quiet {
        println!("removed container and image of {name}");
    }
    Ok(EXIT_SUCCESS)
}
