use super::{Session, EXIT_SUCCESS};
use mydock_core::CoreError;

pub fn run(session: &Session, name: &str, quiet: bool) -> Result<u8, CoreError> {
    let mut reconciler = session.reconciler()?;
    reconciler.start(name, quiet)?;
    if !quiet {
        println!("started {name}");
    }
    Ok(EXIT_SUCCESS)
}
