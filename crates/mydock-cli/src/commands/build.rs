use super::{Session, EXIT_SUCCESS};
use mydock_core::CoreError;

pub fn run(session: &Session, name: &str, quiet: bool) -> Result<u8, CoreError> {
    let mut reconciler = session.reconciler()?;
    reconciler.build(name, quiet)?;
    if !quiet {
        println!("built image for {name}");
    }
    Ok(EXIT_SUCCESS)
}
