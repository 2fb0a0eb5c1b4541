use super::{Session, EXIT_SUCCESS};
use mydock_core::CoreError;

pub fn run(session: &Session, name: &str, args: &[String], quiet: bool) -> Result<u8, CoreError> {
    let mut reconciler = session.reconciler()?;
    reconciler.execute(name, args, quiet)?;
    Ok(EXIT_SUCCESS)
}
