use super::{spin_clear, spin_ok, spinner, Session, EXIT_SUCCESS};
use mydock_core::CoreError;

pub fn run(session: &Session, name: &str, quiet: bool) -> Result<u8, CoreError> {
    let mut reconciler = session.reconciler()?;
    let pb = (!quiet).then(|| spinner(&format!("stopping {name}...")));
    let result = reconciler.stop(name, quiet);
    if let Some(pb) = &pb {
        match &result {
            Ok(()) => spin_ok(pb, &format!("stopped {name}")),
            Err(_) => spin_clear(pb),
        }
    }
    result?;
    Ok(EXIT_SUCCESS)
}
