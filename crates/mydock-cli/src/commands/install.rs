use super::{exit_byte, Session, EXIT_SUCCESS};
use mydock_core::{CoreError, EXIT_FAILURE};

/// (Re)write the PATH launcher of every command.
pub fn run(session: &Session) -> Result<u8, CoreError> {
    let reconciler = session.reconciler()?;
    let exe = std::env::current_exe()?;
    let mut failed = false;
    for (name, result) in reconciler.install_launchers(&exe) {
        match result {
            Ok(path) => println!("{name}: {}", path.display()),
            Err(e) => {
                failed = true;
                eprintln!("{name}: {e}");
            }
        }
    }
    Ok(if failed { exit_byte(EXIT_FAILURE) } else { EXIT_SUCCESS })
}
