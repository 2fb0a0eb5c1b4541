use super::{Session, EXIT_SUCCESS};
use mydock_core::CoreError;
use mydock_server::{load_or_create_token, panel_url, run_server, Panel, ServerError};

fn server_error(err: ServerError) -> CoreError {
    match err {
        ServerError::Io(e) => CoreError::Io(e),
        other => CoreError::Io(std::io::Error::other(other.to_string())),
    }
}

/// Run the control panel on localhost until `/_api/shutdown` is requested.
pub fn run(session: &Session, port: u16) -> Result<u8, CoreError> {
    let reconciler = session.reconciler()?;
    let token = load_or_create_token(&session.settings.token_path()).map_err(server_error)?;
    println!("control panel: {}", panel_url(port, &token));
    let panel = Panel::new(token, reconciler);
    run_server(&panel, port).map_err(server_error)?;
    println!("control panel stopped");
    Ok(EXIT_SUCCESS)
}
