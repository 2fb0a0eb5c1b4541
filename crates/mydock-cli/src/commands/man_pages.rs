use super::EXIT_SUCCESS;
use clap::CommandFactory;
use mydock_core::CoreError;
use std::path::Path;

fn render(cmd: clap::Command, path: &Path) -> Result<(), CoreError> {
    let mut buf = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// Write `mydock.1` and one `mydock-<subcommand>.1` per subcommand into `dir`.
pub fn run<C: CommandFactory>(dir: &Path) -> Result<u8, CoreError> {
    std::fs::create_dir_all(dir)?;
    let cmd = C::command();
    render(cmd.clone(), &dir.join("mydock.1"))?;
    for sub in cmd.get_subcommands() {
        let path = dir.join(format!("mydock-{}.1", sub.get_name()));
        render(sub.clone(), &path)?;
    }
    println!("man pages written to {}", dir.display());
    Ok(EXIT_SUCCESS)
}
