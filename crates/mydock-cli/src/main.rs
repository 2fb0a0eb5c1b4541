mod commands;
mod interaction;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{exit_byte, Session};
use mydock_core::{CoreError, RetryPolicy, Settings};
use std::error::Error as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "mydock",
    version,
    about = "Per-developer containers that rebuild when their sources change"
)]
struct Cli {
    /// Commands file (created from a template when missing).
    #[arg(long, env = "MYDOCK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory for scratch Dockerfiles and the control panel token.
    #[arg(long, env = "MYDOCK_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Seconds between checks of a restarting container.
    #[arg(long, env = "MYDOCK_RESTART_POLL_SECS", default_value_t = 300, global = true)]
    restart_poll_secs: u64,

    /// How many times a restarting container is checked before giving up.
    #[arg(long, env = "MYDOCK_RESTART_POLL_ATTEMPTS", default_value_t = 30, global = true)]
    restart_poll_attempts: u32,

    /// Container engine backend (`docker` or `mock`).
    #[arg(long, env = "MYDOCK_ENGINE", default_value = "docker", global = true)]
    engine: String,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build (or rebuild) the image of a command.
    Build {
        name: String,
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
    },
    /// Start the container of a command, building the image when needed.
    Start {
        name: String,
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
    },
    /// Stop the container of a command.
    Stop {
        name: String,
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
    },
    /// Remove the container of a command.
    Dispose {
        name: String,
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
    },
    /// Remove the container and the image of a command.
    DisposeImage {
        name: String,
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
    },
    /// Run a program inside the container of a command (a shell by default).
    Exec {
        #[arg(short, long, default_value_t = false)]
        quiet: bool,
        name: String,
        /// Program and arguments to run.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Launcher entry point: `<name> [-q] [-b|-s|-d|-del-img] [args...]`.
    #[command(hide = true)]
    Run {
        name: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Refresh launchers and show every command (the default).
    Status {
        /// Output the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Do not offer to rebuild outdated images.
        #[arg(long, default_value_t = false)]
        no_rebuild: bool,
    },
    /// Write the PATH launcher of every command.
    Install,
    /// Serve the local control panel.
    Serve {
        #[arg(long, default_value_t = mydock_server::DEFAULT_PORT)]
        port: u16,
    },
    /// Run diagnostic checks on the host and the commands file.
    Doctor {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn settings(cli: &Cli) -> Settings {
    let mut settings = Settings::new(
        cli.config
            .clone()
            .unwrap_or_else(Settings::default_config_path),
        cli.data_dir
            .clone()
            .unwrap_or_else(Settings::default_data_dir),
    );
    settings.retry = RetryPolicy {
        interval: Duration::from_secs(cli.restart_poll_secs),
        max_attempts: cli.restart_poll_attempts,
    };
    settings.bin_dirs = mydock_runtime::launcher::default_bin_dirs();
    settings
}

fn dispatch(session: &Session, command: Commands) -> Result<u8, CoreError> {
    match command {
        Commands::Build { name, quiet } => commands::build::run(session, &name, quiet),
        Commands::Start { name, quiet } => commands::start::run(session, &name, quiet),
        Commands::Stop { name, quiet } => commands::stop::run(session, &name, quiet),
        Commands::Dispose { name, quiet } => commands::dispose::run(session, &name, quiet),
        Commands::DisposeImage { name, quiet } => {
            commands::dispose::run_image(session, &name, quiet)
        }
        Commands::Exec { quiet, name, args } => commands::exec::run(session, &name, &args, quiet),
        Commands::Run { name, args } => commands::run::run(session, &name, &args),
        Commands::Status { json, no_rebuild } => commands::status::run(session, json, no_rebuild),
        Commands::Install => commands::install::run(session),
        Commands::Serve { port } => commands::serve::run(session, port),
        Commands::Doctor { json } => commands::doctor::run(session, json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    }
}

fn report(err: &CoreError) {
    if matches!(err, CoreError::ExitStatus(_)) {
        return;
    }
    if err.is_silent() {
        eprintln!("{err}");
        return;
    }
    eprintln!("error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        debug!("caused by: {cause}");
        source = cause.source();
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MYDOCK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let session = Session {
        settings: settings(&cli),
        engine: cli.engine.clone(),
    };
    let command = cli.command.unwrap_or(Commands::Status {
        json: false,
        no_rebuild: false,
    });

    match dispatch(&session, command) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            report(&err);
            ExitCode::from(exit_byte(err.exit_code()))
        }
    }
}
