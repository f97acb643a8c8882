use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, FromArgMatches, Parser};
use tracing::{error, info};

use mdbfs::{backend, fuse, logging};

/// Mount the contents of a database as a POSIX filesystem.
#[derive(Parser)]
#[command(name = "mdbfs", disable_version_flag = true)]
struct Cli {
    /// Type of the database (backend) to mount
    #[arg(long = "type", value_name = "BACKEND")]
    backend: Option<String>,

    /// Path to the database to mount; what it must point at depends on the
    /// backend
    #[arg(long = "db", value_name = "PATH")]
    db: Option<PathBuf>,

    /// Print version information, including backend versions
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Comma-separated mount options passed to the FUSE host
    #[arg(short = 'o', value_name = "OPTIONS")]
    options: Vec<String>,

    /// Where to mount the filesystem
    mountpoint: Option<PathBuf>,
}

fn main() -> ExitCode {
    logging::init();

    let trailer = format!("Help messages from backends:\n\n{}", backend::help_text());
    let matches = Cli::command().after_help(trailer).get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    if cli.version {
        print!("mdbfs version {}\n{}", env!("CARGO_PKG_VERSION"), backend::version_text());
        return ExitCode::SUCCESS;
    }

    let Some(db) = cli.db else {
        info!("database path is missing; use --db to specify a database.");
        return ExitCode::from(2);
    };

    let Some(kind) = cli.backend else {
        info!("you must specify a database backend type.");
        return ExitCode::from(1);
    };

    let Some(chosen) = backend::get(&kind) else {
        error!("type {kind:?} does not match any supported database backend.");
        return ExitCode::from(1);
    };

    if let Err(e) = chosen.open(&db) {
        error!("backend {kind:?} cannot open the database: {e:#}");
        return ExitCode::from(2);
    }

    let Some(mountpoint) = cli.mountpoint else {
        error!("no mountpoint given.");
        chosen.close();
        return ExitCode::from(1);
    };

    let options = fuse::parse_options(&cli.options);
    match fuse::mount(chosen, &mountpoint, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
