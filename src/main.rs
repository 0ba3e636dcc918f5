use std::path::PathBuf;
use std::process::ExitCode;
use std::{env, io};

use clap::{CommandFactory, Parser};
use directories::ProjectDirs;
use quickstep::cli::{self, Cli, Sub};
use quickstep_config::Config;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "quickstep=debug";

fn main() -> ExitCode {
    let directives = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            warn!("{err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let Some(subcommand) = cli.subcommand else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    if let Sub::Completions { shell } = subcommand {
        clap_complete::generate(shell, &mut Cli::command(), "quickstep", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let path = cli.config.or_else(default_config_path);
    let config = match path {
        Some(path) if path.exists() => match Config::load(&path) {
            Ok(config) => config,
            Err(err) => {
                // miette renders the source span through Debug.
                eprintln!("{err:?}");
                return Ok(ExitCode::FAILURE);
            }
        },
        Some(path) => {
            debug!("{path:?} does not exist, using the default config");
            Config::default()
        }
        None => {
            debug!("no config directory, using the default config");
            Config::default()
        }
    };

    match subcommand {
        Sub::Validate => info!("config is valid"),
        Sub::EndTarget(args) => {
            let report = cli::end_target(&args, &config);
            serde_json::to_writer_pretty(io::stdout(), &report)?;
            println!();
        }
        Sub::Completions { .. } => (),
    }

    Ok(ExitCode::SUCCESS)
}

fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "quickstep")?;
    Some(dirs.config_dir().join("config.kdl"))
}
