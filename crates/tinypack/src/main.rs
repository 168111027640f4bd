use std::{
    env,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug};
use tinypack::{
    config::{Config, ConfigOverrides, Traversal},
    orchestrator::BundleOrchestrator,
};

/// Bundle CommonJS modules into a single script
#[derive(Parser, Debug)]
#[command(name = "tinypack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Identifier of the entry module
    #[arg(short, long)]
    entry: Option<String>,

    /// Directory the bundle is written to
    #[arg(long)]
    output_path: Option<PathBuf>,

    /// File name of the bundle
    #[arg(long)]
    output_filename: Option<String>,

    /// Config file (defaults to tinypack.toml in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory identifiers are resolved against
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Directory, relative to the working directory, dependencies live in
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Extension appended to identifiers (repeatable, tried in order)
    #[arg(long = "extension", value_name = "EXT")]
    extensions: Vec<String>,

    /// How far dependencies are followed
    #[arg(long, value_enum)]
    traversal: Option<Traversal>,

    /// Print the bundle to stdout instead of writing a file
    #[arg(long)]
    stdout: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

/// Fatal errors go straight to stderr so they show up whatever the log filter
#[allow(clippy::print_stderr)]
fn report_error(err: &anyhow::Error) {
    eprintln!("error: {err:#}");
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let working_directory = match cli.cwd {
        Some(cwd) => cwd,
        None => env::current_dir().context("failed to determine the current directory")?,
    };
    debug!("Working directory: {}", working_directory.display());

    let mut config = match &cli.config {
        Some(path) => Config::load(&working_directory.join(path))?,
        None => Config::discover(&working_directory)?,
    };
    config.apply(ConfigOverrides {
        entry: cli.entry,
        output_path: cli.output_path,
        output_filename: cli.output_filename,
        source_root: cli.source_root,
        extensions: cli.extensions,
        traversal: cli.traversal,
    });

    let orchestrator = BundleOrchestrator::new(config, working_directory);

    if cli.stdout {
        let (bundle, _) = orchestrator.bundle_to_string()?;
        io::stdout()
            .lock()
            .write_all(bundle.as_bytes())
            .context("failed to write bundle to stdout")?;
        return Ok(());
    }

    let report = orchestrator.bundle()?;
    writeln!(
        io::stdout().lock(),
        "Bundle written to {}",
        report.output_file.display()
    )
    .context("failed to write to stdout")?;
    Ok(())
}
