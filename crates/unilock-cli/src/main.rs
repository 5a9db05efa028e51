mod commands;
mod config;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{Project, EXIT_CONVERT_ERROR, EXIT_FAILURE, EXIT_VALIDATION_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;
use unilock_foreign::ForeignFormat;

#[derive(Debug, Parser)]
#[command(
    name = "unilock",
    version,
    about = "Normalize Python lock files into one canonical JSON lock"
)]
struct Cli {
    /// Project directory holding the foreign lock and unilock.toml.
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a foreign lock file into the canonical lock.
    Convert {
        /// Foreign lock file (default: detected in the project directory).
        #[arg(long)]
        input: Option<PathBuf>,
        /// Foreign lock format: requirements, pipfile or poetry.
        #[arg(long)]
        format: Option<ForeignFormat>,
        /// Canonical lock file to write.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Rewrite the lock even when it already accounts for the input.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Check whether the canonical lock still accounts for a foreign lock.
    Check {
        /// Foreign lock file (default: detected in the project directory).
        #[arg(long)]
        input: Option<PathBuf>,
        /// Foreign lock format: requirements, pipfile or poetry.
        #[arg(long)]
        format: Option<ForeignFormat>,
        /// Canonical lock file to compare against.
        #[arg(long)]
        lock: Option<PathBuf>,
    },
    /// Validate a canonical lock file.
    Validate {
        /// Canonical lock file (default: the project's configured output).
        path: Option<PathBuf>,
    },
    /// Print the sections of a canonical lock and their members.
    Show {
        /// Canonical lock file (default: the project's configured output).
        path: Option<PathBuf>,
    },
    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
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
            tracing_subscriber::EnvFilter::try_from_env("UNILOCK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;

    let project = cli.project;
    let result = match cli.command {
        Commands::Convert {
            input,
            format,
            output,
            force,
        } => Project::load(project).and_then(|project| {
            commands::convert::run(
                &project,
                input.as_deref(),
                format,
                output.as_deref(),
                force,
                json_output,
            )
        }),
        Commands::Check {
            input,
            format,
            lock,
        } => Project::load(project).and_then(|project| {
            commands::check::run(
                &project,
                input.as_deref(),
                format,
                lock.as_deref(),
                json_output,
            )
        }),
        Commands::Validate { path } => Project::load(project)
            .and_then(|project| commands::validate::run(&project, path.as_deref(), json_output)),
        Commands::Show { path } => Project::load(project)
            .and_then(|project| commands::show::run(&project, path.as_deref(), json_output)),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("conversion failed") {
                EXIT_CONVERT_ERROR
            } else if msg.starts_with("invalid lock file") {
                EXIT_VALIDATION_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
