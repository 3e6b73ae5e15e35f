//! `ardi` command line entry point

mod commands;

use std::process::ExitCode;

use ardi_core::prelude::CoreOptions;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ardi")]
#[command(author = "Ardi Contributors")]
#[command(version)]
#[command(
    about = "Project based build and dependency manager for Arduino sketches",
    long_about = None
)]
struct Cli {
    /// Debug logging, verbose compiles and full error causes
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Initialize an ardi project in the current directory
    #[command(name = "project-init", alias = "init")]
    Init,

    /// Delete the project data directory (keeps ardi.json)
    Clean,

    /// Add project dependencies or builds
    #[command(subcommand)]
    Add(AddCommand),

    /// Remove project dependencies or builds
    #[command(subcommand)]
    Remove(RemoveCommand),

    /// List what the project declares and has installed
    #[command(subcommand)]
    List(ListCommand),

    /// Search the platform and library indexes
    #[command(subcommand)]
    Search(SearchCommand),

    /// Install every dependency listed in ardi.json
    Install,

    /// Compile builds defined in ardi.json, or a sketch
    Build(BuildArgs),

    /// Print ardi and arduino-cli versions
    Version,

    /// Run an arduino-cli command against the project's data directory
    Exec {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum AddCommand {
    /// Install platforms: package:architecture[@version]
    #[command(alias = "platforms")]
    Platform {
        #[arg(required = true)]
        specs: Vec<String>,
    },

    /// Install libraries: name[@version]
    #[command(alias = "libraries", alias = "lib")]
    Library {
        #[arg(required = true)]
        specs: Vec<String>,
    },

    /// Add third party package index URLs
    #[command(alias = "board-urls")]
    BoardUrl {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Define a named build
    Build(AddBuildArgs),
}

#[derive(Debug, Args)]
struct AddBuildArgs {
    /// Build name
    #[arg(short, long)]
    name: String,

    /// Fully qualified board name
    #[arg(short, long)]
    fqbn: String,

    /// Sketch directory or .ino file
    #[arg(short, long)]
    sketch: std::path::PathBuf,

    /// Serial baud rate; detected from the sketch when omitted
    #[arg(short, long, default_value_t = 0)]
    baud: u32,

    /// Build property, key=value
    #[arg(short, long = "prop")]
    props: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum RemoveCommand {
    #[command(alias = "platforms")]
    Platform {
        #[arg(required = true)]
        specs: Vec<String>,
    },

    #[command(alias = "libraries", alias = "lib")]
    Library {
        #[arg(required = true)]
        names: Vec<String>,
    },

    #[command(alias = "builds")]
    Build {
        #[arg(required = true)]
        names: Vec<String>,
    },

    #[command(alias = "board-urls")]
    BoardUrl {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ListCommand {
    #[command(alias = "platform")]
    Platforms,

    #[command(alias = "library", alias = "libs")]
    Libraries,

    /// Show builds, optionally only the named ones
    #[command(alias = "build")]
    Builds { names: Vec<String> },

    #[command(alias = "board-url")]
    BoardUrls,
}

#[derive(Debug, Subcommand)]
enum SearchCommand {
    #[command(alias = "platform")]
    Platforms {
        #[arg(default_value = "")]
        query: String,
    },

    #[command(alias = "library", alias = "libs")]
    Libraries {
        #[arg(default_value = "")]
        query: String,
    },
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Compile every build in ardi.json
    #[arg(short, long)]
    all: bool,

    /// Print build properties instead of compiling
    #[arg(short, long)]
    show_props: bool,

    /// Board for a sketch path that is not a named build
    #[arg(short, long, default_value = "")]
    fqbn: String,

    /// Build property for a sketch path, key=value
    #[arg(short = 'p', long = "build-prop")]
    build_props: Vec<String>,

    /// Build names, or a single sketch path
    names: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::EnvFilter::new(cli.log_level()))
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            on_interrupt.cancel();
        }
    });

    let options = CoreOptions {
        verbose: cli.verbose,
    };

    match commands::run(cli.command, options, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if cli.verbose {
                for cause in e.chain().skip(1) {
                    eprintln!("  caused by: {cause}");
                }
            }
            ExitCode::FAILURE
        }
    }
}
