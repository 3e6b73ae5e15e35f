//! Command handlers: one `ArdiCore` call per command

use std::io::{self, Write};

use anyhow::{Context, Result};
use ardi_core::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{AddCommand, BuildArgs, Command, ListCommand, RemoveCommand, SearchCommand};

/// Run one command in the current working directory
pub(crate) async fn run(
    command: Command,
    options: CoreOptions,
    cancel: CancellationToken,
) -> Result<()> {
    let paths = ProjectPaths::from_cwd().context("Failed to resolve the working directory")?;
    let mut stdout = io::stdout().lock();

    match command {
        Command::Init => match ArdiCore::init(&paths)? {
            InitOutcome::Created => {
                info!("Initialized ardi project in {}", paths.root().display())
            }
            InitOutcome::AlreadyInitialized => {
                info!("Project already initialized in {}", paths.root().display())
            }
        },
        Command::Clean => {
            ArdiCore::clean(&paths)?;
            info!("Cleaned {}", paths.data_dir().display());
        }
        Command::Version => {
            let client = toolchain_client(&paths, &cancel);
            write_version(&client, &mut stdout).await?;
        }
        command => {
            let client = toolchain_client(&paths, &cancel);
            let mut core = ArdiCore::open(paths, Box::new(client), options)?
                .with_cancellation(cancel);
            run_in_project(command, &mut core, &mut stdout).await?;
        }
    }

    stdout.flush().context("Failed to flush output")?;
    Ok(())
}

fn toolchain_client(paths: &ProjectPaths, cancel: &CancellationToken) -> ArduinoCli {
    ArduinoCli::new(paths.toolchain_config()).with_cancellation(cancel.clone())
}

async fn run_in_project(
    command: Command,
    core: &mut ArdiCore,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Add(add) => match add {
            AddCommand::Platform { specs } => core.add_platforms(&specs).await?,
            AddCommand::Library { specs } => core.add_libraries(&specs).await?,
            AddCommand::BoardUrl { urls } => core.add_board_urls(&urls)?,
            AddCommand::Build(args) => {
                core.add_build(&args.name, &args.sketch, &args.fqbn, args.baud, &args.props)?;
            }
        },
        Command::Remove(remove) => match remove {
            RemoveCommand::Platform { specs } => core.remove_platforms(&specs).await?,
            RemoveCommand::Library { names } => core.remove_libraries(&names).await?,
            RemoveCommand::Build { names } => core.remove_builds(&names)?,
            RemoveCommand::BoardUrl { urls } => core.remove_board_urls(&urls)?,
        },
        Command::List(list) => match list {
            ListCommand::Platforms => core.list_platforms(out).await?,
            ListCommand::Libraries => core.list_libraries(out).await?,
            ListCommand::Builds { names } => core.list_builds(&names, out)?,
            ListCommand::BoardUrls => core.list_board_urls(out)?,
        },
        Command::Search(search) => match search {
            SearchCommand::Platforms { query } => core.search_platforms(&query, out).await?,
            SearchCommand::Libraries { query } => core.search_libraries(&query, out).await?,
        },
        Command::Install => core.install().await?,
        Command::Build(args) => build(core, args).await?,
        Command::Exec { args } => core.exec(&args).await?,
        Command::Init | Command::Clean | Command::Version => {}
    }
    Ok(())
}

async fn build(core: &ArdiCore, args: BuildArgs) -> Result<()> {
    let flags = CompileFlags {
        fqbn: args.fqbn,
        build_props: args.build_props,
        show_props: args.show_props,
    };
    core.build(&args.names, &flags, args.all).await?;
    Ok(())
}
