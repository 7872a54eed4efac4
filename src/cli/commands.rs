//! Command dispatch: maps parsed arguments onto the service container

use std::env;
use std::io;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::cli::args::{recursion, Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{expand_path, global_config_path, local_config_path, Settings};
use crate::domain::{NewNode, NodeId};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

/// Execute the parsed command.
pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see --help".to_string(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => cmd_config(command, &load_settings(cli)?),
        other => {
            let container = ServiceContainer::new(load_settings(cli)?)?;
            run(other, &container)
        }
    }
}

/// Load layered settings, then apply the `--store` override.
fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let cwd = env::current_dir().map_err(|e| InfraError::io("read working directory", e))?;
    let mut settings = Settings::load(Some(&cwd))?;
    if let Some(store) = &cli.store {
        settings.store = expand_path(store);
    }
    debug!("settings: {settings:?}");
    Ok(settings)
}

fn run(command: &Commands, container: &ServiceContainer) -> CliResult<()> {
    match command {
        Commands::Add { name, parent } => cmd_add(container, name, *parent),
        Commands::Rm { id } => cmd_rm(container, *id),
        Commands::Mv {
            id,
            parent,
            root,
            position,
        } => cmd_mv(container, *id, *parent, *root, *position),
        Commands::Up { id } => cmd_swap(container, *id, true),
        Commands::Down { id } => cmd_swap(container, *id, false),
        Commands::Children {
            id,
            recursive,
            no_recursive,
        } => {
            let children = container
                .traversal
                .get_children(*id, recursion(*recursive, *no_recursive))?;
            output::nodes(&children);
            Ok(())
        }
        Commands::Count {
            id,
            recursive,
            no_recursive,
        } => {
            let count = container
                .traversal
                .count_children(*id, recursion(*recursive, *no_recursive))?;
            output::info(&count);
            Ok(())
        }
        Commands::Path { id } => {
            let path = container.traversal.get_path(*id)?;
            let names: Vec<&str> = path.iter().map(|n| n.name.as_str()).collect();
            output::info(&names.join(" / "));
            Ok(())
        }
        Commands::Position { id } => {
            match container.traversal.get_position(*id)? {
                Some(position) => output::info(&position),
                None => output::info(&"-"),
            }
            Ok(())
        }
        Commands::Show => cmd_show(container),
        Commands::Leaves => {
            for name in container.traversal.arena()?.leaf_names() {
                output::info(&name);
            }
            Ok(())
        }
        Commands::Check => {
            let count = container.traversal.check()?;
            output::success(&format!("forest consistent ({count} nodes)"));
            Ok(())
        }
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

#[instrument(level = "debug", skip(container))]
fn cmd_add(container: &ServiceContainer, name: &str, parent: Option<NodeId>) -> CliResult<()> {
    let new = match parent {
        Some(parent) => NewNode::child(name, parent),
        None => NewNode::root(name),
    };
    let node = container.nested_set.insert(new)?;
    output::action("Added", &node);
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn cmd_rm(container: &ServiceContainer, id: NodeId) -> CliResult<()> {
    let removed = container.nested_set.delete(id)?;
    output::action("Removed", &format!("{removed} node(s)"));
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn cmd_mv(
    container: &ServiceContainer,
    id: NodeId,
    parent: Option<NodeId>,
    root: bool,
    position: Option<usize>,
) -> CliResult<()> {
    let new_parent = match (parent, root) {
        (Some(p), _) => Some(Some(p)),
        (None, true) => Some(None),
        (None, false) => None,
    };

    match (new_parent, position) {
        (_, Some(position)) => {
            let at = container.nested_set.move_to(id, position, new_parent)?;
            output::action("Moved", &format!("{id} to position {at}"));
        }
        (Some(parent), None) => {
            let node = container.nested_set.reparent(id, parent)?;
            output::action("Moved", &node);
        }
        (None, None) => {
            return Err(CliError::InvalidArgs(
                "mv needs --parent, --root or --position".to_string(),
            ));
        }
    }
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn cmd_swap(container: &ServiceContainer, id: NodeId, up: bool) -> CliResult<()> {
    let moved = if up {
        container.nested_set.move_up(id)?
    } else {
        container.nested_set.move_down(id)?
    };
    if moved {
        let node = container.traversal.get(id)?;
        output::action("Moved", &node);
    } else {
        let edge = if up { "first" } else { "last" };
        output::info(&format!("{id} is already {edge} among its siblings"));
    }
    Ok(())
}

fn cmd_show(container: &ServiceContainer) -> CliResult<()> {
    let arena = container.traversal.arena()?;
    if arena.is_empty() {
        output::info(&"(empty forest)");
        return Ok(());
    }
    for tree in arena.to_display_trees() {
        print!("{tree}");
    }
    output::header(&format!(
        "{} nodes, {} trees, depth {}",
        arena.len(),
        arena.roots().len(),
        arena.depth()
    ));
    Ok(())
}

fn cmd_config(command: &ConfigCommands, settings: &Settings) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => {
            output::info(&Settings::template());
        }
        ConfigCommands::Path => {
            output::header(&"Config files");
            match global_config_path() {
                Some(path) => output::detail(&format!("global: {}", path.display())),
                None => output::detail(&"global: (no home directory)"),
            }
            let cwd = env::current_dir().map_err(|e| InfraError::io("read working directory", e))?;
            output::detail(&format!("local:  {}", local_config_path(&cwd).display()));
            output::detail(&format!("store:  {}", settings.store.display()));
        }
    }
    Ok(())
}
