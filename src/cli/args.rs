//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::domain::NodeId;

/// Nested-set forest maintenance: insert, delete, move and query tree nodes
#[derive(Parser, Debug)]
#[command(name = "nestset")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Forest file (overrides the configured store)
    #[arg(short, long, global = true, env = "NESTSET_STORE", value_hint = ValueHint::FilePath)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Insert a node as last root or last child
    Add {
        /// Node name
        name: String,
        /// Parent node key
        #[arg(short, long)]
        parent: Option<NodeId>,
    },

    /// Delete a node with its whole subtree
    Rm {
        id: NodeId,
    },

    /// Move a node under a new parent and/or to a sibling position
    Mv {
        id: NodeId,
        /// New parent node key
        #[arg(short, long, conflicts_with = "root")]
        parent: Option<NodeId>,
        /// Move to the root set
        #[arg(long)]
        root: bool,
        /// Target sibling position, starting at 0
        #[arg(short = 'n', long)]
        position: Option<usize>,
    },

    /// Swap a node with its previous sibling
    Up {
        id: NodeId,
    },

    /// Swap a node with its next sibling
    Down {
        id: NodeId,
    },

    /// List children of a node
    Children {
        id: NodeId,
        /// Include all descendants
        #[arg(short, long)]
        recursive: bool,
        /// Direct children only, whatever the configured default
        #[arg(long, conflicts_with = "recursive")]
        no_recursive: bool,
    },

    /// Count children of a node
    Count {
        id: NodeId,
        /// Count all descendants
        #[arg(short, long)]
        recursive: bool,
        /// Direct children only, whatever the configured default
        #[arg(long, conflicts_with = "recursive")]
        no_recursive: bool,
    },

    /// Show the path from the root to a node
    Path {
        id: NodeId,
    },

    /// Show a node's sibling position
    Position {
        id: NodeId,
    },

    /// Render the forest as trees
    Show,

    /// List leaf nodes in preorder
    Leaves,

    /// Verify the forest's structural invariants
    Check,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Print a template config file
    Template,
    /// Show config file locations
    Path,
}

/// Explicit recursion choice from `--recursive`/`--no-recursive`; `None`
/// defers to the configured default.
pub fn recursion(recursive: bool, no_recursive: bool) -> Option<bool> {
    match (recursive, no_recursive) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_recursion_flags_when_mapping_then_explicit_choice_or_default() {
        assert_eq!(recursion(true, false), Some(true));
        assert_eq!(recursion(false, true), Some(false));
        assert_eq!(recursion(false, false), None);
    }

    #[test]
    fn given_no_recursive_flag_when_parsing_count_then_direct_only() {
        let cli = Cli::try_parse_from(["nestset", "count", "1", "--no-recursive"]).unwrap();
        match cli.command {
            Some(Commands::Count { id, recursive, no_recursive }) => {
                assert_eq!(id, 1);
                assert_eq!(recursion(recursive, no_recursive), Some(false));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn given_both_recursion_flags_when_parsing_children_then_rejected() {
        let result = Cli::try_parse_from(["nestset", "children", "1", "-r", "--no-recursive"]);
        assert!(result.is_err());
    }
}
