use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "replan")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Reconcile declared configuration, prior state and proposed plans",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile one request and print the reconciled tree
    Plan(PlanArgs),

    /// Run cross-field consistency checks on a request's config
    Validate(ValidateArgs),

    /// Reconcile every request file under a directory in parallel
    Batch(BatchArgs),

    /// Print the compiled schema tree
    Schema(SchemaArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Schema selection shared by every command that decodes snapshots
#[derive(clap::Args, Clone, Default)]
pub struct SchemaSource {
    /// Schema definition file (TOML); defaults to $REPLAN_SCHEMA or the settings file
    #[arg(short, long, env = "REPLAN_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Object type to use as the root instead of the definition's `root`
    #[arg(long)]
    pub root: Option<String>,
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Parser)]
pub struct PlanArgs {
    /// Request file: {"config": ..., "prior": ..., "proposed": ...}
    pub request: PathBuf,

    #[command(flatten)]
    pub source: SchemaSource,

    /// Write the reconciled tree to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show a text diff between the proposed and reconciled trees
    #[arg(long)]
    pub show_diff: bool,
}

// ============================================================================
// Validate
// ============================================================================

#[derive(Parser)]
pub struct ValidateArgs {
    /// Request file to check
    pub request: PathBuf,

    #[command(flatten)]
    pub source: SchemaSource,
}

// ============================================================================
// Batch
// ============================================================================

#[derive(Parser)]
pub struct BatchArgs {
    /// Directory containing request files (*.json)
    pub dir: PathBuf,

    #[command(flatten)]
    pub source: SchemaSource,

    /// Number of parallel jobs (defaults to the settings file)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Directory to write reconciled trees into, one file per request
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// ============================================================================
// Schema
// ============================================================================

#[derive(Parser)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub source: SchemaSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_args() {
        let cli = Cli::try_parse_from([
            "replan", "-vv", "plan", "req.json", "--schema", "s.toml", "--root", "host", "--show-diff",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.request, PathBuf::from("req.json"));
        assert_eq!(args.source.schema, Some(PathBuf::from("s.toml")));
        assert_eq!(args.source.root.as_deref(), Some("host"));
        assert!(args.show_diff);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_batch_jobs() {
        let cli = Cli::try_parse_from(["replan", "batch", "requests", "-j", "8", "--quiet"]).unwrap();
        assert!(cli.quiet);
        let Command::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(args.jobs, Some(8));
    }
}
