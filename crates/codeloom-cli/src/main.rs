mod cmd_branch;
mod cmd_change;
mod cmd_context;
mod cmd_history;
mod workspace;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(about = "Drive AI-generated code changes through a reviewed git workflow")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path inside the repository to operate on
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Ollama server URL
    #[arg(long, global = true, default_value = codeloom_ollama::DEFAULT_OLLAMA_URL)]
    host: String,

    /// Verbose diagnostic output on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new branch from the current HEAD and start a session on it
    NewBranch {
        /// Branch name
        name: String,
    },
    /// Send a change request to the model and stage its proposal for review
    Prompt {
        /// What to change
        text: String,
    },
    /// Show the pending change as unified diffs against the working tree
    Review,
    /// Apply the pending change and commit it
    Commit {
        /// Commit message
        message: String,
    },
    /// Discard the pending change without touching the working tree
    Rollback,
    /// Merge the active branch into the repository's base branch
    Merge,
    /// Undo the last commit on the active branch
    Uncommit,
    /// Add a file to the generation context
    AddContext {
        /// Repository-relative path
        path: String,
    },
    /// Remove a file from the generation context
    RmContext {
        /// Repository-relative path
        path: String,
    },
    /// Empty the generation context
    ClearContext,
    /// List the files currently in the generation context
    ShowContext {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the change history for a branch
    History {
        /// Branch name (defaults to the active branch)
        branch: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the persisted session state (recovery escape hatch)
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("codeloom=debug,codeloom_git=debug,codeloom_ollama=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Reset must not load the session: it is the recovery path for a
    // corrupted session file.
    if let Commands::Reset { force } = cli.command {
        return workspace::reset(&cli.repo, force);
    }

    let mut manager = workspace::open(&cli.repo, &cli.host)?;
    match cli.command {
        Commands::NewBranch { name } => cmd_branch::new_branch(&mut manager, &name),
        Commands::Prompt { text } => cmd_change::prompt(&mut manager, &text),
        Commands::Review => cmd_change::review(&manager),
        Commands::Commit { message } => cmd_change::commit(&mut manager, &message),
        Commands::Rollback => cmd_change::rollback(&mut manager),
        Commands::Merge => cmd_branch::merge(&mut manager),
        Commands::Uncommit => cmd_branch::uncommit(&mut manager),
        Commands::AddContext { path } => cmd_context::add(&mut manager, &path),
        Commands::RmContext { path } => cmd_context::remove(&mut manager, &path),
        Commands::ClearContext => cmd_context::clear(&mut manager),
        Commands::ShowContext { json } => cmd_context::show(&mut manager, json),
        Commands::History { branch, json } => {
            cmd_history::run(&manager, branch.as_deref(), json)
        }
        Commands::Reset { .. } => unreachable!("handled above"),
    }
}
