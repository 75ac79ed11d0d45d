use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "build-number",
    about = "Manage build numbers within a buildnum repository",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path inside the repository to operate on
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new buildnum repository (not needed inside git)
    Init(InitArgs),
    /// Record a commit on the current HEAD reference of a buildnum repository
    Commit(CommitArgs),
    /// Get the latest build number
    Get(GetArgs),
    /// Set the build number
    Set(SetArgs),
    /// Increment the build number
    Inc(IncArgs),
    /// Show the hash for a specific build number
    Hash(HashArgs),
    /// Push build number(s)
    Push(RemoteNameArgs),
    /// Fetch build number(s)
    Fetch(RemoteNameArgs),
    /// Manage namespaces
    Namespace(NamespaceArgs),
    /// Manage remote repositories
    Remote(RemoteArgs),
    /// Print the version
    Version,
}

#[derive(Args)]
pub struct InitArgs {
    pub path: Option<PathBuf>,
    #[arg(long)]
    pub bare: bool,
}

/// Commit identity; falls back to `[user]` in the repository config.
#[derive(Args, Default)]
pub struct AuthorArgs {
    /// The author name
    #[arg(short, long)]
    pub user: Option<String>,
    /// The author email
    #[arg(short, long)]
    pub email: Option<String>,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(short, long)]
    pub message: String,
    /// File to record; the message itself is recorded when omitted
    pub file: Option<PathBuf>,
    #[command(flatten)]
    pub author: AuthorArgs,
}

#[derive(Args)]
pub struct GetArgs {
    /// The namespace
    #[arg(short, long, default_value = "default")]
    pub namespace: String,
    #[command(flatten)]
    pub author: AuthorArgs,
    /// Create if missing
    #[arg(short, long)]
    pub create: bool,
}

#[derive(Args)]
pub struct SetArgs {
    #[arg(value_parser = parse_build_number)]
    pub number: u64,
    /// The namespace
    #[arg(short, long, default_value = "default")]
    pub namespace: String,
    #[command(flatten)]
    pub author: AuthorArgs,
}

#[derive(Args)]
pub struct IncArgs {
    /// The namespace
    #[arg(short, long, default_value = "default")]
    pub namespace: String,
    #[command(flatten)]
    pub author: AuthorArgs,
    /// Increment even if the build number already matches HEAD
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct HashArgs {
    #[arg(value_parser = parse_build_number)]
    pub number: u64,
    /// The namespace
    #[arg(short, long, default_value = "default")]
    pub namespace: String,
}

#[derive(Args)]
pub struct RemoteNameArgs {
    /// The remote
    #[arg(short, long, default_value = "origin")]
    pub remote: String,
}

#[derive(Args)]
pub struct NamespaceArgs {
    #[command(subcommand)]
    pub action: NamespaceAction,
}

#[derive(Subcommand)]
pub enum NamespaceAction {
    /// List all namespaces
    List,
    /// Delete one or more namespaces
    Delete {
        #[arg(required = true)]
        namespaces: Vec<String>,
    },
    /// Mirror all local namespaces to a remote
    Mirror {
        #[command(flatten)]
        remote: RemoteNameArgs,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete all namespaces
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct RemoteArgs {
    #[command(subcommand)]
    pub action: RemoteAction,
}

#[derive(Subcommand)]
pub enum RemoteAction {
    /// Register a remote repository by path or file:// url
    Add {
        name: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

/// Build numbers are positive integers.
fn parse_build_number(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(0) => Err("build number can't be zero".into()),
        Ok(number) => Ok(number),
        Err(_) => Err(format!("not a valid number: {value}")),
    }
}
