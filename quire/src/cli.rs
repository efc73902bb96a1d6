use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Quire: edit documents without losing a keystroke.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the default workspace path detection.
    #[arg(long, global = true, env = "QUIRE_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create and initialize a new workspace. Defaults to the current directory.
    Init(InitArgs),
    /// Create a new, empty document.
    New(NewArgs),
    /// List the documents in the workspace.
    List,
    /// Print a document's title and text.
    Show(ShowArgs),
    /// Edit a document through an editing session, then close it.
    Edit(EditArgs),
    /// Show or change the workspace's session timing.
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to create the workspace.
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Title of the new document.
    pub title: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// ID of the document.
    pub id: String,

    /// Wrap text at this width instead of the terminal width.
    #[arg(long)]
    pub width: Option<usize>,
}

#[derive(Args, Debug)]
pub struct TimingArgs {
    /// Quiet period before a debounced save, in milliseconds.
    #[arg(long)]
    pub quiet_period_ms: Option<u64>,

    /// Delay between an intercepted close and the flush, in milliseconds.
    #[arg(long)]
    pub grace_delay_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// ID of the document.
    pub id: String,

    /// New title.
    #[arg(long)]
    pub title: Option<String>,

    /// Replace the body with plain text. Blank lines separate paragraphs.
    #[arg(long, conflicts_with = "markdown")]
    pub text: Option<String>,

    /// Replace the body with the contents of a Markdown file.
    #[arg(long)]
    pub markdown: Option<PathBuf>,

    /// Let debounced saves run before closing instead of flushing on close.
    #[arg(long)]
    pub wait: bool,

    #[command(flatten)]
    pub timing: TimingArgs,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub timing: TimingArgs,
}
