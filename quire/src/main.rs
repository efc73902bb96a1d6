use anyhow::Result;
use clap::Parser;
use quire::cli::{Cli, Commands};
use quire::{commands, AppContext};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Resolved up front; commands that need a workspace fail on use
    let cx = AppContext::new(cli.workspace.clone()).await?;
    match cli.command {
        Commands::Init(args) => commands::handle_init(args).await?,
        Commands::New(args) => commands::handle_new(args, cx).await?,
        Commands::List => commands::handle_list(cx).await?,
        Commands::Show(args) => commands::handle_show(args, cx).await?,
        Commands::Edit(args) => commands::handle_edit(args, cx).await?,
        Commands::Config(args) => commands::handle_config(args, cx).await?,
    }

    Ok(())
}

/// Logs go to stderr. `RUST_LOG` wins over the flags.
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
