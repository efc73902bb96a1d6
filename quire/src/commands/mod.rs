use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{ConfigArgs, EditArgs, InitArgs, NewArgs, ShowArgs, TimingArgs};
use crate::host::{ConsoleReporter, TerminalWindow};
use crate::AppContext;
use anyhow::{Context, Result};
use console::{style, Term};
use quire_core::body::Body;
use quire_core::config::SessionConfig;
use quire_core::session::{CloseDecision, Session, SessionContext};
use quire_core::storage::{DocumentStore, FsStore};
use tracing::info;

// --- Handler Functions ---

pub async fn handle_init(args: InitArgs) -> Result<()> {
    let target_path = match args.path {
        Some(path) => path,
        None => std::env::current_dir().context("Cannot get current dir")?,
    };
    info!("Creating workspace at: {}", target_path.display());

    let store = FsStore::create(&target_path).await?;
    println!("Workspace created at {}", store.path().display());
    Ok(())
}

pub async fn handle_new(args: NewArgs, cx: AppContext) -> Result<()> {
    let store = cx.store()?;
    let doc = store.create_document(&args.title).await?;
    println!("{}", doc.id);
    Ok(())
}

pub async fn handle_list(cx: AppContext) -> Result<()> {
    let store = cx.store()?;
    let documents = store.list_documents().await?;
    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in documents {
        let marker = if doc.is_open { style("open").green().to_string() } else { String::new() };
        println!("{}  {}  {}", style(&doc.id).dim(), doc.title, marker);
    }
    Ok(())
}

pub async fn handle_show(args: ShowArgs, cx: AppContext) -> Result<()> {
    let store = cx.store()?;
    let doc = store.get_document(&args.id).await?;
    let width = args
        .width
        .unwrap_or_else(|| (Term::stdout().size().1 as usize).clamp(20, 100));

    println!("{}", style(&doc.title).bold());
    if doc.is_open {
        println!("{}", style("(open in another session)").yellow());
    }
    println!();
    for paragraph in doc.text_content.split("\n\n") {
        println!("{}", textwrap::fill(paragraph, width));
        println!();
    }
    Ok(())
}

pub async fn handle_edit(args: EditArgs, cx: AppContext) -> Result<()> {
    let store = Arc::new(cx.store()?);
    let config = session_config(store.session_config(), &args.timing)?;
    let reporter = Arc::new(ConsoleReporter::default());
    let window = Arc::new(TerminalWindow::default());

    let ctx = SessionContext::new(store.clone(), reporter.clone(), window.clone())
        .with_config(config);
    let session = Session::open(&args.id, ctx).await?;

    if let Some(title) = args.title {
        session.edit_title(title);
    }
    if let Some(body) = read_body(args.text, args.markdown).await? {
        session.edit_body(body);
    }
    if args.wait {
        tokio::time::sleep(config.quiet_period + Duration::from_millis(50)).await;
    }

    match session.request_close() {
        CloseDecision::Suppressed => info!("Flushing unsaved changes before closing"),
        decision => info!(?decision, "Closing"),
    }
    session.closed().await;

    if reporter.reported() > 0 {
        anyhow::bail!("Some changes could not be saved");
    }
    let doc = store.get_document(&args.id).await?;
    println!("Saved {}", style(&doc.title).bold());
    Ok(())
}

pub async fn handle_config(args: ConfigArgs, cx: AppContext) -> Result<()> {
    let mut store = cx.store()?;
    let current = store.session_config();
    let updated = session_config(current, &args.timing)?;
    if updated != current {
        store.set_session_config(updated).await?;
        info!("Session timing updated");
    }
    println!("quiet period: {} ms", updated.quiet_period.as_millis());
    println!("grace delay:  {} ms", updated.grace_delay.as_millis());
    Ok(())
}

/// Applies command-line overrides to the workspace's timing.
fn session_config(base: SessionConfig, timing: &TimingArgs) -> Result<SessionConfig> {
    let mut config = base;
    if let Some(ms) = timing.quiet_period_ms {
        config = config.with_quiet_period(Duration::from_millis(ms));
    }
    if let Some(ms) = timing.grace_delay_ms {
        config = config.with_grace_delay(Duration::from_millis(ms));
    }
    config.validate()?;
    Ok(config)
}

async fn read_body(text: Option<String>, markdown: Option<PathBuf>) -> Result<Option<Body>> {
    if let Some(text) = text {
        return Ok(Some(Body::from_plain_text(&text)));
    }
    if let Some(path) = markdown {
        let source = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Some(Body::from_markdown(&source)));
    }
    Ok(None)
}
