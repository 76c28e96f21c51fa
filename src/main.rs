use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use docchat::{logging, BackendKind, Config, Overrides, Role, Session, Settings};

#[derive(Parser)]
#[command(name = "docchat")]
#[command(version, about = "Chat with an assistant that answers from your documents")]
struct Cli {
    /// Backend to talk to: local (built-in demo) or remote (HTTP service)
    #[arg(long, global = true, value_parser = parse_backend)]
    backend: Option<BackendKind>,

    /// Base URL of the document service
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Where to write logs
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat interface (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// Show indexing status of the document library
    Status,
    /// Upload a document for indexing
    Upload {
        /// File to upload
        file: PathBuf,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the current settings to the config file
    Init,
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
    BackendKind::from_str(s).ok_or_else(|| {
        let names: Vec<&str> = BackendKind::all().iter().map(|k| k.as_str()).collect();
        format!("unknown backend '{}' (expected one of: {})", s, names.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    let overrides = Overrides {
        backend: cli.backend,
        api_url: cli.api_url.clone(),
    };
    let settings = config.resolve(&overrides)?;

    let log_path = match cli.log_file {
        Some(path) => path,
        None => logging::default_log_path()?,
    };
    logging::init(&log_path, &settings.log_filter)?;
    tracing::info!(backend = settings.backend.as_str(), api_url = %settings.api_url, "Starting");

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_tui(&settings).await?,
        Commands::Ask { question } => ask(&settings, &question).await?,
        Commands::Status => status(&settings).await?,
        Commands::Upload { file } => upload(&settings, file).await?,
        Commands::Config { action: ConfigAction::Init } => {
            let path = Config::from_settings(&settings).save()?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

async fn run_tui(settings: &Settings) -> Result<()> {
    let mut session = Session::from_settings(settings)?;
    session.start(settings.poll_interval);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(session, settings);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    app.shutdown();
    tui::restore()?;
    result
}

async fn ask(settings: &Settings, question: &str) -> Result<()> {
    let session = Session::from_settings(settings)?;
    if !session.controller().submit(question).await {
        println!("Nothing to ask.");
        return Ok(());
    }

    let reply = session
        .state()
        .read(|s| s.messages.last().filter(|m| m.role == Role::Assistant).cloned())
        .context("no reply was recorded")?;

    println!("{}", reply.content);
    if !reply.sources.is_empty() {
        println!("\nSources:");
        for (i, source) in reply.sources.iter().enumerate() {
            println!("  [{}] {} - {}", i + 1, source.title, source.locator);
        }
    }
    Ok(())
}

async fn status(settings: &Settings) -> Result<()> {
    let session = Session::from_settings(settings)?;
    if !session.library().refresh().await {
        anyhow::bail!("could not reach the document service at {}", settings.api_url);
    }
    print_documents(&session);
    Ok(())
}

async fn upload(settings: &Settings, file: PathBuf) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("{} is not a file", file.display());
    }
    let session = Session::from_settings(settings)?;
    println!("Uploading {}...", file.display());
    if !session.library().ingest(file).await {
        anyhow::bail!("upload failed, see the log for details");
    }
    print_documents(&session);
    Ok(())
}

fn print_documents(session: &Session) {
    let state = session.state().snapshot();
    println!(
        "{}: {}/{} indexed, {} pending",
        session.kind().display_name(),
        state.indexed_count,
        state.documents.len(),
        state.pending_count()
    );
    for doc in &state.documents {
        let marker = if doc.status.is_indexed() { "●" } else { "○" };
        println!("  {} {}", marker, doc.name);
    }
}
