//! Command-line front end for the document desk.

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use log::{debug, info};
use pdfdesk::config::{LayeredConfigOptions, PdfdeskConfig};
use pdfdesk::core::{Desk, SendOutcome};
use pdfdesk::protocol::{FilterState, Record, RecordEdit, UploadFile};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Command-line options for the desk client.
#[derive(Debug, Parser)]
#[command(name = "pdfdesk", version)]
struct Cli {
    /// Optional path to a pdfdesk.json5 config file, applied over the layered config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the record service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List records under a filter
    List {
        #[arg(long, default_value = "all")]
        filter: FilterState,
    },
    /// Rename a record
    Rename { id: String, name: String },
    /// Mark a record as selected
    Select { id: String },
    /// Clear a record's selection
    Unselect { id: String },
    /// Delete a record
    Delete { id: String },
    /// Upload a PDF document
    Upload { path: PathBuf },
    /// Ask one question about a record
    Ask { id: String, question: String },
    /// Chat about a record, reading questions from stdin
    Chat { id: String },
}

fn load_config(cli: &Cli) -> anyhow::Result<PdfdeskConfig> {
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = cli.config.as_ref() {
        info!("loading config override: {}", path.display());
        options = options.with_runtime_path(path);
    }
    let mut layered =
        PdfdeskConfig::load_layered_with_options(options).context("failed to load config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    if let Some(base_url) = cli.base_url.as_ref() {
        layered
            .override_base_url(base_url)
            .context("invalid --base-url")?;
    }
    Ok(layered.config)
}

fn print_record(record: &Record) {
    let mark = if record.selected { "x" } else { " " };
    println!("[{mark}] {}\t{}\t{}", record.id, record.name, record.file);
}

/// Load every record and resolve `raw` against their ids.
async fn resolve(desk: &Desk, raw: &str) -> anyhow::Result<Record> {
    desk.store()
        .load(FilterState::All)
        .await
        .context("failed to load records")?;
    desk.store()
        .find_by_display_id(raw)
        .ok_or_else(|| anyhow!("no record with id {raw}"))
}

async fn edit(desk: &Desk, raw: &str, edit: RecordEdit) -> anyhow::Result<()> {
    let record = resolve(desk, raw).await?;
    let updated = desk.store().apply_local_edit(&record.id, edit)?;
    print_record(&updated);
    Ok(())
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))
}

async fn chat(desk: &Desk, raw: &str) -> anyhow::Result<()> {
    let record = resolve(desk, raw).await?;
    desk.chat().open(record.id.clone());
    eprintln!("chatting about {} (one question per line, EOF to quit)", record.name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match desk.chat().send(&line).await? {
            SendOutcome::Skipped => {}
            SendOutcome::Answered(message) => println!("{}", message.answer),
            SendOutcome::Failed { message, error } => {
                debug!("chat request failed (error={})", error);
                println!("{}", message.answer);
            }
            SendOutcome::Dropped(_) => break,
        }
    }
    desk.chat().close();
    Ok(())
}

async fn run(desk: &Desk, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List { filter } => {
            for record in desk.store().set_filter(filter).await? {
                print_record(&record);
            }
        }
        Command::Rename { id, name } => {
            if name.trim().is_empty() {
                bail!("name must not be empty");
            }
            edit(desk, &id, RecordEdit::Name(name)).await?;
        }
        Command::Select { id } => edit(desk, &id, RecordEdit::Selected(true)).await?,
        Command::Unselect { id } => edit(desk, &id, RecordEdit::Selected(false)).await?,
        Command::Delete { id } => {
            let record = resolve(desk, &id).await?;
            desk.store().remove(&record.id).await?;
            println!("deleted {}", record.id);
        }
        Command::Upload { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let record = desk
                .store()
                .upload(UploadFile::pdf(file_name(&path)?, bytes))
                .await?;
            print_record(&record);
        }
        Command::Ask { id, question } => {
            let record = resolve(desk, &id).await?;
            desk.chat().open(record.id);
            match desk.chat().send(&question).await? {
                SendOutcome::Skipped => bail!("question must not be empty"),
                SendOutcome::Answered(message) | SendOutcome::Dropped(message) => {
                    println!("{}", message.answer)
                }
                SendOutcome::Failed { message, error } => {
                    println!("{}", message.answer);
                    return Err(error).context("question failed");
                }
            }
        }
        Command::Chat { id } => chat(desk, &id).await?,
    }
    Ok(())
}

/// Entry point for the pdfdesk client.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pdfdesk::init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(
        "starting pdfdesk (base_url={}, debounce_ms={})",
        config.remote.base_url, config.sync.debounce_ms
    );
    let desk = Desk::from_config(config).context("failed to build desk")?;

    let result = run(&desk, cli.command).await;
    let shutdown = desk.shutdown().await.context("failed to sync pending edits");
    result.and(shutdown)
}
