use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use biblioscope_core::error::ExitCode;
use biblioscope_core::{AppConfig, Attachment, Database, ItemId, ItemSummary, PDF_CONTENT_TYPE};
use biblioscope_recognize::{
    ChannelObserver, MetadataResolver, PdfToTextExtractor, RecognitionServiceClient, Recognizer,
    RecognizerSettings, ResolverSettings, RowEvent, RowStatus, ScholarlySearch, SqliteItemStore,
    TcpProbe, TextExtractor, find_identifiers,
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "biblioscope",
    about = "Recognize PDF attachments and file them under bibliographic records",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting BIBLIOSCOPE_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Use this database instead of the one in the library directory.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store PDF files as top-level attachments.
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Also put the attachments into this collection.
        #[arg(long)]
        collection: Option<String>,
    },

    /// Queue attachments for recognition and wait until the queue drains.
    Recognize {
        ids: Vec<String>,
        /// Every top-level PDF attachment in the library.
        #[arg(long, conflicts_with = "ids")]
        all: bool,
    },

    /// List items, with attachments under their parent record.
    List,

    /// Print the DOI and ISBNs found in a PDF without looking anything up.
    Identify { file: PathBuf },

    /// Show the effective configuration.
    Config,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("BIBLIOSCOPE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json || std::env::var("BIBLIOSCOPE_JSON").as_deref() == Ok("1");
    let config = AppConfig::load()?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());

    match cli.command {
        Commands::Add { files, collection } => {
            let db = open_db(&db_path)?;
            let collection = collection
                .map(|name| db.ensure_collection(&name))
                .transpose()?;

            let mut added = Vec::new();
            for file in &files {
                let Ok(path) = std::fs::canonicalize(file) else {
                    eprintln!("File not found: {}", file.display());
                    std::process::exit(ExitCode::FileSystemError as i32);
                };
                let title = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.to_string_lossy().to_string());
                let attachment =
                    db.add_attachment(&title, Some(&path.to_string_lossy()), PDF_CONTENT_TYPE)?;
                if let Some(collection) = &collection {
                    db.add_to_collection(collection.id, attachment.id)?;
                }
                added.push(attachment);
            }
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": added, "collection": collection },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                for attachment in &added {
                    println!("Added {:>5}  {}", attachment.id, attachment.title);
                }
            }
        }

        Commands::Recognize { ids, all } => {
            let db = Arc::new(open_db(&db_path)?);
            let (attachments, missing) = select_attachments(&db, &ids, all)?;
            for id in &missing {
                eprintln!("No attachment with id {id}");
            }
            if attachments.is_empty() {
                if json_output {
                    print_json(&serde_json::json!({
                        "status": "error",
                        "error": "no_attachments",
                        "message": "Nothing to recognize",
                        "missing": missing,
                    }))?;
                } else {
                    eprintln!("Nothing to recognize.");
                }
                std::process::exit(ExitCode::NotFound as i32);
            }

            let recognizer = build_recognizer(&config, db)?;
            let (observer, mut events) = ChannelObserver::new();
            recognizer.add_observer(Arc::new(observer));

            let queued = recognizer.recognize_items(&attachments);
            tracing::info!(queued, "recognition started");

            let mut log = Vec::new();
            let mut cancelled = false;
            let idle = recognizer.wait_idle();
            tokio::pin!(idle);
            loop {
                tokio::select! {
                    Some(event) = events.recv() => report_event(&event, json_output, &mut log),
                    _ = tokio::signal::ctrl_c(), if !cancelled => {
                        eprintln!("Cancelling; waiting for the current attachment to finish.");
                        recognizer.cancel_all();
                        cancelled = true;
                    }
                    _ = &mut idle => break,
                }
            }
            while let Ok(event) = events.try_recv() {
                report_event(&event, json_output, &mut log);
            }

            let rows = recognizer.list_rows();
            let succeeded = rows
                .iter()
                .filter(|row| row.status == RowStatus::Succeeded)
                .count();
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": {
                        "rows": rows,
                        "events": log,
                        "total": recognizer.total_count(),
                        "processed": recognizer.processed_count(),
                        "succeeded": succeeded,
                        "cancelled": cancelled,
                    },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!(
                    "Recognized {succeeded} of {} attachments ({} processed).",
                    recognizer.total_count(),
                    recognizer.processed_count()
                );
            }
        }

        Commands::List => {
            let db = open_db(&db_path)?;
            let items = db.list_items()?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": items, "total": items.len() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if items.is_empty() {
                println!("Library is empty. Use `biblioscope add` to add PDFs.");
            } else {
                print_tree(&items);
            }
        }

        Commands::Identify { file } => {
            if !file.exists() {
                eprintln!("File not found: {}", file.display());
                std::process::exit(ExitCode::FileSystemError as i32);
            }
            let recognize = &config.recognize;
            let extractor = PdfToTextExtractor::new(
                recognize.pdftotext_path.clone(),
                config.scratch_dir(),
                recognize.extraction_timeout(),
            );
            let lines = extractor
                .extract_lines(&file, recognize.max_pages)
                .await
                .with_context(|| format!("extracting text from {}", file.display()))?;
            let found = find_identifiers(&lines, recognize.doi_search_lines);
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "file": file, "lines": lines.len(), "identifiers": found },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!("Lines: {}", lines.len());
                println!("DOI:   {}", found.doi.as_deref().unwrap_or("-"));
                if found.isbns.is_empty() {
                    println!("ISBN:  -");
                }
                for isbn in &found.isbns {
                    println!("ISBN:  {isbn}");
                }
            }
        }

        Commands::Config => {
            let recognize = &config.recognize;
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": {
                        "config_path": AppConfig::config_path(),
                        "database_path": db_path,
                        "scratch_dir": config.scratch_dir(),
                        "recognize": recognize,
                    },
                    "meta": { "duration_ms": start.elapsed().as_millis() }
                }))?;
            } else {
                println!("config_path              = {}", AppConfig::config_path().display());
                println!("database_path            = {}", db_path.display());
                println!("scratch_dir              = {}", config.scratch_dir().display());
                println!(
                    "recognition_service_url  = {}",
                    recognize.recognition_service_url.as_deref().unwrap_or("(disabled)")
                );
                println!("connectivity_probe       = {}", recognize.connectivity_probe);
                println!("request_spacing_ms       = {}", recognize.request_spacing_ms);
                println!("max_pages                = {}", recognize.max_pages);
                println!("full_text_queries        = {}", recognize.full_text_queries);
            }
        }
    }

    Ok(())
}

// ─── Recognition ─────────────────────────────────────────────────────────────

fn build_recognizer(config: &AppConfig, db: Arc<Database>) -> Result<Recognizer> {
    let recognize = &config.recognize;
    let spacing = recognize.request_spacing();

    let store = Arc::new(SqliteItemStore::new(db));
    let extractor = Arc::new(PdfToTextExtractor::new(
        recognize.pdftotext_path.clone(),
        config.scratch_dir(),
        recognize.extraction_timeout(),
    ));
    let search = Arc::new(ScholarlySearch::with_defaults(
        spacing,
        recognize.polite_email.clone(),
    )?);
    let mut resolver =
        MetadataResolver::new(store, extractor, search, ResolverSettings::from(recognize));
    if let Some(url) = &recognize.recognition_service_url {
        resolver = resolver.with_remote(Arc::new(RecognitionServiceClient::new(
            url.clone(),
            spacing,
        )?));
    }

    Ok(Recognizer::new(
        Arc::new(resolver),
        Arc::new(TcpProbe::new(recognize.connectivity_probe.clone(), PROBE_TIMEOUT)),
        RecognizerSettings::from(recognize),
    ))
}

/// Attachments named by `ids`, or every recognizable one with `all`.
/// Unknown ids are returned separately.
fn select_attachments(
    db: &Database,
    ids: &[String],
    all: bool,
) -> Result<(Vec<Attachment>, Vec<String>)> {
    if all {
        return Ok((db.list_recognizable_attachments()?, Vec::new()));
    }

    let mut found = Vec::new();
    let mut missing = Vec::new();
    for raw in ids {
        let id: ItemId = raw.parse()?;
        match db.get_attachment(id)? {
            Some(attachment) => found.push(attachment),
            None => missing.push(raw.clone()),
        }
    }
    Ok((found, missing))
}

fn report_event(event: &RowEvent, json_output: bool, log: &mut Vec<RowEvent>) {
    if json_output {
        log.push(event.clone());
        return;
    }
    match event {
        RowEvent::Added(row) => println!("  [{:>5}] {}", row.id, row.status),
        RowEvent::Updated(row) if row.message.is_empty() => {
            println!("  [{:>5}] {}", row.id, row.status)
        }
        RowEvent::Updated(row) => println!("  [{:>5}] {:<10} {}", row.id, row.status, row.message),
        RowEvent::Deleted(row) => println!("  [{:>5}] removed", row.id),
        RowEvent::Empty | RowEvent::NonEmpty => {}
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn print_tree(items: &[ItemSummary]) {
    for item in items.iter().filter(|item| item.parent_id.is_none()) {
        println!(
            "{id:>5}  {kind:<16}  {title}",
            id = item.id,
            kind = item.item_type.as_str(),
            title = item.title,
        );
        for child in items.iter().filter(|child| child.parent_id == Some(item.id)) {
            println!(
                "{:>5}    └ {}  {}",
                child.id,
                child.title,
                child.file_path.as_deref().unwrap_or("")
            );
        }
    }
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn open_db(db_path: &Path) -> Result<Database> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(db_path)?)
}
