//! docfmt - batch formatting client for Word documents
//!
//! Main entry point for the command line application.
//!
//! # Execution Flow
//!
//! 1. Parse the command line and load `settings.yaml` from the config directory
//! 2. Initialize logging → `<log_dir>/docfmt.<date>`
//! 3. Create a tokio runtime
//! 4. Run the selected command. `format` builds the working configuration
//!    (preset, then `--set` overrides), queues the files, drives the batch
//!    runner until the queue is drained and records the results
//! 5. Shut the runtime down
//!
//! # Configuration Files
//!
//! Expected in the `--config-dir` directory (default `docfmt-data/`):
//! - `settings.yaml`: format service URL, queue limits, logging
//! - `presets.yaml`: custom presets (optional)
//! - `recent_files.yaml`: maintained by docfmt

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use docfmt::models::RecentFile;
use docfmt::services::format_file_size;
use docfmt::{
    APP_NAME, AppSettings, BatchRunner, ConfigManager, ConfigModel, DocumentFile, FormatService,
    HttpFormatService, JobQueue, JobStatus, PresetCatalog, ResultAggregator, VERSION,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding settings.yaml, presets.yaml and recent_files.yaml
    #[arg(long, global = true, default_value = "docfmt-data")]
    config_dir: Utf8PathBuf,

    /// Debug logging, mirrored to the console
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available presets
    Presets,

    /// Format one or more .docx files
    Format {
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,

        /// Start from this preset
        #[arg(short, long)]
        preset: Option<String>,

        /// Override a single option, e.g. `text.font_size=12`. Quote a value
        /// (`'"12"'`) to send it as text
        #[arg(short, long = "set", value_name = "SECTION.KEY=VALUE")]
        overrides: Vec<String>,

        /// Save the formatted documents into this directory
        #[arg(short, long)]
        out: Option<Utf8PathBuf>,
    },

    /// Show the text preview of a remote document
    Preview { file_id: String },

    /// Delete a remote document
    Delete { file_id: String },

    /// List recently formatted documents
    Recent,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let settings = config_manager.load_settings()?;
    let debug_mode = cli.debug || settings.debug_mode;

    let _guard = docfmt::logging::setup_logging_with_console(
        Utf8Path::new(&settings.log_dir),
        debug_mode,
        cli.debug,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("docfmt-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(run(cli.command, config_manager, settings));

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result
}

async fn run(command: Commands, config_manager: ConfigManager, settings: AppSettings) -> Result<()> {
    match command {
        Commands::Presets => {
            let catalog = PresetCatalog::with_custom(config_manager.load_custom_presets()?);
            for preset in catalog.list() {
                println!(
                    "{:<14} {:<16} {} ({} options)",
                    preset.id,
                    preset.name,
                    preset.description,
                    preset.options.option_count()
                );
            }
            Ok(())
        }
        Commands::Format {
            files,
            preset,
            overrides,
            out,
        } => {
            format_files(
                &config_manager,
                &settings,
                files,
                preset.as_deref(),
                &overrides,
                out,
            )
            .await
        }
        Commands::Preview { file_id } => {
            let service = http_service(&settings)?;
            let preview = service.preview(&file_id).await?;
            println!("{} ({} page(s))", preview.file_id, preview.page_count);
            println!("{}", preview.content);
            Ok(())
        }
        Commands::Delete { file_id } => {
            let service = http_service(&settings)?;
            service.delete(&file_id).await?;
            println!("Deleted {}", file_id);
            Ok(())
        }
        Commands::Recent => {
            let recent = config_manager.load_recent_files(settings.recent_files_limit)?;
            if recent.is_empty() {
                println!("No recently formatted documents");
            }
            for entry in recent.entries() {
                println!(
                    "{}  {:<40} {:>10}  {}",
                    entry.date.format("%Y-%m-%d %H:%M"),
                    entry.name,
                    format_file_size(entry.size),
                    entry.id
                );
            }
            Ok(())
        }
    }
}

fn http_service(settings: &AppSettings) -> Result<Arc<HttpFormatService>> {
    let service = HttpFormatService::new(&settings.api_base_url, settings.request_timeout())
        .context("Failed to create HTTP client")?;
    Ok(Arc::new(service))
}

/// Build the working configuration: the preset replaces, overrides merge on top.
fn working_config(
    catalog: &PresetCatalog,
    preset: Option<&str>,
    overrides: &[String],
) -> Result<ConfigModel> {
    let base = preset.map(|id| catalog.resolve(id)).unwrap_or_default();
    let patch = ConfigModel::from_assignments(overrides).context("Invalid --set option")?;
    Ok(base.merge(&patch))
}

async fn format_files(
    config_manager: &ConfigManager,
    settings: &AppSettings,
    paths: Vec<Utf8PathBuf>,
    preset: Option<&str>,
    overrides: &[String],
    out: Option<Utf8PathBuf>,
) -> Result<()> {
    let catalog = PresetCatalog::with_custom(config_manager.load_custom_presets()?);
    let config = working_config(&catalog, preset, overrides)?;
    if config.is_empty() {
        tracing::info!("Empty configuration: original formatting is preserved");
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match DocumentFile::from_path(path.clone()) {
            Ok(file) => files.push(file),
            Err(e) => eprintln!("Skipping {}: {}", path, e),
        }
    }

    let queue = JobQueue::with_limits(settings.queue_limits());
    let outcome = queue.add(files, &config);
    for rejected in &outcome.rejected {
        eprintln!("Rejected: {}", rejected.reason);
    }
    if outcome.rejected_for_capacity() > 0 {
        eprintln!(
            "{} file(s) did not fit in the queue ({} maximum)",
            outcome.rejected_for_capacity(),
            settings.max_queue_size
        );
    }
    if outcome.accepted.is_empty() {
        anyhow::bail!("No documents to format");
    }

    let service = http_service(settings)?;
    let runner = BatchRunner::new(queue.clone(), service.clone());

    // Ctrl-C lets the current document finish, then stops
    let cancel_handle = runner.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing the current document before stopping");
            cancel_handle.cancel();
        }
    });

    runner.start();
    runner.run().await;

    for job in queue.snapshot() {
        match job.status {
            JobStatus::Completed => println!("✓ {}", job.file.name),
            JobStatus::Failed => println!(
                "✗ {}: {}",
                job.file.name,
                job.error.as_deref().unwrap_or("unknown error")
            ),
            JobStatus::Pending | JobStatus::Processing => {
                println!("- {} (not processed)", job.file.name)
            }
        }
    }

    let results = ResultAggregator::new(queue);
    let summary = results.summary();
    println!("{}/{} document(s) formatted", summary.completed, summary.total);

    if summary.can_download_all {
        match out {
            Some(dir) => match results.save_all(service.as_ref(), &dir).await {
                Ok(report) => {
                    for path in &report.saved {
                        println!("Saved {}", path);
                    }
                    for failure in &report.failed {
                        println!("✗ could not save {}: {}", failure.file_name, failure.error);
                    }
                }
                Err(err) => {
                    tracing::error!("Saving results failed: {:#}", err);
                    println!("✗ {:#}", err);
                }
            },
            None => {
                for token in results.download_all(service.as_ref()) {
                    println!("{} -> {}", token.file_name, token.url);
                }
            }
        }

        let mut recent = config_manager.load_recent_files(settings.recent_files_limit)?;
        for job in results.completed_jobs() {
            if let Some(entry) = RecentFile::from_completed_job(&job) {
                recent.record(entry);
            }
        }
        config_manager.save_recent_files(&recent)?;
    }

    runner.metrics().log_summary();
    Ok(())
}
