use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog_reconciler::background_jobs::jobs::LibraryReconciliationJob;
use catalog_reconciler::background_jobs::{create_scheduler, JobContext};
use catalog_reconciler::bookmarks::{
    BookmarkResolver, BookmarkStore, DocumentPickerStore, PortableBookmarkCodec,
    ShareExtensionStore,
};
use catalog_reconciler::config;
use catalog_reconciler::library_store::{IntegrityReport, LibraryStore, SqliteLibraryStore};
use catalog_reconciler::reconciler::{
    CatalogEvents, CatalogReconciler, ExistenceVerifier, ProvenanceClassifier,
    ReconcilerSettings, SweepMode, SweepOutcome, SweepReport, UnsandboxedAccess,
};

const READ_POOL_SIZE: usize = 2;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite catalog database file.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The app's iCloud container documents directory (internal root).
    #[clap(long, global = true, value_parser = parse_path)]
    pub icloud_container: Option<PathBuf>,

    /// The app's local documents directory (internal root).
    #[clap(long, global = true, value_parser = parse_path)]
    pub documents_dir: Option<PathBuf>,

    /// JSON file with bookmarks saved by the document picker.
    #[clap(long, global = true, value_parser = parse_path)]
    pub document_picker_bookmarks: Option<PathBuf>,

    /// JSON file with bookmarks saved by the share extension.
    #[clap(long, global = true, value_parser = parse_path)]
    pub share_extension_bookmarks: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs one reconciliation sweep, removing every track that is gone.
    Sweep {
        /// Print the report as JSON.
        #[clap(long)]
        json: bool,
    },

    /// Reports which tracks a sweep would remove, without deleting anything.
    Check {
        #[clap(long)]
        json: bool,
    },

    /// Prints catalog rows that break the integrity invariants.
    Audit {
        #[clap(long)]
        json: bool,
    },

    /// Keeps sweeping on the configured schedule until Ctrl+C.
    Watch,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_path: args.db_path.clone(),
            icloud_container: args.icloud_container.clone(),
            documents_dir: args.documents_dir.clone(),
            document_picker_bookmarks: args.document_picker_bookmarks.clone(),
            share_extension_bookmarks: args.share_extension_bookmarks.clone(),
        }
    }
}

fn build_resolver(app_config: &config::AppConfig) -> BookmarkResolver {
    let mut stores: Vec<Arc<dyn BookmarkStore>> = Vec::new();
    if let Some(path) = &app_config.document_picker_bookmarks {
        let store = DocumentPickerStore::load(path);
        info!("Loaded {} document picker bookmarks", store.len());
        stores.push(Arc::new(store));
    }
    if let Some(path) = &app_config.share_extension_bookmarks {
        let store = ShareExtensionStore::load(path);
        info!("Loaded {} share extension bookmarks", store.len());
        stores.push(Arc::new(store));
    }
    BookmarkResolver::new(stores, Arc::new(PortableBookmarkCodec))
}

fn build_reconciler(
    app_config: &config::AppConfig,
    store: Arc<dyn LibraryStore>,
) -> CatalogReconciler {
    let verifier = ExistenceVerifier::new(
        ProvenanceClassifier::new(app_config.internal_roots()),
        build_resolver(app_config),
        Arc::new(UnsandboxedAccess),
    )
    .with_probe_bytes(app_config.reconciler.probe_bytes);

    CatalogReconciler::new(
        store,
        Arc::new(verifier),
        CatalogEvents::default(),
        ReconcilerSettings {
            max_concurrent_checks: app_config.reconciler.max_concurrent_checks,
        },
    )
}

fn print_sweep_report(report: &SweepReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{:?} sweep: {:?} in {} ms",
        report.mode, report.outcome, report.duration_ms
    );
    println!(
        "Scanned {} tracks ({} internal, {} external)",
        report.tracks_scanned, report.internal_tracks, report.external_tracks
    );
    if report.gone.is_empty() {
        println!("Every track is reachable");
    } else {
        println!("Gone tracks:");
        for gone in &report.gone {
            println!(
                "  {}  {:?}/{:?}  {}",
                gone.stable_id, gone.provenance, gone.reason, gone.path
            );
        }
    }
    if report.mode == SweepMode::Actual {
        println!(
            "Removed {} tracks, {} albums, {} artists, {} favorites, {} playlist items",
            report.removed,
            report.albums_removed,
            report.artists_removed,
            report.favorites_removed,
            report.playlist_items_removed
        );
        if report.orphans_pruned > 0 {
            println!("Pruned {} pre-existing orphans", report.orphans_pruned);
        }
    }
    for failed in &report.failed {
        println!("  FAILED {}  {}: {}", failed.stable_id, failed.path, failed.error);
    }
    if let Some(error) = &report.error {
        println!("Error: {}", error);
    }
    Ok(())
}

fn print_integrity_report(report: &IntegrityReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    if report.is_clean() {
        println!("Catalog is consistent");
        return Ok(());
    }
    for album in &report.orphaned_albums {
        println!("orphaned album: {}", album);
    }
    for artist in &report.orphaned_artists {
        println!("orphaned artist: {}", artist);
    }
    for favorite in &report.dangling_favorites {
        println!("dangling favorite: {}", favorite);
    }
    for item in &report.dangling_playlist_items {
        println!(
            "dangling playlist item: playlist {} position {} -> {}",
            item.playlist_id, item.position, item.track_stable_id
        );
    }
    println!("{} problems found", report.total());
    Ok(())
}

async fn run_sweep(reconciler: &CatalogReconciler, mode: SweepMode, json: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping after the current track");
            on_interrupt.cancel();
        }
    });

    let report = reconciler.sweep_with(mode, &cancel).await;
    print_sweep_report(&report, json)?;
    if report.outcome == SweepOutcome::Failed {
        bail!("Sweep failed");
    }
    Ok(())
}

async fn run_watch(
    app_config: &config::AppConfig,
    reconciler: Arc<CatalogReconciler>,
) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let mut events = reconciler.events().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("Catalog event: {:?}", event),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} catalog events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let job_context = JobContext::new(shutdown_token.child_token());
    let (mut scheduler, scheduler_handle) = create_scheduler(shutdown_token.clone(), job_context);
    scheduler
        .register_job(Arc::new(LibraryReconciliationJob::new(
            reconciler,
            app_config.schedule.interval(),
            app_config.schedule.run_on_startup,
        )))
        .await;
    for job in scheduler_handle.jobs().await {
        info!("Job {} ({}) next runs at {:?}", job.id, job.name, job.next_run_at);
    }

    #[cfg(unix)]
    {
        use catalog_reconciler::background_jobs::HookEvent;
        use tokio::signal::unix::{signal, SignalKind};

        let mut manual_sync = signal(SignalKind::user_defined1())?;
        let handle = scheduler_handle.clone();
        tokio::spawn(async move {
            while manual_sync.recv().await.is_some() {
                info!("Received SIGUSR1, requesting a manual sync");
                if let Err(e) = handle.send_hook(HookEvent::ManualSync).await {
                    warn!("Failed to request manual sync: {}", e);
                }
            }
        });
    }
    tokio::select! {
        _ = scheduler.run() => {
            info!("Scheduler stopped");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            // Give the scheduler a moment to shut down gracefully
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_path: {:?}", app_config.db_path);
    info!("  internal roots: {:?}", app_config.internal_roots());

    if !app_config.db_path.exists() {
        info!("Creating new catalog database at {:?}", app_config.db_path);
    }
    let store = Arc::new(SqliteLibraryStore::new(&app_config.db_path, READ_POOL_SIZE)?);

    match cli_args.command {
        Command::Audit { json } => {
            let report = store.integrity_report()?;
            print_integrity_report(&report, json)
        }
        Command::Sweep { json } => {
            let reconciler = build_reconciler(&app_config, store);
            run_sweep(&reconciler, SweepMode::Actual, json).await
        }
        Command::Check { json } => {
            let reconciler = build_reconciler(&app_config, store);
            run_sweep(&reconciler, SweepMode::DryRun, json).await
        }
        Command::Watch => {
            let reconciler = Arc::new(build_reconciler(&app_config, store));
            run_watch(&app_config, reconciler).await
        }
    }
}
