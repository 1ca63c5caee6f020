use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use labsync::config::{self, AppConfig};
use labsync::db::SqliteStore;
use labsync::reconcile::ReconciliationMapper;
use labsync::soap::{ArtifactDump, LabClient, LabGateway};
use labsync::worker::{start_scheduler, IntegrationWorker, WorkerStores};

#[derive(Parser)]
#[command(
    name = "labsync",
    about = "Reconcile lab orders with provider results and attach the reports",
    version,
    propagate_version = true
)]
struct Cli {
    /// KEY=VALUE file layered under the process environment
    #[arg(long, global = true, env = "LABSYNC_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// SQLite store path (overrides LABSYNC_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the periodic integration scheduler until Ctrl-C (default)
    Run,

    /// Run exactly one integration cycle
    RunOnce,

    /// Check that the provider endpoint answers
    Probe,

    /// Fetch one order result and print it as JSON
    FetchOrder {
        year: i32,
        remote_code: String,
        /// Request the PDF report (0 or 1)
        #[arg(long, default_value_t = 1)]
        pdf: u8,
    },

    /// Refresh the order-code mapping from a trailing period export
    RefreshMap {
        /// Window width in hours (default: MAPPING_WINDOW_HOURS)
        #[arg(long)]
        hours: Option<u32>,
    },

    /// Show the stored mapping for a local order code
    Lookup { local_code: String },

    /// Open the store, apply migrations and report the table count
    CheckDb,
}

fn main() {
    let cli = Cli::parse();
    labsync::init_tracing();

    if let Err(e) = run(cli) {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.env_file.as_deref()).context("loading configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    tracing::info!(version = config::APP_VERSION, db = %config.db_path.display(), "Labsync starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(&config),
        Commands::RunOnce => cmd_run_once(&config),
        Commands::Probe => cmd_probe(&config),
        Commands::FetchOrder {
            year,
            remote_code,
            pdf,
        } => cmd_fetch_order(&config, year, &remote_code, pdf != 0),
        Commands::RefreshMap { hours } => {
            cmd_refresh_map(&config, hours.unwrap_or(config.worker.mapping_window_hours))
        }
        Commands::Lookup { local_code } => cmd_lookup(&config, &local_code),
        Commands::CheckDb => cmd_check_db(&config),
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("opening store at {}", config.db_path.display()))?;
    Ok(Arc::new(store))
}

/// Built on the main thread: the blocking HTTP client must not be created
/// inside the async runtime.
fn build_client(config: &AppConfig) -> Result<Arc<LabClient>> {
    config.validate_remote().context("invalid provider settings")?;
    let client = LabClient::new(&config.remote)
        .context("building provider client")?
        .with_dump(config.dump_dir.clone().map(ArtifactDump::new));
    Ok(Arc::new(client))
}

fn build_worker(config: &AppConfig, client: Arc<LabClient>, store: Arc<SqliteStore>) -> IntegrationWorker {
    IntegrationWorker::new(
        client,
        WorkerStores::shared(store),
        config.worker.clone(),
        config.documents.clone(),
    )
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

fn cmd_run(config: &AppConfig) -> Result<()> {
    let client = build_client(config)?;
    let store = open_store(config)?;

    if !client.check_reachable() {
        tracing::warn!(endpoint = client.endpoint(), "Provider not reachable, starting anyway");
    }

    let runtime = runtime()?;
    let worker = Arc::new(build_worker(config, client, store));
    let scheduler = start_scheduler(worker, runtime.handle().clone());

    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("waiting for Ctrl-C")?;
    tracing::info!("Shutdown requested, waiting for the running cycle");
    // Dropping the handle joins the scheduler thread.
    drop(scheduler);
    Ok(())
}

fn cmd_run_once(config: &AppConfig) -> Result<()> {
    let client = build_client(config)?;
    let store = open_store(config)?;
    let worker = build_worker(config, client, store);

    let processed = runtime()?.block_on(worker.run_cycle());
    println!("processed={processed} errors={}", worker.errors());
    Ok(())
}

fn cmd_probe(config: &AppConfig) -> Result<()> {
    let client = build_client(config)?;
    if !client.check_reachable() {
        bail!("provider not reachable at {}", client.probe_url());
    }
    println!("reachable: {}", client.probe_url());
    Ok(())
}

fn cmd_fetch_order(config: &AppConfig, year: i32, remote_code: &str, include_pdf: bool) -> Result<()> {
    let client = build_client(config)?;
    let result = client
        .try_fetch_order(year, remote_code, include_pdf)
        .with_context(|| format!("requesting order {year}-{remote_code}"))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_refresh_map(config: &AppConfig, hours: u32) -> Result<()> {
    let client = build_client(config)?;
    let store = open_store(config)?;
    let mapper = ReconciliationMapper::new(store);

    let end = Local::now().naive_local();
    let start = end - chrono::Duration::hours(i64::from(hours));
    let raw = client
        .try_fetch_period_results(start, end, config.worker.mapping_include_graphics)
        .context("requesting period results")?;
    let upserted = mapper.refresh(&raw).context("storing mappings")?;
    println!("upserted={upserted} window_hours={hours}");
    Ok(())
}

fn cmd_lookup(config: &AppConfig, local_code: &str) -> Result<()> {
    let store = open_store(config)?;
    let mapper = ReconciliationMapper::new(store);
    match mapper.lookup(local_code).context("reading mapping")? {
        Some(mapping) => println!("{}", serde_json::to_string_pretty(&mapping)?),
        None => bail!("no mapping for local order code {local_code:?}"),
    }
    Ok(())
}

fn cmd_check_db(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let tables = store.table_count().context("counting tables")?;
    println!("store={} tables={tables}", config.db_path.display());
    Ok(())
}
