use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use db_auto_backup::config::{self, Config};
use db_auto_backup::managers::backup::{BackupManager, RunReport};
use db_auto_backup::managers::logging::{self, LogCapture, LoggingConfig};
use db_auto_backup::managers::scheduler::Scheduler;
use db_auto_backup::utils::cron::parse_schedule;
use db_auto_backup::utils::{ContainerRuntime, DockerCli, S3Store};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "db-auto-backup")]
#[command(about = "Automatic backups of database containers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file; the environment is used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every database container once, ignoring the schedule
    Run,

    /// Run on the configured schedule (once when no schedule is set)
    Daemon,

    /// Show which containers would be backed up
    List,

    /// Validate configuration
    Validate,

    /// Show the next trigger times of the schedule
    NextRuns {
        /// Number of trigger times to show
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?,
        None => Config::from_env().context("Invalid configuration in environment")?,
    };

    let command = cli.command.unwrap_or(Commands::Daemon);

    // Commands that only inspect configuration - use simple console logging
    match command {
        Commands::Validate => {
            logging::init_console_logging();
            print_config_summary(&config);
            return Ok(());
        }
        Commands::NextRuns { count } => {
            logging::init_console_logging();
            return print_next_runs(&config, count);
        }
        _ => {}
    }

    let capture = LogCapture::new();
    let _log_guard = logging::init_logging(
        &LoggingConfig::from_settings(&config.logging),
        Some(capture.clone()),
    )?;

    let config = Arc::new(config);
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerCli::new(&config.docker_binary));
    let mut manager = BackupManager::new(Arc::clone(&config), runtime).with_log_capture(capture);

    if config.s3.enabled {
        let store = S3Store::connect(&config.s3)
            .await
            .context("Failed to configure S3 uploads")?;
        manager = manager.with_object_store(Arc::new(store));
    }

    match command {
        Commands::List => list_targets(&manager).await,
        Commands::Run => finish(manager.run_once().await),
        Commands::Daemon => run_daemon(&manager).await,
        // Handled before logging was set up
        Commands::Validate | Commands::NextRuns { .. } => Ok(()),
    }
}

fn finish(report: RunReport) -> Result<()> {
    if report.success() {
        println!("✓ {}", report.summary());
        Ok(())
    } else {
        anyhow::bail!("{}", report.summary())
    }
}

async fn run_daemon(manager: &BackupManager) -> Result<()> {
    let scheduler = Scheduler::from_config(manager.config())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received, finishing the current run");
        let _ = shutdown_tx.send(true);
    });

    let last_success = Arc::new(AtomicBool::new(true));
    let job_success = Arc::clone(&last_success);
    let runs = scheduler
        .run(
            move || {
                let success = Arc::clone(&job_success);
                async move {
                    let report = manager.run_once().await;
                    success.store(report.success(), Ordering::SeqCst);
                }
            },
            shutdown_rx,
        )
        .await;

    info!("Stopped after {} run(s)", runs);

    if manager.config().schedule().is_none() && !last_success.load(Ordering::SeqCst) {
        anyhow::bail!("Backup run failed");
    }
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn list_targets(manager: &BackupManager) -> Result<()> {
    let discovery = manager
        .discover()
        .await
        .context("Failed to list containers")?;

    println!("=== Database Containers ===\n");
    if discovery.targets.is_empty() {
        println!("No database containers found");
    }
    for target in &discovery.targets {
        println!(
            "  {:<30} {:<10} {} ({})",
            target.container_name,
            target.engine,
            target.image,
            target.short_id()
        );
    }

    if !discovery.skipped.is_empty() {
        println!("\nSkipped:");
        for skipped in &discovery.skipped {
            println!("  {:<30} {} - {}", skipped.name, skipped.image, skipped.reason);
        }
    }

    println!(
        "\n{} running container(s), {} to back up",
        discovery.containers_seen,
        discovery.targets.len()
    );
    Ok(())
}

fn print_config_summary(config: &Config) {
    println!("Configuration is valid!");
    println!("Backup directory: {}", config.backup_dir.display());
    println!("Schedule: {}", config.schedule().unwrap_or("none (run once)"));
    println!("Compression: {}", config.compression);
    if config.timestamp.enabled {
        println!(
            "Timestamp: {} ({} name)",
            config.timestamp.format, config.timestamp.order
        );
    } else {
        println!("Timestamp: disabled");
    }
    println!("Parallel targets: {}", config.max_parallel);
    println!("Dump timeout: {}s", config.dump_timeout_seconds);
    println!(
        "Hook: {}{}",
        if config.hooks.is_configured() { "configured" } else { "none" },
        if config.hooks.include_logs { " (with logs)" } else { "" }
    );
    if config.s3.enabled {
        println!(
            "S3: bucket {} at {} (prefix '{}', keep local: {})",
            config.s3.bucket.as_deref().unwrap_or_default(),
            config.s3.endpoint.as_deref().unwrap_or_default(),
            config.s3.prefix,
            config.s3.keep_local
        );
    } else {
        println!("S3: disabled");
    }
}

fn print_next_runs(config: &Config, count: usize) -> Result<()> {
    let Some(expression) = config.schedule() else {
        println!("No schedule configured; each start performs a single run");
        return Ok(());
    };

    let schedule = parse_schedule(expression)?;
    println!("Next runs for '{}':", expression);
    for time in schedule.upcoming(&chrono::Local::now(), count) {
        println!("  {}", time.format("%Y-%m-%d %H:%M:%S %Z"));
    }
    Ok(())
}
