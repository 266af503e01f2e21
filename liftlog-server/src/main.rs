use std::sync::Arc;

use clap::Parser;
use liftlog_core::config::BackendKind;
use liftlog_core::LiftlogConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use liftlog_server::tracker::{Outcome, ViewStateController};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "liftlog.toml")]
    config: String,

    /// Authenticated user id (overrides `identity.user_id`)
    #[arg(short, long, env = "LIFTLOG_USER")]
    user: Option<String>,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match LiftlogConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let default_level = config
        .service
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .init();

    // Connect to DB only when the store is Postgres
    let pool = if config.remote.backend == BackendKind::Postgres {
        match liftlog_core::db::create_pool(&config.database).await {
            Ok(p) => Some(p),
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let gateway = match liftlog_core::create_gateway(&config.remote, pool.clone()) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to create {:?} gateway: {}", config.remote.backend, e);
            std::process::exit(1);
        }
    };

    let user_id = args
        .user
        .clone()
        .or_else(|| config.identity.user_id.clone())
        .unwrap_or_default();
    let controller = match ViewStateController::new(gateway, user_id) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Cannot start tracker: {} (pass --user or set identity.user_id)", e);
            std::process::exit(1);
        }
    };

    if args.health {
        if let Some(pool) = &pool {
            match liftlog_core::db::health_check(pool).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            }
            match liftlog_core::db::check_sessions_table(pool, &config.remote.table).await {
                Ok(n) => println!("✅ {} rows in {}", n, config.remote.table),
                Err(e) => {
                    println!("❌ {} check failed: {}", config.remote.table, e);
                    std::process::exit(1);
                }
            }
        }

        let report = controller.health().await;
        if report.reachable {
            println!(
                "✅ {} store reachable ({} sessions for current user)",
                report.backend,
                report.sessions.unwrap_or(0)
            );
            println!("✅ Liftlog health check passed");
            return Ok(());
        }
        println!(
            "❌ {} store unreachable: {}",
            report.backend,
            report.error.unwrap_or_default()
        );
        std::process::exit(1);
    }

    // Initial load, as when the screen first opens
    match controller.refresh().await {
        Outcome::Settled => {
            let snap = controller.snapshot();
            tracing::info!(
                sessions = snap.sessions.len(),
                exercises = snap.exercise_index.len(),
                "Initial session fetch complete"
            );
        }
        other => tracing::warn!(outcome = ?other, "Initial session fetch did not settle"),
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if config.http.enabled {
        liftlog_server::http::start_http_server(controller, config, tx.subscribe()).await?;
    } else {
        tracing::warn!("HTTP API disabled; idling until shutdown");
        let mut shutdown = tx.subscribe();
        let _ = shutdown.recv().await;
    }

    Ok(())
}
