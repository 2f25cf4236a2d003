use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use timeboard_store::{Database, TodoRepo};
use timeboard_telemetry::{LogQuery, SqliteLogSink, TelemetryConfig};

/// Three-column todo board backed by SQLite.
#[derive(Parser, Debug)]
#[command(name = "timeboard", about = "Todo board server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve(ServeArgs),
    /// Create the database tables and exit.
    Migrate {
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Print persisted warn+ log records, newest first.
    Logs {
        /// Only records at this level (WARN or ERROR).
        #[arg(long)]
        level: Option<String>,
        /// Only records for this intent (create, delete, update).
        #[arg(long)]
        intent: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long)]
        log_db_path: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value_t = 8787)]
    port: u16,

    /// Path to the SQLite database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Default log level; RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Human-readable log lines instead of JSON.
    #[arg(long)]
    pretty: bool,

    /// Do not persist warn+ logs to SQLite.
    #[arg(long)]
    no_log_db: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8787,
            db_path: None,
            log_level: tracing::Level::INFO,
            pretty: false,
            no_log_db: false,
        }
    }
}

fn default_db_path() -> PathBuf {
    timeboard_telemetry::data_dir().join("timeboard.db")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(args).await,
        Command::Migrate { db_path } => migrate(db_path),
        Command::Logs {
            level,
            intent,
            limit,
            log_db_path,
        } => print_logs(level, intent, limit, log_db_path),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let telemetry = timeboard_telemetry::init_telemetry(TelemetryConfig {
        log_level: args.log_level,
        json: !args.pretty,
        log_to_sqlite: !args.no_log_db,
        ..Default::default()
    });

    let db_path = args.db_path.unwrap_or_else(default_db_path);
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let config = timeboard_server::ServerConfig {
        host: args.host,
        port: args.port,
    };
    let handle = timeboard_server::start(config, db)
        .await
        .context("Failed to start server")?;

    tracing::info!(addr = %handle.addr, "timeboard ready");
    if let Some(logs) = telemetry.logs() {
        match logs.count() {
            Ok(persisted) => tracing::info!(persisted, "log database ready"),
            Err(e) => tracing::warn!(error = %e, "log database unreadable"),
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    Ok(())
}

fn migrate(db_path: Option<PathBuf>) -> Result<()> {
    let db_path = db_path.unwrap_or_else(default_db_path);
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let location = db.path().display().to_string();
    let count = TodoRepo::new(db).count()?;
    println!("Database tables created successfully at {location} ({count} todos)");
    Ok(())
}

fn print_logs(
    level: Option<String>,
    intent: Option<String>,
    limit: u32,
    log_db_path: Option<PathBuf>,
) -> Result<()> {
    let path = log_db_path.unwrap_or_else(timeboard_telemetry::default_log_db_path);
    let sink = SqliteLogSink::new(&path)
        .with_context(|| format!("Failed to open log database at {}", path.display()))?;
    let records = sink.query(&LogQuery {
        level,
        intent,
        limit: Some(limit),
        ..Default::default()
    })?;

    for record in records {
        println!(
            "{} {:5} {} {}{}",
            record.timestamp,
            record.level,
            record.target,
            record.message,
            record
                .intent
                .map(|i| format!(" intent={i}"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}
