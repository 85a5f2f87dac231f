mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use db::{PhaseTemplateRepository, SessionStore, SqliteStore};
use events::EventBus;
use orchestrator::SessionOrchestrator;
use server::{create_router, state::AppState};
use tempo_core::{SessionStatus, SessionView};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{TempoConfig, CONFIG_FILE, DEFAULT_DB_NAME, TEMPO_DIR};

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Timed multi-phase sessions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Overrides the configured port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Config file, defaults to .tempo/config.toml in the current directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the database
    Init,
    /// Run the HTTP server
    Serve,
    /// Print sessions with their live remaining time
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = std::env::current_dir()?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| TempoConfig::default_path(&root));

    match cli.command {
        Some(Commands::Init) => init(&root, &config_path).await,
        Some(Commands::Status) => status(&root, &config_path).await,
        Some(Commands::Serve) | None => serve(&root, &config_path, cli.port).await,
    }
}

async fn connect(database_path: &Path) -> Result<db::SqlitePool> {
    let database_url = format!("sqlite:{}", database_path.display());
    let pool = db::create_pool(&database_url)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

async fn init(root: &Path, config_path: &Path) -> Result<()> {
    if tokio::fs::try_exists(config_path).await? {
        println!("Already initialized: {}", config_path.display());
        return Ok(());
    }

    println!("Initializing Tempo in {}", root.display());

    let config = TempoConfig::default();
    config.write(config_path).await?;

    let db_path = config.database_path(root);
    if let Some(dir) = db_path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    connect(&db_path).await?;

    println!();
    println!("Created:");
    println!("  {}/", TEMPO_DIR);
    println!("  ├── {}", CONFIG_FILE);
    println!("  └── {}", DEFAULT_DB_NAME);
    println!();
    println!("Next steps:");
    println!("  1. Edit the game formats in {}", config_path.display());
    println!("  2. Run 'tempo serve'");

    Ok(())
}

/// Writes every configured game format into `phase_templates`.
async fn seed_templates(templates: &PhaseTemplateRepository, config: &TempoConfig) -> Result<()> {
    for format in &config.game_formats {
        templates
            .replace_format(format.id, &format.templates())
            .await
            .with_context(|| format!("Failed to seed game format {}", format.id))?;
        tracing::info!(
            game_format_id = format.id,
            phases = format.phases.len(),
            "Game format loaded"
        );
    }
    Ok(())
}

async fn serve(root: &Path, config_path: &Path, port: Option<u16>) -> Result<()> {
    let config = TempoConfig::load_or_default(config_path).await?;
    init_tracing();

    let db_path = config.database_path(root);
    if let Some(dir) = db_path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tracing::info!(path = %db_path.display(), "Database");
    let pool = connect(&db_path).await?;

    let templates = PhaseTemplateRepository::new(pool.clone());
    seed_templates(&templates, &config).await?;

    let orchestrator = SessionOrchestrator::new(
        Arc::new(SqliteStore::new(pool)),
        Arc::new(templates),
        EventBus::new(),
    );
    orchestrator
        .recover()
        .await
        .context("Failed to recover session deadlines")?;

    let app = create_router(AppState::new(orchestrator));

    let port = port.unwrap_or(config.server.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    println!();
    println!("Tempo");
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://localhost:{}", port);
    println!("  Swagger UI:  http://localhost:{}/swagger-ui", port);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}

async fn status(root: &Path, config_path: &Path) -> Result<()> {
    let config = TempoConfig::load_or_default(config_path).await?;
    let db_path = config.database_path(root);

    if !tokio::fs::try_exists(&db_path).await? {
        println!("No database at {}", db_path.display());
        println!("Run 'tempo init' to initialize.");
        return Ok(());
    }

    let store = SqliteStore::new(connect(&db_path).await?);
    let sessions = store.list_sessions(None).await?;
    let now = Utc::now();

    println!();
    if sessions.is_empty() {
        println!("No sessions yet.");
    } else {
        println!("Sessions ({}):", sessions.len());
        for session in &sessions {
            let phases = store.find_phases(session.id).await?;
            let view = SessionView::new(session, &phases, now);
            let status_icon = match session.status {
                SessionStatus::Pending => "○",
                SessionStatus::Active => "▶",
                SessionStatus::Paused => "‖",
                SessionStatus::Completed => "●",
            };
            let phase = view
                .active_phase
                .as_ref()
                .map(|p| format!(" phase {} {}s left", p.phase.position, p.remaining_seconds))
                .unwrap_or_default();
            println!(
                "  {} [{}] {} {}s left{}",
                status_icon,
                session.status.as_str(),
                session.join_code,
                view.remaining_seconds,
                phase
            );
        }
    }
    println!();

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tempo=info,server=info,orchestrator=info,tower_http=info".into()
            }),
        )
        .init();
}
