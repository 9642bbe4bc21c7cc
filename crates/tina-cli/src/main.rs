use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use tina_core::{EventEmitter, EventMessage};
use tina_db::{DbConfig, TinaDb};
use tina_store::{Store, StoreConfig, StoreContext};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "tina-cli", version, about = "Local mirror of a messaging account")]
struct Args {
    /// Database file. Defaults to the platform data directory.
    #[arg(long, env = "TINA_DB")]
    db: Option<PathBuf>,

    /// Session whose mirror is read or written.
    #[arg(short, long, default_value = "default", env = "TINA_SESSION")]
    session: String,

    /// Let explicit nulls in updates clear stored fields.
    #[arg(long, env = "TINA_KEEP_NULLS")]
    keep_nulls: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply an event log (one JSON event per line) to the mirror.
    Replay { file: PathBuf },
    /// Print the mirrored state of the session as JSON.
    Dump,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .from_env_lossy()
                .add_directive("tina_cli=info".parse()?)
                .add_directive("tina_store=info".parse()?)
                .add_directive("tina_db=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = DbConfig {
        path: args.db.clone(),
        ..DbConfig::default()
    };
    let db = TinaDb::connect(&config)
        .await
        .wrap_err("Failed to open database")?;

    match args.command {
        Command::Replay { ref file } => {
            let store_config = StoreConfig {
                remove_nullable: !args.keep_nulls,
            };
            let context = StoreContext::new(db, EventEmitter::new(), store_config);
            replay(context, &args.session, file).await
        }
        Command::Dump => dump(&db, &args.session).await,
    }
}

async fn replay(context: StoreContext, session_id: &str, file: &Path) -> Result<()> {
    let mut store = Store::new(context.clone(), session_id)
        .await
        .wrap_err("Failed to start store")?;

    let input = tokio::fs::File::open(file)
        .await
        .wrap_err_with(|| format!("Failed to open {}", file.display()))?;
    let mut lines = BufReader::new(input).lines();

    let mut emitted = 0usize;
    let mut skipped = 0usize;
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match EventMessage::from_line(&line) {
            Ok(message) => {
                tracing::debug!(id = %message.id, event = %message.event.kind(), "Replaying event");
                context.emitter.emit(message.event);
                emitted += 1;
            }
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Skipping undecodable event");
                skipped += 1;
            }
        }
    }

    store.close().await;

    println!("✅ Replayed {} events into session {} ({} skipped)", emitted, session_id, skipped);
    Ok(())
}

async fn dump(db: &TinaDb, session_id: &str) -> Result<()> {
    let session = db
        .get_session(session_id)
        .await
        .wrap_err_with(|| format!("Unknown session {}", session_id))?;

    let chats = db.list_chats(session_id).await?;
    let contacts = db.list_contacts(session_id).await?;
    let groups = db.list_groups(session_id).await?;
    let blocklist = db.list_blocklist(session_id).await?;

    let snapshot = serde_json::json!({
        "session": session,
        "chats": chats,
        "contacts": contacts,
        "groups": groups,
        "blocklist": blocklist,
    });

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
