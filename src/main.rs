use std::path::Path;
use std::sync::Arc;

use lead_funnel::bot::Bot;
use lead_funnel::channels::{Channel, CliChannel, TelegramChannel};
use lead_funnel::config::{BotConfig, ChannelKind};
use lead_funnel::reminders::ReminderScheduler;
use lead_funnel::router::Router;
use lead_funnel::store::{LeadStore, LibSqlBackend, legacy};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export FUNNEL_OPERATOR_ID=<your chat id>");
        eprintln!("  export TELEGRAM_BOT_TOKEN=<token>   (or FUNNEL_CHANNEL=cli)");
        std::process::exit(1);
    });

    // Held for the life of the process so buffered file logs get flushed.
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📈 Lead Funnel v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Channel: {:?}", config.channel);
    eprintln!("   Database: {}", config.db_path.display());

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn LeadStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    if let Some(ref path) = config.legacy_leads_json {
        let imported = legacy::import_leads_json(store.as_ref(), path).await?;
        if imported > 0 {
            eprintln!("   Imported {} legacy leads from {}", imported, path.display());
        }
    }

    // ── Channel ──────────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match config.channel {
        ChannelKind::Telegram => {
            let Some(token) = config.telegram_token.clone() else {
                eprintln!("Error: TELEGRAM_BOT_TOKEN not set");
                std::process::exit(1);
            };
            let telegram = TelegramChannel::new(token);
            if let Err(e) = telegram.health_check().await {
                tracing::warn!("Telegram health check failed: {e}");
            }
            Arc::new(telegram)
        }
        ChannelKind::Cli => {
            eprintln!("   Type /start, a keyword, or :<option> to press a button. Ctrl+C to exit.\n");
            Arc::new(CliChannel::new())
        }
    };

    // ── Reminders ────────────────────────────────────────────────────────
    let scheduler = Arc::new(ReminderScheduler::new(
        Arc::clone(&store),
        Arc::clone(&channel),
        config.reminders,
        config.links.clone(),
    ));
    let recovered = scheduler.recover().await?;
    if recovered > 0 {
        eprintln!("   Recovered {} pending reminders", recovered);
    }

    let router = Arc::new(Router::new(
        store,
        scheduler,
        Arc::clone(&channel),
        config.links.clone(),
        config.operator_id.clone(),
    ));

    Bot::new(channel, router).run().await?;
    Ok(())
}

/// Stderr logging, plus a daily rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lead-funnel.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}
