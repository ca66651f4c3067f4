mod config;
mod db;
mod error;
mod handlers;
mod keyboards;
mod metadata;
mod rebuild;
mod session;

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;

use crate::config::Config;
use crate::db::Database;
use crate::error::BotError;
use crate::handlers::Command;
use crate::session::SessionStore;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    log::info!("Starting video archive bot...");

    if let Err(e) = run().await {
        log::error!("Bot stopped: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BotError> {
    let config = Config::from_env()?;

    let db = Database::connect(&config.database_url, config.db_max_connections).await?;
    db.bootstrap().await?;

    let sessions = SessionStore::new(config.session_ttl);
    session::spawn_purge_task(sessions.clone(), SESSION_PURGE_INTERVAL);

    let bot = Bot::new(&config.bot_token);
    bot.set_my_commands(Command::bot_commands()).await?;

    let webhook_url = config.webhook_url.clone();
    let listen_addr = config.listen_addr();
    log::info!(
        "Archiving videos from channel {} for {} admins",
        config.channel_id,
        config.admin_ids.len()
    );

    let mut dispatcher = Dispatcher::builder(bot.clone(), handlers::schema())
        .dependencies(dptree::deps![db, sessions, Arc::new(config)])
        .enable_ctrlc_handler()
        .build();

    match webhook_url {
        Some(url) => {
            log::info!("Receiving updates through webhook {url} on {listen_addr}");
            let listener = webhooks::axum(
                bot,
                webhooks::Options::new(listen_addr, url).drop_pending_updates(),
            )
            .await?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            log::info!("Receiving updates through long polling");
            dispatcher.dispatch().await;
        }
    }
    Ok(())
}
