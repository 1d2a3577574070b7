use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use concierge::core::response::chunk_for_message;
use concierge::core::Config;
use concierge::database::Database;
use concierge::features::conversation::{ConversationTracker, OpenAiConversationalist};
use concierge::features::extraction::OpenAiSlotExtractor;
use concierge::features::intent::OpenAiIntentClassifier;
use concierge::features::notify::ConsoleNotifier;
use concierge::features::reminders::{
    LifecycleConfig, ReminderLifecycle, ReminderScheduler, ReminderStore, TimeIndex,
};
use concierge::message_handler::{InboundMessage, MessageHandler};
use concierge::routing::{HandlerContext, Router};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    openai::set_key(config.openai_api_key.clone());
    info!("🤖 Concierge starting (model: {})", config.openai_model);

    let database = Database::open(&config.database_path).await?;
    let store = ReminderStore::new(database);
    let index = TimeIndex::new();

    let lifecycle = Arc::new(ReminderLifecycle::new(
        store,
        index,
        Arc::new(ConsoleNotifier),
        LifecycleConfig::from_app_config(&config),
    ));
    // The index is derived state; restore it from the store before sweeping.
    lifecycle.rebuild_index().await?;

    let scheduler = ReminderScheduler::new(Arc::clone(&lifecycle), config.sweep_interval).start();

    let ctx = Arc::new(HandlerContext::new(
        Arc::clone(&lifecycle),
        Arc::new(OpenAiSlotExtractor::new(config.openai_model.clone())),
        Arc::new(OpenAiConversationalist::new(config.openai_model.clone())),
        ConversationTracker::new(config.context_turns),
        config.timezone,
    ));
    let handler = MessageHandler::new(
        Arc::new(OpenAiIntentClassifier::new(config.openai_model.clone())),
        Router::standard(),
        ctx,
        config.confidence_threshold,
    );

    let sender = std::env::var("CHAT_SENDER_ID").unwrap_or_else(|_| "local-user".to_string());
    println!("Concierge is ready. Type a message (ctrl-c to quit).");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_message_id: u64 = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                next_message_id += 1;
                let message = InboundMessage {
                    sender: sender.clone(),
                    text: text.to_string(),
                    received_at: Utc::now(),
                    message_id: Some(format!("console-{next_message_id}")),
                };
                match handler.handle_message(&message).await {
                    Ok(reply) => {
                        for chunk in chunk_for_message(&reply) {
                            println!("{chunk}");
                        }
                    }
                    Err(e) => error!("❌ Failed to handle message: {e:#}"),
                }
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}
