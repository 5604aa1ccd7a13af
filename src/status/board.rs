//! The status board: a message refreshed on a timer with every server's status.

use std::sync::Arc;
use std::time::Duration;

use serenity::ChannelId;
use serenity::CreateEmbed;
use serenity::CreateMessage;
use serenity::EditMessage;
use serenity::Http;
use serenity::MessageId;
use tokio::time::MissedTickBehavior;

use super::EMBEDS_PER_MESSAGE;
use crate::data::ServerList;
use crate::serenity;

/// Refresh the board forever. Errors are logged and the next tick tries again.
pub async fn run(http: Arc<Http>, servers: ServerList, channel: ChannelId, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut message: Option<MessageId> = None;
    loop {
        ticker.tick().await;

        let mut embeds = super::embeds(servers.as_slice()).await;
        if embeds.is_empty() {
            tracing::warn!("No server status rendered, leaving the status board unchanged.");
            continue;
        }
        if embeds.len() > EMBEDS_PER_MESSAGE {
            tracing::warn!(
                "Status board only shows the first {EMBEDS_PER_MESSAGE} of {} servers.",
                embeds.len()
            );
            embeds.truncate(EMBEDS_PER_MESSAGE);
        }

        message = publish(&http, channel, message, embeds).await;
    }
}

/// Edit the previous board message, or post a new one if there is none or the edit fails.
async fn publish(
    http: &Http,
    channel: ChannelId,
    previous: Option<MessageId>,
    embeds: Vec<CreateEmbed>,
) -> Option<MessageId> {
    if let Some(id) = previous {
        let edit = EditMessage::new().embeds(embeds.clone());
        match channel.edit_message(http, id, edit).await {
            Ok(message) => return Some(message.id),
            Err(e) => tracing::warn!("Failed to edit status board, posting a new one. {e}"),
        }
    }

    match channel
        .send_message(http, CreateMessage::new().embeds(embeds))
        .await
    {
        Ok(message) => {
            tracing::debug!("Posted status board message {}.", message.id);
            Some(message.id)
        }
        Err(e) => {
            tracing::error!("Failed to post status board. {e}");
            None
        }
    }
}
