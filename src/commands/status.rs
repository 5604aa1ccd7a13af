//! Implements the `/status` command.
//!
//! The bot renders every configured server's embed template and replies with the
//! embeds. Servers that fail to render are only logged.

use poise::CreateReply;
use tracing::instrument;

use crate::error::UserError;
use crate::serenity;
use crate::status;
use crate::status::EMBEDS_PER_MESSAGE;
use crate::Context;
use crate::PufferError;

/// Shows the status of all servers
#[instrument(skip(ctx))]
#[poise::command(slash_command, global_cooldown = 5)]
pub async fn status(ctx: Context<'_>) -> Result<(), PufferError> {
    let servers = &ctx.data().servers;
    if servers.is_empty() {
        return Err(UserError::NoServers.into());
    }

    // Panels can be slow, don't let the interaction expire.
    // The deferred response is public, so is a notice that nothing rendered.
    ctx.defer().await?;

    let embeds = status::embeds(servers.as_slice()).await;
    tracing::info!("Rendered {} of {} servers.", embeds.len(), servers.len());

    for reply in replies(embeds)? {
        ctx.send(reply).await?;
    }

    Ok(())
}

/// Split embeds into as many replies as Discord needs.
fn replies(embeds: Vec<serenity::CreateEmbed>) -> Result<Vec<CreateReply>, UserError> {
    if embeds.is_empty() {
        return Err(UserError::NothingRendered);
    }

    let replies = embeds
        .chunks(EMBEDS_PER_MESSAGE)
        .map(|chunk| {
            chunk
                .iter()
                .cloned()
                .fold(CreateReply::default(), |reply, embed| reply.embed(embed))
        })
        .collect();
    Ok(replies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embeds(n: usize) -> Vec<serenity::CreateEmbed> {
        (0..n)
            .map(|i| serenity::CreateEmbed::new().title(format!("Server {i}")))
            .collect()
    }

    #[test]
    fn embeds_are_chunked() {
        let replies = replies(embeds(23)).unwrap();
        let sizes: Vec<_> = replies.iter().map(|r| r.embeds.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    #[test]
    fn nothing_rendered() {
        assert!(matches!(replies(embeds(0)), Err(UserError::NothingRendered)));
    }
}
