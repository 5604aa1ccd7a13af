//! Implements the `/pstat` command.

use itertools::Itertools;
use tracing::instrument;

use crate::panel::Panel;
use crate::Context;
use crate::PufferError;

/// Show the status of puffer
#[instrument(skip(ctx))]
#[poise::command(slash_command, global_cooldown = 2)]
pub async fn pstat(ctx: Context<'_>) -> Result<(), PufferError> {
    ctx.say(summary(ctx.data().servers.as_slice())).await?;
    Ok(())
}

/// How many servers are configured, on how many distinct panels.
fn summary<P: Panel>(servers: &[P]) -> String {
    let hosts = servers
        .iter()
        .map(|server| server.config().host.as_str())
        .unique()
        .count();
    format!("🐡 {} servers on {hosts} instances.", servers.len())
}
