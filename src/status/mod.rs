//! Rendering the status of every configured server at once.

pub mod board;

use futures::future::join_all;
use serde_json::Value;
use tracing::instrument;

use crate::error::RenderError;
use crate::error::TemplateError;
use crate::panel::Panel;
use crate::serenity;
use crate::template;

/// Discord allows at most this many embeds per message.
pub const EMBEDS_PER_MESSAGE: usize = 10;

/// Render every server concurrently.
///
/// Results keep the order of `panels`. A server that fails is logged and left out,
/// it never stops the others.
#[instrument(skip_all, fields(servers = panels.len()))]
pub async fn render_all<P: Panel>(panels: &[P]) -> Vec<Value> {
    let renders = panels.iter().map(|panel| async move {
        let result = template::render(panel).await;
        (panel, result)
    });

    join_all(renders)
        .await
        .into_iter()
        .filter_map(|(panel, result)| match result {
            Ok(document) => Some(document),
            Err(error) => {
                let config = panel.config();
                tracing::error!(
                    server = %config.id,
                    url = %config.server_url,
                    "Error rendering status: {error}"
                );
                None
            }
        })
        .collect()
}

/// Turn a rendered document into a Discord embed.
pub fn to_embed(document: Value) -> Result<serenity::CreateEmbed, RenderError> {
    let embed: serenity::Embed =
        serde_json::from_value(document).map_err(TemplateError::Embed)?;
    Ok(serenity::CreateEmbed::from(embed))
}

/// Render every server and convert the results to embeds, skipping what can't be shown.
pub async fn embeds<P: Panel>(panels: &[P]) -> Vec<serenity::CreateEmbed> {
    render_all(panels)
        .await
        .into_iter()
        .filter_map(|document| match to_embed(document) {
            Ok(embed) => Some(embed),
            Err(error) => {
                tracing::error!("Error converting status to an embed: {error}");
                None
            }
        })
        .collect()
}
