//! Defines and implements custom bot functionality.

mod config;
mod framework;

use std::sync::Arc;

use crate::panel::PanelServer;
use crate::serenity;
use crate::PufferError;

pub use config::Config;

/// Constructs a [serenity::Client] with every configured game server loaded.
pub(super) async fn client(config: Config) -> Result<serenity::Client, PufferError> {
    // Get discord token from config file
    let token = config.token()?.clone();

    // Fail on startup rather than on the first render.
    let http = reqwest::Client::new();
    let timeout = config.request_timeout();
    let servers: Vec<PanelServer> = config
        .servers()?
        .into_iter()
        .map(|server| PanelServer::new(server, http.clone(), timeout))
        .collect();
    tracing::info!("Loaded {} game servers.", servers.len());

    // Intents we wish to use
    // See https://discord.com/developers/docs/topics/gateway#gateway-intents
    let intents = serenity::GatewayIntents::non_privileged();

    let client = serenity::ClientBuilder::new(token, intents)
        .framework(framework::framework(config, Arc::new(servers)))
        .await?;

    Ok(client)
}
