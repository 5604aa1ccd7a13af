//! A discord bot reporting the status of game servers hosted on a panel.
//!
//! Each configured server has an embed template whose `${...}` placeholders are
//! filled from the panel, see [template].

#![warn(clippy::missing_docs_in_private_items)]

mod commands;
mod data;
mod error;
mod log;
mod panel;
mod setup;
mod status;
mod template;

use data::Data;
use error::PufferError;
use poise::serenity_prelude as serenity;
use setup::Config;

/// Convenient type alias, the only [poise::Context] used by commands.
type Context<'a> = poise::Context<'a, Data, PufferError>;

#[tokio::main]
async fn main() -> Result<(), PufferError> {
    // Read config before tracing, logging is configured there.
    let config = Config::read()?;

    // Keep the guard alive so file logs get flushed.
    let _guard = log::install_tracing(&config);

    let mut client = setup::client(config).await?;
    if let Err(e) = client.start().await {
        tracing::error!("Client stopped: {e}");
        return Err(e.into());
    }

    Ok(())
}
