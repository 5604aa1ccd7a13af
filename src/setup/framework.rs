//! Setup for [poise::Framework]

use std::sync::Arc;

use crate::commands;
use crate::data::ServerList;
use crate::serenity;
use crate::status;
use crate::Config;
use crate::Data;
use crate::PufferError;

/// Convenient type alias, only this [poise::Framework] type is used.
type Framework = poise::Framework<Data, PufferError>;

/// Construct a [poise::Framework]
pub(super) fn framework(config: Config, servers: ServerList) -> Framework {
    poise::Framework::builder()
        .options(framework_options())
        .setup(|ctx, rdy, fw| framework_setup(ctx, rdy, fw, config, servers))
        .build()
}

/// Configure options for the [Framework]
fn framework_options() -> poise::FrameworkOptions<Data, PufferError> {
    poise::FrameworkOptions {
        commands: commands::list(),
        on_error: |e| crate::log::handle_framework_error(e),
        pre_command: |ctx| {
            Box::pin(async move {
                let cmd_name = &ctx.command().name;
                let user = &ctx.author().name;
                tracing::info!("Started '{cmd_name}' command from {user}.")
            })
        },
        post_command: |ctx| {
            Box::pin(async move {
                let cmd_name = &ctx.command().name;
                let user = &ctx.author().name;
                tracing::info!("Finished '{cmd_name}' command from {user}.")
            })
        },
        ..Default::default()
    }
}

/// Construct future that runs on startup
fn framework_setup<'a>(
    ctx: &'a serenity::Context,
    rdy: &'a serenity::Ready,
    fw: &'a Framework,
    config: Config,
    servers: ServerList,
) -> poise::BoxFuture<'a, Result<Data, PufferError>> {
    Box::pin(async move {
        // Register the commands
        let app_commands = poise::builtins::create_application_commands(&fw.options().commands);

        serenity::Command::set_global_commands(&ctx, app_commands.clone()).await?;
        if let Some(dev_guild) = config.dev_guild() {
            // This is faster than global registers, useful for development.
            tracing::info!("Registering commands on dev guild.");
            dev_guild.set_commands(ctx, app_commands).await?;
        }

        if let Some((channel, interval)) = config.status_board() {
            tracing::info!("Starting status board in {channel}, refreshing every {interval:?}.");
            tokio::spawn(status::board::run(
                Arc::clone(&ctx.http),
                Arc::clone(&servers),
                channel,
                interval,
            ));
        }

        let bot_name = &rdy.user.name;
        tracing::info!("{bot_name} is ready!");

        Ok(Data {
            notify_list: config.notify_list(fw),
            servers,
        })
    })
}
