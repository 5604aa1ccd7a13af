//! Error types used throughout the bot.
//!
//! [PufferError] is the error type handed to [poise]. Errors scoped to a single
//! game server's render are [RenderError]s and never reach users directly.

use std::time::Duration;

use thiserror::Error;

use crate::serenity;

/// Top level error type of the bot.
#[derive(Debug, Error)]
pub enum PufferError {
    /// Errors caused by the user, these are shown to them.
    #[error(transparent)]
    UserError(#[from] UserError),

    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    #[error(transparent)]
    SerenityError(#[from] serenity::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("A command check failed: {}", .reason.as_deref().unwrap_or("no reason given"))]
    CheckFailed { reason: Option<String> },

    #[error("Command panicked: {}", .payload.as_deref().unwrap_or("<no payload>"))]
    Panic { payload: Option<String> },

    #[error("Command structure mismatch: {description}")]
    CommandStructureMismatch { description: String },
}

/// Errors that are the user's fault, or that the user should know about.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("This command needs a subcommand: {subcmds}")]
    MissingSubcommand { subcmds: String },

    #[error("Could not understand `{}`.", .input.as_deref().unwrap_or_default())]
    BadArgs { input: Option<String> },

    #[error("Slow down! Try again in {} seconds.", .remaining_cooldown.as_secs())]
    OnCooldown { remaining_cooldown: Duration },

    #[error("I'm missing these permissions: {missing_permissions:?}")]
    MissingBotPermissions {
        missing_permissions: serenity::Permissions,
    },

    #[error("You are missing these permissions: {missing_permissions:?}")]
    MissingUserPermissions {
        missing_permissions: Option<serenity::Permissions>,
    },

    #[error("Only bot owners can use this command.")]
    NotOwner,

    #[error("This command only works in a server.")]
    GuildOnly,

    #[error("No game servers are configured.")]
    NoServers,

    #[error("None of the game servers could be reached.")]
    NothingRendered,
}

/// Errors from reading and validating `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file missing. {action_msg}")]
    MissingConfig { action_msg: String },

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Config io error: {0}")]
    IoError(std::io::Error),

    #[error("Server url '{url}' is invalid.")]
    InvalidServerUrl { url: String },

    #[error("Regex '{name}' for '{url}' is invalid: {source}")]
    InvalidRegex {
        name: String,
        url: String,
        source: regex::Error,
    },

    #[error("Server '{id}' uses regex placeholders but has no command configured.")]
    MissingCommand { id: String },

    #[error("Could not read embed template '{path}': {source}")]
    TemplateRead {
        path: String,
        source: std::io::Error,
    },
}

/// Failures talking to the panel.
#[derive(Debug, Error)]
pub enum PanelError {
    /// The token endpoint refused the credentials.
    #[error("Token Error: {reason}")]
    Auth { reason: String },

    /// A non-success response with a structured error body.
    #[error("{status}: {code}: {msg}{}", .scope.as_deref().map(|s| format!(" ({s})")).unwrap_or_default())]
    Http {
        status: u16,
        code: String,
        msg: String,
        scope: Option<String>,
    },

    /// A non-success response whose body wasn't a panel error.
    #[error("{status} {reason}: {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    /// Connection failures, timeouts and undecodable bodies.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// The substituted template could not be turned into an embed.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template is not valid JSON after substitution: {0}")]
    Parse(serde_json::Error),

    #[error("Rendered document is not a valid embed: {0}")]
    Embed(serde_json::Error),

    #[error("Inline template could not be serialized: {0}")]
    Serialize(serde_json::Error),
}

/// Everything that can fail while rendering one server's embed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}
