//! Configuration for running this bot.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::num::NonZeroU64;
use std::path::Path;
use std::time::Duration;

use poise::Framework;
use serde::Deserialize;
use serde::Serialize;
use serenity::ChannelId;
use serenity::GuildId;
use serenity::UserId;

use crate::error::ConfigError;
use crate::panel::ServerConfig;
use crate::panel::ServerEntry;
use crate::serenity;

/// The path to the config file
const CONFIG_PATH: &str = "config.toml";

/// Settings read from [CONFIG_PATH] that modify bot behavior.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Token needed to use a bot account.
    discord_token: String,

    /// The game servers to report on. See [ServerEntry].
    #[serde(default)]
    servers: Vec<ServerEntry>,

    /// See [LoggingConfig]
    logging: LoggingConfig,

    /// See [PanelConfig]
    #[serde(default)]
    panel: PanelConfig,

    /// See [StatusBoardConfig]
    #[serde(default)]
    status_board: StatusBoardConfig,

    /// Useful developer specific configs.
    dev_utils: DevConfig,
}

impl Config {
    /// Tries to read [CONFIG_PATH] to extract a [Config].
    /// If a file doesn't exists, create the default config file and returns error.
    /// If a file exists but is empty, re-write the default values and return error.
    /// If a file exists but is incomplete, show error and don't change files.
    /// If a file exists and is complete, read file to create a config.
    pub fn read() -> Result<Config, ConfigError> {
        Config::read_from(Path::new(CONFIG_PATH))
    }

    /// [Config::read] for a config file at `path`.
    pub fn read_from(path: &Path) -> Result<Config, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => {
                write_file(path, &Config::default())?;
                Err(ConfigError::InvalidConfig {
                    reason: format!("Empty config file! Rewriting {} ...", path.display()),
                })
            }
            Ok(content) => Config::parse(&content),
            Err(file_error) if file_error.kind() == std::io::ErrorKind::NotFound => {
                write_file(path, &Config::default())?;
                Err(ConfigError::MissingConfig {
                    action_msg: format!("Created {}, fill it in and restart.", path.display()),
                })
            }
            Err(file_error) => Err(ConfigError::IoError(file_error)),
        }
    }

    /// Parse config text, naming the offending field on failure.
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let deserializer = toml::Deserializer::new(content);
        serde_path_to_error::deserialize(deserializer).map_err(|error| {
            ConfigError::InvalidConfig {
                reason: error.to_string(),
            }
        })
    }

    /// Basic sanity check for if a token was given.
    pub fn token(&self) -> Result<&String, ConfigError> {
        let default_token = Config::default().discord_token;
        let given_token = &self.discord_token;

        if given_token.is_empty() || given_token.contains(&default_token) {
            Err(ConfigError::InvalidConfig {
                reason: "Missing discord token".to_string(),
            })
        } else {
            Ok(given_token)
        }
    }

    /// Validate every `[[servers]]` entry. The first invalid one fails the whole load.
    pub fn servers(&self) -> Result<Vec<ServerConfig>, ConfigError> {
        self.servers
            .iter()
            .cloned()
            .map(ServerConfig::try_from)
            .collect()
    }

    /// Construct a bug notification notify list based on the config.
    /// Wrapper for [NotifyConfig::notify_list]
    pub fn notify_list<U, E>(&self, fw: &Framework<U, E>) -> HashSet<UserId> {
        self.dev_utils.notifications.notify_list(fw)
    }

    /// Getter for log_dir.
    pub fn log_dir(&self) -> &str {
        &self.logging.log_dir
    }

    /// Is debug mode enabled for console logs
    pub fn console_debug(&self) -> bool {
        self.logging.console_debug
    }

    /// Is file logging enabled.
    pub fn logs_enabled(&self) -> bool {
        self.logging.logs_enabled
    }

    /// Guild to register commands in right away.
    pub fn dev_guild(&self) -> Option<GuildId> {
        self.dev_utils.dev_guild
    }

    /// Timeout for a single panel request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.panel.request_timeout_secs.max(1))
    }

    /// The channel and refresh interval of the status board, if enabled.
    pub fn status_board(&self) -> Option<(ChannelId, Duration)> {
        let board = &self.status_board;
        board
            .channel
            .map(|channel| (channel, Duration::from_secs(board.interval_secs.max(30))))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: "put_token_here".to_string(),

            servers: vec![],

            logging: LoggingConfig {
                console_debug: false,
                logs_enabled: true,
                log_dir: "logs".to_string(),
            },

            panel: PanelConfig::default(),

            status_board: StatusBoardConfig::default(),

            dev_utils: DevConfig {
                dev_guild: None,
                notifications: NotifyConfig {
                    enabled: false,
                    add_owners: true,
                    userids: vec![],
                },
            },
        }
    }
}

/// Configs for logging.
#[derive(Debug, Serialize, Deserialize)]
struct LoggingConfig {
    /// Print debug traces to console?
    console_debug: bool,
    /// Enable writing to log file?
    logs_enabled: bool,
    /// Directory to store log files
    log_dir: String,
}

/// How to talk to the panels.
#[derive(Debug, Serialize, Deserialize)]
struct PanelConfig {
    /// Seconds before a single panel request is abandoned.
    request_timeout_secs: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
        }
    }
}

/// A message kept up to date with every server's status.
#[derive(Debug, Serialize, Deserialize)]
struct StatusBoardConfig {
    /// Channel to post in, `""` disables the board.
    #[serde(
        serialize_with = "serialize_opt",
        deserialize_with = "deserialize_opt_id"
    )]
    channel: Option<ChannelId>,
    /// Seconds between refreshes, at least 30.
    interval_secs: u64,
}

impl Default for StatusBoardConfig {
    fn default() -> Self {
        Self {
            channel: None,
            interval_secs: 300,
        }
    }
}

/// Optional configs to enable developer-specific behavior.
#[derive(Debug, Serialize, Deserialize)]
struct DevConfig {
    /// Optional guild to automatically update commands quickly.
    #[serde(
        serialize_with = "serialize_opt",
        deserialize_with = "deserialize_opt_id"
    )]
    dev_guild: Option<GuildId>,
    /// See [NotifyConfig]
    notifications: NotifyConfig,
}

/// Configs for notification behavior when encountering unexpected errors.
#[derive(Debug, Serialize, Deserialize)]
struct NotifyConfig {
    /// Enable this behavior or not. (bot sends a private message)
    enabled: bool,
    /// Whether to automatically add owners to the notify list.
    add_owners: bool,
    /// Additional users to add to the notify list.
    userids: Vec<UserId>,
}

impl NotifyConfig {
    /// Construct a bug notification notify list based on the config.
    fn notify_list<U, E>(&self, fw: &Framework<U, E>) -> HashSet<UserId> {
        if !self.enabled {
            return HashSet::new();
        }

        let owners = self
            .add_owners
            .then(|| fw.options().owners.iter().copied())
            .into_iter()
            .flatten();

        owners.chain(self.userids.iter().copied()).collect()
    }
}

/// Write the given config to `path`.
fn write_file(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidConfig {
        reason: e.to_string(),
    })?;
    std::fs::write(path, content).map_err(ConfigError::IoError)
}

/// Reads an optional discord id written as a string, `""` meaning none.
fn deserialize_opt_id<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: From<NonZeroU64>,
{
    deserializer.deserialize_str(OptIdVisitor(PhantomData))
}

/// Writes `None` as `""`, the inverse of [deserialize_opt_id].
fn serialize_opt<T, S>(val: &Option<T>, ser: S) -> Result<S::Ok, S::Error>
where
    T: serde::Serialize,
    S: serde::Serializer,
{
    match val {
        Some(v) => v.serialize(ser),
        None => ser.serialize_str(""),
    }
}

/// Visitor for [deserialize_opt_id].
struct OptIdVisitor<T>(PhantomData<T>);

impl<'de, T: From<NonZeroU64>> serde::de::Visitor<'de> for OptIdVisitor<T> {
    type Value = Option<T>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a discord id or an empty string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        match v.trim() {
            "" => Ok(None),
            id => {
                let num: NonZeroU64 = id
                    .parse()
                    .map_err(|_| E::custom(format!("'{id}' is not a discord id")))?;
                Ok(Some(T::from(num)))
            }
        }
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        u64::try_from(v)
            .ok()
            .and_then(NonZeroU64::new)
            .map(|id| Some(T::from(id)))
            .ok_or_else(|| E::custom(format!("'{v}' is not a discord id")))
    }
}
