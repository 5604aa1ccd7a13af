//! Bot commands.

mod pstat;
mod status;

use crate::{Data, PufferError};

/// Convenient type alias for [poise::Command].
pub type Command = poise::Command<Data, PufferError>;

/// Lists all the implemented commands
pub fn list() -> Vec<Command> {
    vec![status::status(), pstat::pstat()]
}
