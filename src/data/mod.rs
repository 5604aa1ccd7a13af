//! This module contains everything relating to [Data].

use std::collections::HashSet;
use std::sync::Arc;

use serenity::UserId;

use crate::panel::PanelServer;
use crate::serenity;

/// The configured game servers, shared between commands and the status board.
pub type ServerList = Arc<Vec<PanelServer>>;

/// The data kept between shards
#[derive(Debug, Default)]
pub struct Data {
    /// List of users to send bug notifications
    pub notify_list: HashSet<UserId>,
    /// Every configured game server, in config order.
    pub servers: ServerList,
}
