use std::fmt;

use serde::{Deserialize, Serialize};

/// Read-only bot settings shared by the session and normalization layers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Login name; also the name the bot answers to in mention commands.
    pub username: String,
    pub password: String,
    /// Forum user whose posts are always classified as the owner.
    pub owner: String,
    pub ignore_users: Vec<String>,
    /// Origin every `/`-prefixed locator is resolved against.
    pub base_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            owner: String::new(),
            ignore_users: Vec::new(),
            base_url: "https://forum.example.com".to_string(),
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("owner", &self.owner)
            .field("ignore_users", &self.ignore_users)
            .field("base_url", &self.base_url)
            .finish()
    }
}
