use serde::{Deserialize, Serialize};

use crate::config::BotConfig;
use crate::item::RawPost;

/// Normalized privilege ranking, ordered from least to most trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Ignored,
    Tl0,
    Tl1,
    Tl2,
    Tl3,
    Tl4,
    Staff,
    Moderator,
    Admin,
    Owner,
}

impl TrustLevel {
    /// Maps the forum's numeric trust indicator. Values above 4 saturate at `Tl4`.
    pub fn from_numeric(level: u8) -> Self {
        match level {
            0 => TrustLevel::Tl0,
            1 => TrustLevel::Tl1,
            2 => TrustLevel::Tl2,
            3 => TrustLevel::Tl3,
            _ => TrustLevel::Tl4,
        }
    }

    pub fn as_numeric(self) -> i8 {
        match self {
            TrustLevel::Ignored => -1,
            TrustLevel::Tl0 => 0,
            TrustLevel::Tl1 => 1,
            TrustLevel::Tl2 => 2,
            TrustLevel::Tl3 => 3,
            TrustLevel::Tl4 => 4,
            TrustLevel::Staff => 6,
            TrustLevel::Moderator => 7,
            TrustLevel::Admin => 8,
            TrustLevel::Owner => 9,
        }
    }
}

/// The locally configured part of trust resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustPolicy {
    pub owner: String,
    pub ignore_users: Vec<String>,
}

impl TrustPolicy {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            owner: config.owner.clone(),
            ignore_users: config.ignore_users.clone(),
        }
    }

    fn is_owner(&self, username: &str) -> bool {
        !self.owner.is_empty() && self.owner.eq_ignore_ascii_case(username)
    }

    fn is_ignored(&self, username: &str) -> bool {
        self.ignore_users
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(username))
    }
}

/// Resolves the trust level of a post's author. First matching rule wins:
/// owner, admin, moderator, staff, ignore list, then the numeric indicator.
pub fn classify_trust(post: &RawPost, policy: &TrustPolicy) -> TrustLevel {
    if policy.is_owner(&post.username) {
        TrustLevel::Owner
    } else if post.admin {
        TrustLevel::Admin
    } else if post.moderator {
        TrustLevel::Moderator
    } else if post.staff {
        TrustLevel::Staff
    } else if policy.is_ignored(&post.username) {
        TrustLevel::Ignored
    } else {
        TrustLevel::from_numeric(post.trust_level)
    }
}
