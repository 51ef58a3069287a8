use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimal profile of a directory user.
///
/// `created_at` is only known for users whose full profile was fetched; the
/// followers endpoint returns stubs without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub login: String,
    pub id: u64,
    pub profile_url: String,
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new(login: impl Into<String>, id: u64) -> Self {
        Self {
            login: login.into(),
            id,
            profile_url: String::new(),
            avatar_url: String::new(),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// A user together with its reachable-follower count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedUser {
    #[serde(flatten)]
    pub user: UserRecord,
    pub depth: u32,
    pub followers: Vec<String>,
    pub followers_count: usize,
}

impl RankedUser {
    pub fn login(&self) -> &str {
        &self.user.login
    }
}
