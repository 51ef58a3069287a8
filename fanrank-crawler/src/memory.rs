use crate::error::{Result, SourceError};
use crate::model::UserRecord;
use crate::source::UserSource;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A directory entry: the user's profile plus who follows them.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureUser {
    #[serde(flatten)]
    pub user: UserRecord,
    #[serde(default)]
    pub followers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    users: Vec<FixtureUser>,
}

/// Logins requested so far, in call order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchLog {
    pub profiles: Vec<String>,
    pub followers: Vec<String>,
}

/// In-memory directory used for offline runs and tests.
///
/// Followers are served as stubs without `created_at`, the same shape the
/// GitHub followers endpoint returns.
#[derive(Debug, Default)]
pub struct StaticSource {
    users: HashMap<String, FixtureUser>,
    profile_failures: HashMap<String, SourceError>,
    follower_failures: HashMap<String, SourceError>,
    profile_delays: HashMap<String, Duration>,
    follower_delays: HashMap<String, Duration>,
    log: Mutex<FetchLog>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture of the form `{"users": [{"login": .., "id": .., "followers": [..]}]}`.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        let mut source = Self::new();
        for entry in fixture.users {
            source.users.insert(entry.user.login.clone(), entry);
        }
        Ok(source)
    }

    /// Build a directory from `(login, followers)` pairs, synthesizing ids,
    /// URLs and creation dates in declaration order.
    pub fn from_graph(graph: &[(&str, &[&str])]) -> Self {
        let epoch = DateTime::<Utc>::from_timestamp(1_262_304_000, 0).unwrap_or_default();
        let mut source = Self::new();
        for (idx, (login, followers)) in graph.iter().enumerate() {
            let id = idx as u64 + 1;
            let user = UserRecord {
                login: login.to_string(),
                id,
                profile_url: format!("https://github.com/{}", login),
                avatar_url: format!("https://avatars.githubusercontent.com/u/{}", id),
                created_at: Some(epoch + ChronoDuration::days(idx as i64)),
            };
            source = source.with_user(user, followers);
        }
        source
    }

    pub fn with_user(mut self, user: UserRecord, followers: &[&str]) -> Self {
        let entry = FixtureUser {
            followers: followers.iter().map(|f| f.to_string()).collect(),
            user,
        };
        self.users.insert(entry.user.login.clone(), entry);
        self
    }

    /// Make every profile lookup of `login` fail with `error`.
    pub fn fail_profile(mut self, login: &str, error: SourceError) -> Self {
        self.profile_failures.insert(login.to_string(), error);
        self
    }

    /// Make every followers lookup of `login` fail with `error`.
    pub fn fail_followers(mut self, login: &str, error: SourceError) -> Self {
        self.follower_failures.insert(login.to_string(), error);
        self
    }

    /// Delay followers lookups of `login`.
    pub fn delay_profile(mut self, login: &str, delay: Duration) -> Self {
        self.profile_delays.insert(login.to_string(), delay);
        self
    }

    pub fn delay_followers(mut self, login: &str, delay: Duration) -> Self {
        self.follower_delays.insert(login.to_string(), delay);
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn fetch_log(&self) -> FetchLog {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn stub(&self, login: &str) -> UserRecord {
        match self.users.get(login) {
            Some(entry) => UserRecord {
                created_at: None,
                ..entry.user.clone()
            },
            None => UserRecord::new(login, 0),
        }
    }
}

#[async_trait]
impl UserSource for StaticSource {
    async fn fetch_profile(&self, login: &str) -> Result<UserRecord> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .profiles
            .push(login.to_string());

        if let Some(delay) = self.profile_delays.get(login) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.profile_failures.get(login) {
            return Err(error.clone());
        }
        self.users
            .get(login)
            .map(|entry| entry.user.clone())
            .ok_or_else(|| SourceError::NotFound(login.to_string()))
    }

    async fn fetch_followers(&self, login: &str, page_size: usize) -> Result<Vec<UserRecord>> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .followers
            .push(login.to_string());

        if let Some(delay) = self.follower_delays.get(login) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.follower_failures.get(login) {
            return Err(error.clone());
        }

        let entry = self
            .users
            .get(login)
            .ok_or_else(|| SourceError::NotFound(login.to_string()))?;

        Ok(entry
            .followers
            .iter()
            .take(page_size)
            .map(|follower| self.stub(follower))
            .collect())
    }
}
