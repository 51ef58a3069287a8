use crate::error::{Result, SourceError};
use crate::model::UserRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Remote directory the crawler reads users from.
///
/// Implementations keep no state between calls; the crawler owns every
/// retry, timeout and dedup decision.
#[async_trait]
pub trait UserSource: Send + Sync {
    /// Fetch the minimal profile for one login.
    async fn fetch_profile(&self, login: &str) -> Result<UserRecord>;

    /// Fetch the first page of up to `page_size` immediate followers, in the
    /// order the remote returns them. Only the first page is ever requested.
    async fn fetch_followers(&self, login: &str, page_size: usize) -> Result<Vec<UserRecord>>;
}

#[async_trait]
impl<S: UserSource + ?Sized> UserSource for Arc<S> {
    async fn fetch_profile(&self, login: &str) -> Result<UserRecord> {
        (**self).fetch_profile(login).await
    }

    async fn fetch_followers(&self, login: &str, page_size: usize) -> Result<Vec<UserRecord>> {
        (**self).fetch_followers(login, page_size).await
    }
}

#[async_trait]
impl<S: UserSource + ?Sized> UserSource for Box<S> {
    async fn fetch_profile(&self, login: &str) -> Result<UserRecord> {
        (**self).fetch_profile(login).await
    }

    async fn fetch_followers(&self, login: &str, page_size: usize) -> Result<Vec<UserRecord>> {
        (**self).fetch_followers(login, page_size).await
    }
}

#[async_trait]
impl<'a, S: UserSource + ?Sized> UserSource for &'a S {
    async fn fetch_profile(&self, login: &str) -> Result<UserRecord> {
        (**self).fetch_profile(login).await
    }

    async fn fetch_followers(&self, login: &str, page_size: usize) -> Result<Vec<UserRecord>> {
        (**self).fetch_followers(login, page_size).await
    }
}

/// Connection settings for [`GitHubSource`].
#[derive(Clone)]
pub struct SourceConfig {
    pub api_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl SourceConfig {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }

    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            token: None,
            timeout: Duration::from_secs(10),
            user_agent: format!("fanrank/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// Hand-written so the credential never ends up in logs.
impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("api_url", &self.api_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// User payload as served by the GitHub REST API.
#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
    id: u64,
    html_url: String,
    avatar_url: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<ApiUser> for UserRecord {
    fn from(user: ApiUser) -> Self {
        UserRecord {
            login: user.login,
            id: user.id,
            profile_url: user.html_url,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
        }
    }
}

/// [`UserSource`] backed by the GitHub users API.
pub struct GitHubSource {
    client: Client,
    api_url: Url,
}

impl GitHubSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.api_url.cannot_be_a_base() {
            return Err(SourceError::RemoteUnavailable(format!(
                "API URL cannot be used as a base: {}",
                config.api_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

        if let Some(ref token) = config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SourceError::RemoteUnavailable(format!("Invalid token value: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.timeout / 2)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                SourceError::RemoteUnavailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_url: config.api_url,
        })
    }

    fn user_url(&self, login: &str, followers: bool) -> Result<Url> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SourceError::RemoteUnavailable(format!("Invalid API URL: {}", self.api_url))
            })?;
            segments.pop_if_empty().push("users").push(login);
            if followers {
                segments.push("followers");
            }
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, login: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let response = check_status(response, login)?;
        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| SourceError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl UserSource for GitHubSource {
    async fn fetch_profile(&self, login: &str) -> Result<UserRecord> {
        if login.trim().is_empty() {
            return Err(SourceError::NotFound(login.to_string()));
        }
        let url = self.user_url(login, false)?;
        let user: ApiUser = self.get(url, login).await?;
        Ok(user.into())
    }

    async fn fetch_followers(&self, login: &str, page_size: usize) -> Result<Vec<UserRecord>> {
        if login.trim().is_empty() {
            return Err(SourceError::NotFound(login.to_string()));
        }
        let mut url = self.user_url(login, true)?;
        url.query_pairs_mut()
            .append_pair("per_page", &page_size.to_string());
        let followers: Vec<ApiUser> = self.get(url, login).await?;
        Ok(followers.into_iter().map(UserRecord::from).collect())
    }
}

fn transport_error(error: reqwest::Error) -> SourceError {
    if error.is_timeout() {
        SourceError::RemoteUnavailable(format!("request timed out: {}", error))
    } else if error.is_decode() {
        SourceError::MalformedResponse(error.to_string())
    } else {
        SourceError::RemoteUnavailable(error.to_string())
    }
}

fn check_status(response: Response, login: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(login.to_string()));
    }

    let headers = response.headers();
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && is_throttled(headers))
    {
        return Err(SourceError::RateLimited {
            retry_after: retry_after(headers),
        });
    }

    Err(SourceError::RemoteUnavailable(format!(
        "GitHub API error ({}) for {}",
        status, login
    )))
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn is_throttled(headers: &HeaderMap) -> bool {
    header_number(headers, "x-ratelimit-remaining") == Some(0) || headers.contains_key(RETRY_AFTER)
}

/// Wait hint from `retry-after` (seconds) or the `x-ratelimit-reset` epoch.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(secs) = header_number(headers, RETRY_AFTER.as_str()) {
        return Some(Duration::from_secs(secs.max(0) as u64));
    }
    let reset = DateTime::<Utc>::from_timestamp(header_number(headers, "x-ratelimit-reset")?, 0)?;
    Some((reset - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    fn source_for(server: &MockServer, token: Option<&str>) -> GitHubSource {
        let config = SourceConfig::new(token.map(String::from))
            .with_api_url(Url::parse(&server.uri()).unwrap())
            .with_timeout(Duration::from_millis(500));
        GitHubSource::new(config).unwrap()
    }

    fn api_user(login: &str, id: u64) -> serde_json::Value {
        json!({
            "login": login,
            "id": id,
            "html_url": format!("https://github.com/{}", login),
            "avatar_url": format!("https://avatars.githubusercontent.com/u/{}", id),
            "type": "User",
        })
    }

    #[tokio::test]
    async fn test_fetch_profile_parses_minimal_fields() {
        let server = MockServer::start().await;
        let mut body = api_user("octocat", 583231);
        body["created_at"] = json!("2011-01-25T18:44:36Z");
        body["followers"] = json!(20000);

        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let user = source_for(&server, Some("s3cret"))
            .fetch_profile("octocat")
            .await
            .unwrap();

        assert_eq!(user.login, "octocat");
        assert_eq!(user.id, 583231);
        assert_eq!(user.profile_url, "https://github.com/octocat");
        assert_eq!(
            user.created_at.map(|d| d.to_rfc3339()),
            Some("2011-01-25T18:44:36+00:00".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_followers_requests_one_page_in_remote_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/alice/followers"))
            .and(query_param("per_page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                api_user("carol", 3),
                api_user("bob", 2),
                api_user("dave", 4),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let followers = source_for(&server, None)
            .fetch_followers("alice", 3)
            .await
            .unwrap();

        let logins: Vec<&str> = followers.iter().map(|f| f.login.as_str()).collect();
        assert_eq!(logins, vec!["carol", "bob", "dave"]);
        assert!(followers.iter().all(|f| f.created_at.is_none()));
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let err = source_for(&server, None).fetch_profile("ghost").await.unwrap_err();
        assert_eq!(err, SourceError::NotFound("ghost".to_string()));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_too_many_requests_is_rate_limited_with_hint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice/followers"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let err = source_for(&server, None)
            .fetch_followers("alice", 3)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SourceError::RateLimited {
                retry_after: Some(Duration::from_secs(30))
            }
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_exhausted_quota_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("x-ratelimit-reset", "1"),
            )
            .mount(&server)
            .await;

        let err = source_for(&server, None).fetch_profile("alice").await.unwrap_err();
        // The reset epoch lies in the past, so there is nothing left to wait for.
        assert_eq!(
            err,
            SourceError::RateLimited {
                retry_after: Some(Duration::ZERO)
            }
        );
    }

    #[tokio::test]
    async fn test_plain_forbidden_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice"))
            .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "42"))
            .mount(&server)
            .await;

        let err = source_for(&server, None).fetch_profile("alice").await.unwrap_err();
        assert!(matches!(err, SourceError::RemoteUnavailable(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = source_for(&server, None).fetch_profile("alice").await.unwrap_err();
        assert!(matches!(err, SourceError::RemoteUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "alice"})))
            .mount(&server)
            .await;

        let err = source_for(&server, None).fetch_profile("alice").await.unwrap_err();
        assert!(matches!(err, SourceError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_slow_response_times_out_as_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(api_user("alice", 1))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = source_for(&server, None).fetch_profile("alice").await.unwrap_err();
        assert!(matches!(err, SourceError::RemoteUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_login_never_hits_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = source_for(&server, None).fetch_profile("  ").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = SourceConfig::new(Some("ghp_supersecret".to_string()));
        let printed = format!("{:?}", config);
        assert!(!printed.contains("supersecret"));
        assert!(printed.contains("<redacted>"));
    }
}
