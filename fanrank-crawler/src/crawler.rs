use crate::error::{CrawlError, SourceError};
use crate::graph::{Node, NodeMap};
use crate::model::UserRecord;
use crate::source::UserSource;
use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Followers requested per user. Bounds remote cost; only the first page is read.
pub const DEFAULT_PAGE_SIZE: usize = 3;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Called with `(depth, login)` each time a user's followers are requested.
pub type ProgressCallback = Arc<dyn Fn(u32, String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Profile,
    Followers,
}

impl FetchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStage::Profile => "profile",
            FetchStage::Followers => "followers",
        }
    }
}

/// A remote failure absorbed during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFetch {
    pub login: String,
    pub depth: u32,
    pub stage: FetchStage,
    pub error: SourceError,
}

/// Result of a finished crawl.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub nodes: NodeMap,
    pub skipped: Vec<SkippedFetch>,
}

impl CrawlOutcome {
    /// True when at least one fetch was throttled, so the whole result is
    /// likely under-counted and the caller should back off before retrying.
    pub fn rate_limited(&self) -> bool {
        self.skipped.iter().any(|s| s.error.is_rate_limited())
    }

    /// Longest wait hint among throttled fetches.
    pub fn retry_after(&self) -> Option<Duration> {
        self.skipped
            .iter()
            .filter_map(|s| match s.error {
                SourceError::RateLimited { retry_after } => retry_after,
                _ => None,
            })
            .max()
    }
}

struct CrawlState {
    nodes: NodeMap,
    skipped: Vec<SkippedFetch>,
}

impl CrawlState {
    fn skip(&mut self, login: String, depth: u32, stage: FetchStage, error: SourceError) {
        self.skipped.push(SkippedFetch {
            login,
            depth,
            stage,
            error,
        });
    }
}

enum Interrupt {
    Cancelled,
    Failed(SourceError),
}

/// Bounded-depth traversal of the follower graph.
///
/// The root sits at depth 1. A user at depth `d` gets its followers fetched
/// and recorded; those followers are only profiled and inserted when
/// `d < max_depth`. Users on the same level are expanded concurrently by up
/// to `workers` tasks, and every login is claimed under the state lock before
/// any fetch for it is issued.
pub struct GraphBuilder<S> {
    source: S,
    page_size: usize,
    workers: usize,
    request_timeout: Duration,
    progress_callback: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl<S: UserSource> GraphBuilder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            page_size: DEFAULT_PAGE_SIZE,
            workers: DEFAULT_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            progress_callback: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn build(&self, root_login: &str, max_depth: u32) -> Result<CrawlOutcome, CrawlError> {
        if max_depth < 1 {
            return Err(CrawlError::InvalidDepth(max_depth));
        }
        info!(
            "Starting crawl of {} (max depth {}, page size {}, {} workers)",
            root_login, max_depth, self.page_size, self.workers
        );

        let root = match self.call(self.source.fetch_profile(root_login)).await {
            Ok(root) => root,
            Err(Interrupt::Cancelled) => return Err(CrawlError::Cancelled),
            Err(Interrupt::Failed(error)) => return Err(CrawlError::from_root(root_login, error)),
        };

        // Key by the login the remote reports, which may differ in case from the request.
        let mut frontier = vec![root.login.clone()];
        let mut nodes = NodeMap::new();
        nodes.insert(Node::new(root, 1));

        let state = Mutex::new(CrawlState {
            nodes,
            skipped: Vec::new(),
        });
        let shared = &state;

        let mut depth = 1;
        while !frontier.is_empty() && depth <= max_depth {
            if self.cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
            debug!("Expanding {} users at depth {}", frontier.len(), depth);

            let level = depth;
            let discovered: Vec<Vec<String>> = stream::iter(frontier)
                .map(move |login| self.expand(shared, login, level, max_depth))
                .buffer_unordered(self.workers)
                .try_collect()
                .await?;

            frontier = discovered.into_iter().flatten().collect();
            depth += 1;
        }

        let CrawlState { nodes, skipped } = state.into_inner();
        info!(
            "Crawl complete. Visited {} users, skipped {} fetches",
            nodes.len(),
            skipped.len()
        );
        Ok(CrawlOutcome { nodes, skipped })
    }

    /// Fetch and record `login`'s followers, then claim and profile the new
    /// ones. Returns the logins to expand on the next level.
    async fn expand(
        &self,
        state: &Mutex<CrawlState>,
        login: String,
        depth: u32,
        max_depth: u32,
    ) -> Result<Vec<String>, CrawlError> {
        if let Some(ref callback) = self.progress_callback {
            callback(depth, login.clone());
        }

        let followers = match self
            .call(self.source.fetch_followers(&login, self.page_size))
            .await
        {
            Ok(mut followers) => {
                followers.truncate(self.page_size);
                followers
            }
            Err(Interrupt::Cancelled) => return Err(CrawlError::Cancelled),
            Err(Interrupt::Failed(error)) => {
                warn!("Skipping followers of {}: {}", login, error);
                let mut state = state.lock().await;
                state.nodes.abandon(&login);
                state.skip(login, depth, FetchStage::Followers, error);
                return Ok(Vec::new());
            }
        };
        debug!("{} has {} followers on the first page", login, followers.len());

        let claimed: Vec<UserRecord> = {
            let mut state = state.lock().await;
            let edges = followers.iter().map(|f| f.login.clone()).collect();
            state.nodes.attach_followers(&login, edges);

            if depth >= max_depth {
                return Ok(Vec::new());
            }
            let claimed = followers
                .into_iter()
                .filter(|f| state.nodes.claim(&f.login))
                .collect();
            claimed
        };

        let child_depth = depth + 1;
        let mut next = Vec::with_capacity(claimed.len());
        for stub in claimed {
            // The followers page has no creation date, so every new follower
            // costs one profile request.
            match self.call(self.source.fetch_profile(&stub.login)).await {
                Ok(profile) => {
                    let user = UserRecord {
                        login: stub.login.clone(),
                        ..profile
                    };
                    if state.lock().await.nodes.insert(Node::new(user, child_depth)) {
                        next.push(stub.login);
                    }
                }
                Err(Interrupt::Cancelled) => return Err(CrawlError::Cancelled),
                Err(Interrupt::Failed(error)) => {
                    warn!("Skipping profile of {}: {}", stub.login, error);
                    let mut state = state.lock().await;
                    let login = stub.login.clone();
                    state.nodes.insert(Node::abandoned(stub, child_depth));
                    state.skip(login, child_depth, FetchStage::Profile, error);
                }
            }
        }

        Ok(next)
    }

    /// Run one remote call under the request timeout, giving up as soon as
    /// the crawl is cancelled.
    async fn call<T, F>(&self, request: F) -> Result<T, Interrupt>
    where
        F: Future<Output = crate::error::Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            outcome = tokio::time::timeout(self.request_timeout, request) => match outcome {
                Ok(result) => result.map_err(Interrupt::Failed),
                Err(_) => Err(Interrupt::Failed(SourceError::timed_out(self.request_timeout))),
            },
        }
    }
}
