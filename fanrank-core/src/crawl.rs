use crate::config::EngineConfig;
use crate::rank::rank;
use fanrank_crawler::crawler::{DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKERS};
use fanrank_crawler::{
    CancellationToken, CrawlError, GraphBuilder, ProgressCallback, RankedUser, SkippedFetch,
    SourceError, UserRecord, UserSource,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;

pub const MIN_DEPTH: u32 = 1;
pub const MAX_DEPTH: u32 = 5;

/// Options for configuring a ranking run
pub struct RankOptions {
    pub root: String,
    pub max_depth: u32,
    pub page_size: usize,
    pub workers: usize,
    pub request_timeout: Duration,
    pub show_progress_bars: bool,
    pub cancel: Option<CancellationToken>,
}

impl RankOptions {
    pub fn new(root: impl Into<String>, max_depth: u32) -> Self {
        Self {
            root: root.into(),
            max_depth,
            page_size: DEFAULT_PAGE_SIZE,
            workers: DEFAULT_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            show_progress_bars: false,
            cancel: None,
        }
    }

    pub fn from_config(root: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            page_size: config.page_size,
            workers: config.workers,
            request_timeout: config.request_timeout,
            ..Self::new(root, config.max_depth)
        }
    }
}

/// Callback for reporting ranking progress
pub type RankProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Ranked users of one crawl plus the fetches that were skipped on the way.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub root: String,
    pub max_depth: u32,
    pub users: Vec<RankedUser>,
    pub skipped: Vec<SkippedFetch>,
    pub retry_after: Option<Duration>,
}

impl Ranking {
    /// Some counts may be low because the remote throttled us.
    pub fn rate_limited(&self) -> bool {
        self.skipped.iter().any(|s| s.error.is_rate_limited())
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn get(&self, login: &str) -> Option<&RankedUser> {
        self.users.iter().find(|u| u.login() == login)
    }
}

/// Depths outside 1..=5 are pulled back into range.
pub fn clamp_depth(depth: u32) -> u32 {
    depth.clamp(MIN_DEPTH, MAX_DEPTH)
}

/// Crawl from `options.root` and rank every user found.
///
/// Fails only when the root cannot be resolved or the run is cancelled;
/// deeper remote failures end up in [`Ranking::skipped`].
pub async fn execute_rank<S: UserSource>(
    source: S,
    options: RankOptions,
    progress_callback: Option<RankProgressCallback>,
) -> Result<Ranking, CrawlError> {
    let RankOptions {
        root,
        max_depth,
        page_size,
        workers,
        request_timeout,
        show_progress_bars,
        cancel,
    } = options;

    let depth = clamp_depth(max_depth);
    if depth != max_depth {
        warn!("Max depth {} out of range, using {}", max_depth, depth);
        if let Some(ref callback) = progress_callback {
            callback(format!("[!] Max depth {} out of range, using {}", max_depth, depth));
        }
    }

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Resolving {}...", root));
        Some(Arc::new(pb))
    } else {
        None
    };

    let processed_count = Arc::new(AtomicUsize::new(0));

    let internal_progress_callback: ProgressCallback = {
        let pb_clone = progress_bar.clone();
        let count_clone = processed_count.clone();
        let outer = progress_callback.clone();
        Arc::new(move |level: u32, login: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref pb) = pb_clone {
                pb.set_message(format!(
                    "Crawling... {} users expanded (depth {}: {})",
                    count, level, login
                ));
                pb.tick();
            }
            if let Some(ref callback) = outer {
                callback(format!("depth {}: {}", level, login));
            }
        })
    };

    let mut builder = GraphBuilder::new(source)
        .with_page_size(page_size)
        .with_workers(workers)
        .with_request_timeout(request_timeout)
        .with_progress_callback(internal_progress_callback);
    if let Some(token) = cancel {
        builder = builder.with_cancellation(token);
    }

    let outcome = builder.build(&root, depth).await;

    if let Some(ref pb) = progress_bar {
        match outcome {
            Ok(ref outcome) => pb.finish_with_message(format!(
                "Crawl complete! {} users found",
                outcome.nodes.len()
            )),
            Err(ref e) => pb.abandon_with_message(format!("Crawl failed: {}", e)),
        }
    }
    let outcome = outcome?;

    if outcome.rate_limited() {
        warn!(
            "Remote directory throttled {} fetches; counts are incomplete",
            outcome
                .skipped
                .iter()
                .filter(|s| s.error.is_rate_limited())
                .count()
        );
    }

    let users = rank(&outcome.nodes);
    let retry_after = outcome.retry_after();
    let root = outcome
        .nodes
        .root()
        .map(|node| node.login().to_string())
        .unwrap_or(root);

    Ok(Ranking {
        root,
        max_depth: depth,
        users,
        skipped: outcome.skipped,
        retry_after,
    })
}

/// Crawl and rank with default tunables.
pub async fn rank_follower_graph<S: UserSource>(
    source: S,
    root: &str,
    max_depth: u32,
) -> Result<Vec<RankedUser>, CrawlError> {
    let ranking = execute_rank(source, RankOptions::new(root, max_depth), None).await?;
    Ok(ranking.users)
}

/// Point lookup of one user, no traversal, under `request_timeout`.
pub async fn resolve_user<S: UserSource + ?Sized>(
    source: &S,
    login: &str,
    request_timeout: Duration,
) -> Result<UserRecord, SourceError> {
    match tokio::time::timeout(request_timeout, source.fetch_profile(login)).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::RemoteUnavailable(format!(
            "request timed out after {}ms",
            request_timeout.as_millis()
        ))),
    }
}
