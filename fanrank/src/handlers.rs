use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use fanrank_core::crawl::{RankOptions, execute_rank, resolve_user};
use fanrank_core::report::{
    ReportFormat, SortKey, format_user, render_report, save_report, sort_users,
};
use fanrank_core::{EngineConfig, Ranking};
use fanrank_crawler::{CancellationToken, GitHubSource, StaticSource, UserSource};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Command-line values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub depth: Option<u32>,
    pub workers: Option<usize>,
    pub page_size: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl Overrides {
    pub fn from_matches(args: &ArgMatches) -> Self {
        Self {
            depth: args.get_one::<u32>("depth").copied(),
            workers: args.get_one::<usize>("workers").copied(),
            page_size: args.get_one::<usize>("page-size").copied(),
            timeout_secs: args.get_one::<u64>("timeout").copied(),
        }
    }
}

pub fn apply_overrides(mut config: EngineConfig, overrides: &Overrides) -> Result<EngineConfig> {
    if let Some(depth) = overrides.depth {
        config = config.with_max_depth(depth);
    }
    if let Some(workers) = overrides.workers {
        config.workers = workers;
    }
    if let Some(page_size) = overrides.page_size {
        config.page_size = page_size;
    }
    if let Some(secs) = overrides.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    config.validate().context("Invalid command-line option")?;
    Ok(config)
}

pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Load an offline user directory from a JSON fixture file
pub fn load_fixture(path: &Path) -> Result<StaticSource> {
    let path = expand_path(path);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    let source = StaticSource::from_json(&content)
        .with_context(|| format!("Failed to parse fixture {}", path.display()))?;
    if source.is_empty() {
        bail!("No users found in fixture {}", path.display());
    }
    Ok(source)
}

/// The fixture when one is given, the GitHub API otherwise.
pub fn build_source(config: &EngineConfig, fixture: Option<&PathBuf>) -> Result<Arc<dyn UserSource>> {
    if let Some(path) = fixture {
        debug!("Serving users from fixture {}", path.display());
        return Ok(Arc::new(load_fixture(path)?));
    }
    let source = GitHubSource::new(config.source_config())
        .context("Failed to build GitHub client")?;
    Ok(Arc::new(source))
}

/// Write `content` to `output` (tilde-expanded), or stdout when no path is given.
pub fn write_report(content: &str, output: Option<&PathBuf>) -> Result<Option<PathBuf>> {
    match output {
        Some(path) => {
            let path = expand_path(path);
            save_report(content, &path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            Ok(Some(path))
        }
        None => {
            print!("{}", content);
            Ok(None)
        }
    }
}

fn print_divider() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_rank_header(root: &str, config: &EngineConfig, fixture: Option<&PathBuf>) {
    print_divider();
    eprintln!("{} {}", "  RANKING".bright_white().bold(), root.bright_cyan());
    print_divider();
    eprintln!("{} Max depth: {}", "→".blue(), config.max_depth);
    eprintln!("{} Workers: {}", "→".blue(), config.workers);
    eprintln!("{} Page size: {}", "→".blue(), config.page_size);
    match fixture {
        Some(path) => eprintln!("{} Source: fixture {}", "→".blue(), path.display()),
        None => eprintln!("{} Source: {}", "→".blue(), config.api_url),
    }
    if fixture.is_none() && config.token.is_none() {
        eprintln!(
            "{} No GITHUB_TOKEN set, unauthenticated requests are heavily rate limited",
            "⚠".yellow().bold()
        );
    }
    eprintln!();
}

fn print_rank_summary(ranking: &Ranking) {
    eprintln!(
        "\n{} Ranked {} users below {}",
        "✓".green().bold(),
        ranking.users.len(),
        ranking.root.bright_white()
    );
    if ranking.is_complete() {
        return;
    }
    eprintln!(
        "{} {} fetches were skipped, counts below those users are incomplete",
        "⚠".yellow().bold(),
        ranking.skipped.len()
    );
    if ranking.rate_limited() {
        match ranking.retry_after {
            Some(wait) => eprintln!(
                "{} Rate limited, retry in {}s",
                "⚠".yellow().bold(),
                wait.as_secs()
            ),
            None => eprintln!("{} Rate limited, retry later", "⚠".yellow().bold()),
        }
    }
}

pub async fn handle_rank(
    sub_matches: &ArgMatches,
    quiet: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let Some(login) = sub_matches.get_one::<String>("LOGIN") else {
        bail!("A login to rank is required");
    };
    let fixture = sub_matches.get_one::<PathBuf>("fixture");
    let output = sub_matches.get_one::<PathBuf>("output");
    let format = sub_matches
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let sort = sub_matches
        .get_one::<String>("sort")
        .and_then(|s| SortKey::from_str(s))
        .unwrap_or(SortKey::Ranking);

    let config = EngineConfig::from_env().context("Invalid environment configuration")?;
    let config = apply_overrides(config, &Overrides::from_matches(sub_matches))?;
    debug!("Effective configuration: {:?}", config);

    let source = build_source(&config, fixture)?;

    if !quiet {
        print_rank_header(login, &config, fixture);
    }

    let options = RankOptions {
        show_progress_bars: !quiet,
        cancel: Some(cancel),
        ..RankOptions::from_config(login.as_str(), &config)
    };

    let mut ranking = execute_rank(source, options, None)
        .await
        .with_context(|| format!("Ranking {} failed", login))?;

    sort_users(&mut ranking.users, sort);
    let report = render_report(&ranking, format).context("Failed to render report")?;

    if let Some(path) = write_report(&report, output)? {
        if !quiet {
            eprintln!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
    }
    if !quiet {
        print_rank_summary(&ranking);
    }
    Ok(())
}

pub async fn handle_user(sub_matches: &ArgMatches) -> Result<()> {
    let Some(login) = sub_matches.get_one::<String>("LOGIN") else {
        bail!("A login to look up is required");
    };
    let fixture = sub_matches.get_one::<PathBuf>("fixture");

    let config = EngineConfig::from_env().context("Invalid environment configuration")?;
    let source = build_source(&config, fixture)?;

    let user = resolve_user(&source, login, config.request_timeout)
        .await
        .with_context(|| format!("Failed to look up {}", login))?;
    print!("{}", format_user(&user));
    Ok(())
}
