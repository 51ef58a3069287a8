// Report generation from a finished ranking

use crate::crawl::Ranking;
use fanrank_crawler::{RankedUser, UserRecord};
use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

/// Display orderings offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Highest reachable-follower count first.
    Ranking,
    Username,
    /// Oldest account first; unknown dates last.
    CreatedDate,
}

impl SortKey {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ranking" | "rank" | "followers" => Some(SortKey::Ranking),
            "username" | "login" | "name" => Some(SortKey::Username),
            "created" | "created-date" | "date" => Some(SortKey::CreatedDate),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable sort; ties fall back to login so output is deterministic.
pub fn sort_users(users: &mut [RankedUser], key: SortKey) {
    users.sort_by(|a, b| {
        let primary = match key {
            SortKey::Ranking => b.followers_count.cmp(&a.followers_count),
            SortKey::Username => Ordering::Equal,
            SortKey::CreatedDate => match (a.user.created_at, b.user.created_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        primary.then_with(|| compare_logins(a.login(), b.login()))
    });
}

/// Case-insensitive, with the raw bytes breaking ties between case variants.
pub fn compare_logins(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub fn render_report(ranking: &Ranking, format: ReportFormat) -> Result<String, ReportError> {
    Ok(match format {
        ReportFormat::Text => generate_text_report(ranking),
        ReportFormat::Json => generate_json_report(ranking)?,
        ReportFormat::Csv => generate_csv_report(ranking),
        ReportFormat::Markdown => generate_markdown_report(ranking),
    })
}

fn format_date(user: &UserRecord) -> String {
    user.created_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn generate_text_report(ranking: &Ranking) -> String {
    let mut report = String::new();

    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("                          FOLLOWER INFLUENCE RANKING\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    report.push_str(&format!("Root:         {}\n", ranking.root));
    report.push_str(&format!("Max depth:    {}\n", ranking.max_depth));
    report.push_str(&format!("Users ranked: {}\n", ranking.users.len()));
    if !ranking.is_complete() {
        report.push_str(&format!("Skipped:      {} fetches\n", ranking.skipped.len()));
    }
    report.push('\n');

    let width = ranking
        .users
        .iter()
        .map(|u| u.login().len())
        .max()
        .unwrap_or(5)
        .max(5);

    report.push_str(&format!(
        "  {:>4}  {:<width$}  {:>9}  {:>5}  {}\n",
        "#",
        "LOGIN",
        "FOLLOWERS",
        "DEPTH",
        "CREATED",
        width = width
    ));
    for (idx, user) in ranking.users.iter().enumerate() {
        report.push_str(&format!(
            "  {:>4}  {:<width$}  {:>9}  {:>5}  {}\n",
            idx + 1,
            user.login(),
            user.followers_count,
            user.depth,
            format_date(&user.user),
            width = width
        ));
    }

    if !ranking.skipped.is_empty() {
        report.push_str("\n────────────────────────────────────────────────────────────────────────────────\n");
        report.push_str("SKIPPED FETCHES (counts below these users are incomplete)\n\n");
        for skip in &ranking.skipped {
            report.push_str(&format!(
                "  {} ({} at depth {}): {}\n",
                skip.login,
                skip.stage.as_str(),
                skip.depth,
                skip.error
            ));
        }
        if ranking.rate_limited() {
            match ranking.retry_after {
                Some(wait) => report.push_str(&format!(
                    "\n[!] Rate limited by the remote directory, retry in {}s\n",
                    wait.as_secs()
                )),
                None => report.push_str("\n[!] Rate limited by the remote directory\n"),
            }
        }
    }

    report
}

pub fn generate_json_report(ranking: &Ranking) -> Result<String, serde_json::Error> {
    let skipped: Vec<serde_json::Value> = ranking
        .skipped
        .iter()
        .map(|skip| {
            serde_json::json!({
                "login": skip.login,
                "depth": skip.depth,
                "stage": skip.stage.as_str(),
                "error": skip.error.to_string(),
                "retryable": skip.error.is_retryable(),
            })
        })
        .collect();

    let json_report = serde_json::json!({
        "metadata": {
            "generator": "fanrank",
            "version": env!("CARGO_PKG_VERSION"),
            "generated_at": chrono::Utc::now().to_rfc3339(),
        },
        "root": ranking.root,
        "max_depth": ranking.max_depth,
        "rate_limited": ranking.rate_limited(),
        "retry_after_secs": ranking.retry_after.map(|d| d.as_secs()),
        "users": ranking.users,
        "skipped": skipped,
    });

    serde_json::to_string_pretty(&json_report)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn generate_csv_report(ranking: &Ranking) -> String {
    let mut csv = String::from("login,id,followers_count,depth,created_at,profile_url,avatar_url,followers\n");
    for user in &ranking.users {
        let created = user
            .user
            .created_at
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();
        let row = [
            csv_field(user.login()),
            user.user.id.to_string(),
            user.followers_count.to_string(),
            user.depth.to_string(),
            created,
            csv_field(&user.user.profile_url),
            csv_field(&user.user.avatar_url),
            csv_field(&user.followers.join(";")),
        ];
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}

pub fn generate_markdown_report(ranking: &Ranking) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Follower ranking for `{}`\n\n", ranking.root));
    md.push_str(&format!(
        "Max depth {}, {} users ranked.\n\n",
        ranking.max_depth,
        ranking.users.len()
    ));

    md.push_str("| # | Login | Followers | Depth | Created |\n");
    md.push_str("|---|-------|-----------|-------|---------|\n");
    for (idx, user) in ranking.users.iter().enumerate() {
        let login = if user.user.profile_url.is_empty() {
            user.login().to_string()
        } else {
            format!("[{}]({})", user.login(), user.user.profile_url)
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            idx + 1,
            login,
            user.followers_count,
            user.depth,
            format_date(&user.user)
        ));
    }

    if !ranking.skipped.is_empty() {
        md.push_str("\n## Skipped fetches\n\n");
        for skip in &ranking.skipped {
            md.push_str(&format!(
                "- `{}` ({}, depth {}): {}\n",
                skip.login,
                skip.stage.as_str(),
                skip.depth,
                skip.error
            ));
        }
    }

    md
}

/// Plain-text card for a single user lookup.
pub fn format_user(user: &UserRecord) -> String {
    let mut card = String::new();
    card.push_str(&format!("Login:    {}\n", user.login));
    card.push_str(&format!("ID:       {}\n", user.id));
    card.push_str(&format!("Profile:  {}\n", user.profile_url));
    card.push_str(&format!("Avatar:   {}\n", user.avatar_url));
    card.push_str(&format!("Created:  {}\n", format_date(user)));
    card
}

pub fn save_report(content: &str, path: &Path) -> Result<(), ReportError> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
