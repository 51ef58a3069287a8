use colored::Colorize;

pub mod config;
pub mod crawl;
pub mod rank;
pub mod report;

pub use config::{ConfigError, EngineConfig};
pub use crawl::{
    RankOptions, RankProgressCallback, Ranking, clamp_depth, execute_rank, rank_follower_graph,
    resolve_user,
};
pub use rank::{RankAggregator, rank};
pub use report::{ReportError, ReportFormat, SortKey, render_report, save_report, sort_users};

pub fn print_banner() {
    let banner = r#"
    ╔═══════════════════════════════════════════════════════╗
    ║  ███████╗ █████╗ ███╗   ██╗██████╗  █████╗ ███╗   ██╗ ║
    ║  ██╔════╝██╔══██╗████╗  ██║██╔══██╗██╔══██╗████╗  ██║ ║
    ║  █████╗  ███████║██╔██╗ ██║██████╔╝███████║██╔██╗ ██║ ║
    ║  ██╔══╝  ██╔══██║██║╚██╗██║██╔══██╗██╔══██║██║╚██╗██║ ║
    ║  ██║     ██║  ██║██║ ╚████║██║  ██║██║  ██║██║ ╚████║ ║
    ║  ╚═╝     ╚═╝  ╚═╝╚═╝  ╚═══╝╚═╝  ╚═╝╚═╝  ╚═╝╚═╝  ╚═══╝ ║
    ╚═══════════════════════════════════════════════════════╝"#;
    eprintln!("{}", banner.bright_cyan().bold());
    eprintln!(
        "      {} {}\n",
        "follower influence ranking".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
