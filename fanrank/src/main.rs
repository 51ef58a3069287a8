use anyhow::Result;
use commands::command_argument_builder;
use fanrank::handlers::{handle_rank, handle_user};
use fanrank_core::print_banner;
use fanrank_crawler::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() {
    // A missing .env is fine; the real environment still applies.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let result: Result<()> = match chosen_command.subcommand() {
        Some(("rank", primary_command)) => handle_rank(primary_command, quiet, cancel).await,
        Some(("user", primary_command)) => handle_user(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

/// First Ctrl-C cancels the running crawl; in-flight requests are dropped.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling crawl");
            cancel.cancel();
        }
    });
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
