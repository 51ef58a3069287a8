use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("fanrank")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("fanrank")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("rank")
                .about(
                    "Crawl the follower graph below a user and rank everyone found by how many \
                distinct followers reach them.",
                )
                .arg(
                    arg!(<LOGIN>)
                        .required(true)
                        .help("Login of the user to start from"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Maximum traversal depth, the root being depth 1 (clamped to 1-5)")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("2"),
                )
                .arg(
                    arg!(-w --"workers" <NUM_WORKERS>)
                        .required(false)
                        .help("Concurrent expansions per depth level (default: $FANRANK_WORKERS or 4)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"page-size" <NUM>)
                        .required(false)
                        .help("Followers fetched per user (default: $FANRANK_PAGE_SIZE or 3)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds (default: $FANRANK_TIMEOUT_SECS or 10)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv, markdown")
                        .value_parser(["text", "json", "csv", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-s --"sort" <KEY>)
                        .required(false)
                        .help("Order of the ranked users: ranking, username, created")
                        .value_parser(["ranking", "username", "created"])
                        .default_value("ranking"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"fixture" <PATH>)
                        .required(false)
                        .help("Serve users from a JSON fixture instead of the GitHub API")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("user")
                .about("Look up a single user's profile")
                .arg(
                    arg!(<LOGIN>)
                        .required(true)
                        .help("Login of the user to look up"),
                )
                .arg(
                    arg!(--"fixture" <PATH>)
                        .required(false)
                        .help("Serve users from a JSON fixture instead of the GitHub API")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
