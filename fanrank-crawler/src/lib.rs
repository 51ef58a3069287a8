pub mod crawler;
pub mod error;
pub mod graph;
pub mod memory;
pub mod model;
pub mod source;

pub use crawler::{CrawlOutcome, FetchStage, GraphBuilder, ProgressCallback, SkippedFetch};
pub use error::{CrawlError, SourceError};
pub use graph::{Expansion, Node, NodeMap};
pub use memory::StaticSource;
pub use model::{RankedUser, UserRecord};
pub use source::{GitHubSource, SourceConfig, UserSource};
pub use tokio_util::sync::CancellationToken;
