//! CLI flags of the indexer.

mod globals;
pub use globals::{GlobalArgs, MetricsArgs};

mod fetch;
pub use fetch::FetchArgs;

mod ingest;
pub use ingest::IngestArgs;
