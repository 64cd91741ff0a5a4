pub mod adapter;
pub mod capture;
pub mod cursor;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod layout;
pub mod ledger;
pub mod pacer;
mod services;
pub mod sink;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use adapter::{PassStats, PassSummary, SourceAdapter};
pub use cursor::{paginate, CursorState, PageSource, Stop};
pub use error::{ArchiveError, Result};
pub use extract::{ExtractError, Fields};
pub use fetch::{Credentials, FetchRequest, FetchedBody, HttpFetcher, PageFetcher, Session};
pub use layout::StreamLayout;
pub use ledger::DedupLedger;
pub use pacer::Pacer;
pub use services::birdwatch_export::BirdwatchExportService;
pub use services::birdwatch_ref::BirdwatchRefService;
pub use services::twitter_quote::TwitterQuoteService;
pub use services::youtube::YouTubeService;
pub use sink::JsonlSink;
