//! Utility modules shared across the sync engines

pub mod decompression;
pub mod http;
pub mod jitter;
pub mod matching;
pub mod rate_limit;
pub mod time;
pub mod title;
pub mod unique_code;
pub mod url;
pub mod xmltv;

pub use decompression::{looks_gzipped, maybe_gunzip};
pub use http::{Fetcher, FetcherConfig, OriginMetrics};
pub use jitter::generate_jitter_ms;
pub use rate_limit::{SlotPacer, TokenBucket};
