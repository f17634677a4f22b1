//! Reader for the public nflverse data releases.
//!
//! [`HttpSourceReader`] implements the `SourceReader` port by downloading
//! CSV release assets and parsing them into tables. Requests go through a
//! [`CircuitBreaker`] so a failing upstream is not hammered.

pub mod breaker;
pub mod config;
pub mod enrich;
pub mod http;
pub mod parse;

pub use breaker::{CircuitBreaker, CircuitState};
pub use config::{AssetPaths, SourceConfig};
pub use enrich::{Enrichment, merge_nextgen};
pub use http::HttpSourceReader;
pub use parse::parse_csv;
