//! Gridiron Core
//!
//! Core domain types, ports, and error handling for Gridiron Data Hub.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the cache, the loader, and the adapters.

pub mod dataset;
pub mod error;
pub mod ids;
pub mod load;
pub mod ports;
pub mod table;

pub use dataset::{Dataset, NgsStatType, Seasons};
pub use error::{Error, Result};
pub use ids::TableRef;
pub use load::{LoadOutcome, LoadRequest, LoadStatus, LoadStrategy};
pub use table::{Table, Value};
