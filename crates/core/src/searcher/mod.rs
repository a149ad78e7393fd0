//! Release search abstraction.
//!
//! Searches go through an indexer manager (Prowlarr) one indexer at a time;
//! [`search_indexers`] fans a query out across several indexers.

mod fanout;
mod prowlarr;
mod types;

pub use fanout::search_indexers;
pub use prowlarr::{ProwlarrClient, ProwlarrConfig};
pub use types::*;
