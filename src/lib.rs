//! Job-search bookmark manager: saved sources plus RSS/Atom ingestion
//! through an ordered list of fallback relays.

pub mod config;
pub mod feed;
pub mod sources;
pub mod store;
pub mod util;
