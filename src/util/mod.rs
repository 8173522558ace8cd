//! Text helpers shared by the feed parser and the CLI output.
//!
//! - **Character truncation** for feed summaries
//! - **Width-aware truncation** for terminal columns
//! - **Control character stripping** for untrusted feed text

mod text;

pub use text::{strip_control_chars, truncate_chars, truncate_to_width};
