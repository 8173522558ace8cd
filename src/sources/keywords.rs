use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

static RUST_KEYWORD: OnceLock<Option<Regex>> = OnceLock::new();

fn rust_keyword() -> Option<&'static Regex> {
    RUST_KEYWORD
        .get_or_init(|| Regex::new(r"(?i)\b(rust|rustlang|rustacean)\b").ok())
        .as_ref()
}

/// Whether `text` mentions Rust as a whole word (`rust`, `rustlang`, `rustacean`).
pub fn mentions_rust(text: &str) -> bool {
    rust_keyword().is_some_and(|re| re.is_match(text))
}

/// Wraps every Rust keyword in `open`/`close` markers, preserving its case.
pub fn highlight_rust<'a>(text: &'a str, open: &str, close: &str) -> Cow<'a, str> {
    match rust_keyword() {
        Some(re) => re.replace_all(text, format!("{open}${{1}}{close}").as_str()),
        None => Cow::Borrowed(text),
    }
}
