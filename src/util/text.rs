use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Suffix appended by [`truncate_to_width`] when text is cut.
const ELLIPSIS: &str = "...";

/// Returns at most `max_chars` characters of `s`.
///
/// Counts Unicode scalar values, never splits a code point, and never appends
/// a marker. Borrows when nothing needs to be cut.
///
/// ```
/// use job_sources::util::truncate_chars;
///
/// assert_eq!(truncate_chars("hello", 3), "hel");
/// assert_eq!(truncate_chars("héllo", 10), "héllo");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => Cow::Owned(s[..byte_idx].to_owned()),
        None => Cow::Borrowed(s),
    }
}

/// Truncates a string to fit within `max_width` terminal columns.
///
/// Wide characters (CJK, emoji) count as two columns and zero-width
/// characters as none, so the result never overflows its column.
///
/// # Arguments
///
/// * `s` - The string to truncate
/// * `max_width` - Maximum display width in terminal columns
///
/// # Returns
///
/// - `Cow::Borrowed(s)` when the whole string fits
/// - otherwise the longest prefix that fits with `...` appended
/// - for widths of 3 or less, the longest prefix that fits without `...`
///
/// # Examples
///
/// ```
/// use job_sources::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Rust Engineer", 20), "Rust Engineer");
/// assert_eq!(truncate_to_width("Senior Rust Engineer", 10), "Senior ...");
/// assert_eq!(truncate_to_width("日本語の求人", 7), "日本...");
/// assert_eq!(truncate_to_width("abcdef", 3), "abc");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if UnicodeWidthStr::width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let ellipsis = if max_width > ELLIPSIS.len() { ELLIPSIS } else { "" };
    let budget = max_width - ellipsis.len();

    let mut used = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}{}", &s[..cut], ellipsis))
}

/// Strips terminal control characters and ANSI escape sequences.
///
/// Feed titles and summaries come from third-party documents and are printed
/// straight to the terminal. Removes C0 controls other than tab/newline/CR,
/// DEL, CSI sequences (`ESC [` ... final byte), OSC sequences (`ESC ]` ...
/// BEL or `ESC \`) and bare ESC.
///
/// # Examples
///
/// ```
/// use job_sources::util::strip_control_chars;
///
/// assert_eq!(strip_control_chars("\x1b[31mRust\x1b[0m jobs"), "Rust jobs");
/// assert_eq!(strip_control_chars("plain\ttext"), "plain\ttext");
/// ```
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_stripped_control(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

fn is_stripped_control(c: char) -> bool {
    c == '\x1b' || c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
}
