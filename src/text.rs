//! Plain-text code lists
//!
//! One zero-padded four-digit code per line, as exchanged with operators.

use crate::storage::Code;
use chrono::{DateTime, Utc};

/// Digits per code in text form
pub const CODE_WIDTH: usize = 4;

/// Zero-pad a code to four digits
pub fn format_code(code: Code) -> String {
    format!("{:0width$}", code, width = CODE_WIDTH)
}

/// Extract codes from text, one per line
///
/// Lines are trimmed; anything that is not exactly four ASCII digits is
/// skipped. Duplicates are kept, the store collapses them on import.
pub fn parse_codes(text: &str) -> Vec<i64> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.len() == CODE_WIDTH && line.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|line| line.parse::<i64>().ok())
        .collect()
}

/// Render codes as text, one per line with a trailing newline
pub fn render_codes(codes: &[Code]) -> String {
    let mut out = String::with_capacity(codes.len() * (CODE_WIDTH + 1));
    for &code in codes {
        out.push_str(&format_code(code));
        out.push('\n');
    }
    out
}

/// File name for the automatic export taken before a clear
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("codes-{}.txt", at.format("%Y%m%d-%H%M%S"))
}
