//! SMTP reply line parsing.
//!
//! SMTP replies can be single-line or multi-line:
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`

use crate::types::ReplyCode;

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the last line.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() >= 4 && line.as_bytes()[3] == b' '
}

/// Parses the three-digit reply code at the start of a line.
#[must_use]
pub fn reply_code(line: &str) -> Option<ReplyCode> {
    let code = line.get(..3)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    code.parse().ok().map(ReplyCode::new)
}

/// Returns the text after the code and separator (`"250-"` / `"250 "`).
///
/// Lines of four bytes or fewer have no text.
#[must_use]
pub fn reply_text(line: &str) -> &str {
    line.get(4..).unwrap_or("")
}
