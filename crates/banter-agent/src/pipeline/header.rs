//! Metadata headers prepended to history messages, and removal of headers the
//! model echoes back despite being told not to.

use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use banter_core::config::HeaderStyle;

pub const HEADER_BEGIN: &str = "$$HEADER_BEGIN$$";
pub const HEADER_END: &str = "$$HEADER_END$$";

/// An echoed header: a marker pair (current or legacy spelling) with whatever
/// sits between them on the same line, or a lone marker. Leftmost-first, so
/// pairs win over lone markers.
const ECHOED_HEADER: &str = concat!(
    r"\$\$HEADER_BEGIN\$\$.*?\$\$HEADER_END\$\$",
    r"|\$\$HEADER\$\$.*?\$\$END_HEADER\$\$",
    r"|\$\$(?:HEADER_BEGIN|HEADER_END|HEADER|END_HEADER)\$\$",
);

/// Echoed headers plus the whitespace that only existed to separate them:
/// spaces and line breaks after a header opening the text, spaces around a
/// header closing a line, and spaces after any other header.
fn echoed_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?m)\A(?:{h})[ \t]*(?:\r?\n)*|[ \t]*(?:{h})[ \t]*$|(?:{h})[ \t]*",
            h = ECHOED_HEADER
        ))
        .expect("static regex")
    })
}

/// ISO-8601 UTC with milliseconds, e.g. `2023-09-11T08:30:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whether a header style already identifies the sender.
pub fn carries_sender(style: HeaderStyle) -> bool {
    matches!(style, HeaderStyle::FullHeader)
}

/// Render the header for one message, or `None` for [`HeaderStyle::None`].
///
/// `from` and `to` must already be sanitized.
pub fn render_header(
    style: HeaderStyle,
    at: DateTime<Utc>,
    from: &str,
    to: Option<&str>,
) -> Option<String> {
    if style == HeaderStyle::None {
        return None;
    }
    let mut out = String::from(HEADER_BEGIN);
    match style {
        HeaderStyle::None => {}
        HeaderStyle::UtcPrefix => {
            out.push_str(&format!(" CURTIME:{},", format_timestamp(at)));
        }
        HeaderStyle::FullHeader => {
            out.push_str(&format!(" CURTIME:{},", format_timestamp(at)));
            out.push_str(&format!(" FROM:{},", from));
            if let Some(to) = to.filter(|t| !t.is_empty()) {
                out.push_str(&format!(" TO:{},", to));
            }
        }
    }
    out.push(' ');
    out.push_str(HEADER_END);
    Some(out)
}

/// Prefix `content` with its header when the style asks for one.
pub fn with_header(
    style: HeaderStyle,
    at: DateTime<Utc>,
    from: &str,
    to: Option<&str>,
    content: &str,
) -> String {
    match render_header(style, at, from, to) {
        Some(header) => format!("{} {}", header, content),
        None => content.to_string(),
    }
}

/// Remove echoed headers from model output. Text outside the headers, its
/// indentation and trailing newlines included, is left as is.
pub fn strip_echoed_headers(text: &str) -> String {
    echoed_header_re().replace_all(text, "").into_owned()
}
