//! Security code extraction from notification email HTML.

use regex::Regex;
use std::sync::LazyLock;

static HEADING_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h1(?:\s[^>]*)?>").expect("heading pattern is valid"));

/// Return the trimmed text of the first `<h1>` element.
///
/// Only the text run up to the next tag is read, so markup nested inside the
/// heading cuts the code short rather than being flattened. `None` when there
/// is no heading or it is blank.
pub fn extract_code(html: &str) -> Option<String> {
    let open = HEADING_OPEN.find(html)?;
    let rest = &html[open.end()..];
    let text = match rest.find('<') {
        Some(end) => &rest[..end],
        None => rest,
    };

    let code = text.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}
