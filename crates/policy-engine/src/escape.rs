//! Quoting for values interpolated into double-quoted PowerShell strings.

/// Characters that end or alter a double-quoted PowerShell literal.
///
/// PowerShell treats the typographic quotes as string delimiters too, and
/// expands `$` inside double quotes.
const SPECIAL: [char; 6] = ['`', '"', '\u{201C}', '\u{201D}', '\u{201E}', '$'];

/// Escapes `value` for use between double quotes in a PowerShell script.
/// Each special character is prefixed with a backtick.
pub fn escape_for_powershell(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if SPECIAL.contains(&ch) {
            escaped.push('`');
        }
        escaped.push(ch);
    }
    escaped
}

/// Wraps an escaped value in double quotes.
pub(crate) fn quoted(value: &str) -> String {
    format!("\"{}\"", escape_for_powershell(value))
}
