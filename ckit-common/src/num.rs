//! Strict integer parsing for protocol arguments and string-entry contents.

/// Parses a full byte slice as a signed decimal i64.
///
/// Rejects empty input, embedded junk, and out-of-range values. Leading `+`
/// and whitespace are not accepted; this is the same strictness clients get
/// from the INCR family.
pub fn parse_i64(bytes: &[u8]) -> Option<i64> {
    if bytes.first() == Some(&b'+') {
        return None;
    }
    let text = std::str::from_utf8(bytes).ok()?;
    if text.is_empty() {
        return None;
    }
    text.parse::<i64>().ok()
}
