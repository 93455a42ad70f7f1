//! Year extraction for event matching.
//!
//! Interchange dates are free text (`ABT 12 MAY 1750`). Stored dates use the
//! database's sortable encoding: `1YYYYMMDD…` for regular dates, a leading `0`
//! for irregular ones whose text still embeds a year, `0000`/empty for none.

/// First whitespace-separated token of exactly four digits.
///
/// # Examples
/// ```
/// assert_eq!(gedcom::interchange_year("BEF 3 MAR 1750"), Some(1750));
/// assert_eq!(gedcom::interchange_year("MAR 75"), None);
/// ```
pub fn interchange_year(date: &str) -> Option<u16> {
    date.split_whitespace()
        .find(|token| token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|token| token.parse().ok())
}

/// Year of a stored date, `None` when the date carries no usable year.
///
/// # Examples
/// ```
/// assert_eq!(gedcom::stored_year("117500512"), Some(1750));
/// assert_eq!(gedcom::stored_year("0000"), None);
/// ```
pub fn stored_year(date: &str) -> Option<u16> {
    let date = date.trim();
    let year = if let Some(rest) = date.strip_prefix('1') {
        rest.get(..4)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))?
            .parse()
            .ok()?
    } else if let Some(rest) = date.strip_prefix('0') {
        first_digit_run(rest)?
    } else {
        return None;
    };
    (year != 0).then_some(year)
}

/// First run of four consecutive ASCII digits.
fn first_digit_run(text: &str) -> Option<u16> {
    text.as_bytes()
        .windows(4)
        .find(|w| w.iter().all(u8::is_ascii_digit))
        .and_then(|w| std::str::from_utf8(w).ok())
        .and_then(|s| s.parse().ok())
}
