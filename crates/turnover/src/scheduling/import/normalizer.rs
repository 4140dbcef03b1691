use chrono::NaiveDate;

/// Strips invisible characters exports like to carry and collapses inner whitespace.
pub(crate) fn normalize_text(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}', '\u{a0}'], " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a money column into cents. Accepts currency symbols, thousands separators and
/// either `.` or `,` as the decimal mark.
///
/// A lone separator followed by one or two digits is the decimal mark; followed by three
/// it groups thousands. Anything else ambiguous is rejected.
pub(crate) fn parse_cents(value: &str) -> Option<i64> {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    let negative = cleaned.starts_with('-');
    let unsigned = cleaned.trim_start_matches('-');
    if unsigned.is_empty() || unsigned.contains('-') {
        return None;
    }

    let (integer, fraction) = match decimal_mark(unsigned) {
        Some(at) => (&unsigned[..at], &unsigned[at + 1..]),
        None => (unsigned, ""),
    };
    if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits = grouped_digits(integer)?;

    let whole: i64 = if digits.is_empty() { 0 } else { digits.parse().ok()? };
    let mut cents = fraction.to_string();
    while cents.len() < 2 {
        cents.push('0');
    }
    let cents: i64 = cents.parse().ok()?;

    let total = whole.checked_mul(100)?.checked_add(cents)?;
    Some(if negative { -total } else { total })
}

/// Byte offset of the decimal mark, if the amount has one.
fn decimal_mark(amount: &str) -> Option<usize> {
    match (amount.rfind('.'), amount.rfind(',')) {
        (Some(dot), Some(comma)) => Some(dot.max(comma)),
        (Some(at), None) | (None, Some(at)) => {
            let mark = &amount[at..=at];
            let decimals = amount.len() - at - 1;
            (amount.matches(mark).count() == 1 && (1..=2).contains(&decimals)).then_some(at)
        }
        (None, None) => None,
    }
}

/// Integer part without its thousands separators. Every group after the first must
/// hold exactly three digits.
fn grouped_digits(integer: &str) -> Option<String> {
    let mut groups = integer.split(['.', ',']);
    let mut digits = groups.next().unwrap_or_default().to_string();
    let leading_group = !digits.is_empty();
    for group in groups {
        if !leading_group || group.len() != 3 {
            return None;
        }
        digits.push_str(group);
    }
    digits.chars().all(|c| c.is_ascii_digit()).then_some(digits)
}

/// First format that parses wins.
pub(crate) fn parse_date(value: &str, formats: &[&str]) -> Option<NaiveDate> {
    let trimmed = value.trim();
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}
