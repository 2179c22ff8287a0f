use rust_decimal::Decimal;
use std::str::FromStr;

/// Largest magnitude accepted from a statement cell.
const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Parses a statement amount cell.
///
/// Either `.` or `,` may be the decimal separator. When both occur the
/// right-most one is the decimal separator and the other is grouping.
/// A single `,` is a decimal comma; repeated ones are grouping. Spaces,
/// apostrophes and currency symbols are ignored, and an empty cell is zero.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\'' | '£' | '$' | '€'))
        .collect();
    if cleaned.is_empty() {
        return Some(Decimal::ZERO);
    }

    let (negative, body) = if cleaned.starts_with('(') && cleaned.ends_with(')') {
        (true, &cleaned[1..cleaned.len() - 1])
    } else if let Some(rest) = cleaned.strip_prefix('-') {
        (true, rest)
    } else {
        (false, cleaned.as_str())
    };

    let normalized = match (body.rfind('.'), body.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => body.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => body.replace(',', ""),
        (None, Some(_)) if body.matches(',').count() == 1 => body.replace(',', "."),
        (None, Some(_)) => body.replace(',', ""),
        (Some(_), None) if body.matches('.').count() > 1 => body.replace('.', ""),
        _ => body.to_string(),
    };

    if normalized.starts_with(['-', '+']) {
        return None;
    }
    let value = Decimal::from_str(&normalized).ok()?;
    if value > Decimal::from(MAX_AMOUNT) {
        return None;
    }
    Some(if negative { -value } else { value })
}
