use chrono::NaiveDate;

/// Formats tried when a statement profile does not list its own.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Parses a statement date cell with the given formats, in order.
///
/// ISO dates are always accepted as a last resort because spreadsheet date
/// cells are rendered that way. A trailing time component is ignored.
pub fn parse_date<S: AsRef<str>>(raw: &str, formats: &[S]) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let candidates = [Some(s), s.split([' ', 'T']).next().filter(|d| *d != s)];
    candidates.into_iter().flatten().find_map(|candidate| {
        formats
            .iter()
            .map(|f| f.as_ref())
            .chain(std::iter::once("%Y-%m-%d"))
            .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
    })
}
