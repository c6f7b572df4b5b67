//! Calendar date parsing into the canonical `YYYYMMDD` form.

use chrono::{Datelike, NaiveDate};

const CANONICAL: &str = "%Y%m%d";

/// Full dates, tried in order. Numeric day/month orders are day-first.
const DAY_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d %B, %Y",
    "%d-%b-%Y",
];

/// Month-and-year forms; the day defaults to the first of the month.
const MONTH_FORMATS: &[&str] = &["%Y-%m", "%Y/%m", "%m/%Y", "%m.%Y", "%B %Y", "%b %Y", "%B, %Y"];

/// Parse a free-text date into `YYYYMMDD`.
///
/// A bare year is not a calendar date and yields `None`, as does anything
/// outside the years 1000-2999.
///
/// ```
/// use patcit_core::dates::parse_date;
///
/// assert_eq!(parse_date("2020-01-05").as_deref(), Some("20200105"));
/// assert_eq!(parse_date("5 Jan. 2020").as_deref(), Some("20200105"));
/// assert_eq!(parse_date("March 2019").as_deref(), Some("20190301"));
/// assert_eq!(parse_date("2019"), None);
/// ```
pub fn parse_date(raw: &str) -> Option<String> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return None;
    }

    let date = parse_compact(&cleaned)
        .or_else(|| parse_iso_datetime(&cleaned))
        .or_else(|| {
            DAY_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
        })
        .or_else(|| {
            let with_day = format!("{} 1", cleaned);
            MONTH_FORMATS.iter().find_map(|fmt| {
                NaiveDate::parse_from_str(&with_day, &format!("{} %d", fmt)).ok()
            })
        })?;

    if !(1000..=2999).contains(&date.year()) {
        return None;
    }
    Some(date.format(CANONICAL).to_string())
}

/// True if `token` is already canonical.
pub fn is_canonical(token: &str) -> bool {
    token.len() == 8
        && token.bytes().all(|b| b.is_ascii_digit())
        && NaiveDate::parse_from_str(token, CANONICAL).is_ok()
}

/// Parse every token, drop the unparseable ones and deduplicate, keeping
/// first-seen order.
pub fn canonical_dates<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in tokens {
        if let Some(date) = parse_date(token) {
            if !out.contains(&date) {
                out.push(date);
            }
        }
    }
    out
}

/// Trim, drop trailing punctuation and the period of abbreviated month
/// names ("Jan." becomes "Jan").
fn clean(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ')'))
        .trim_start_matches('(');
    let mut out = String::with_capacity(trimmed.len());
    let mut prev_alpha = false;
    for c in trimmed.chars() {
        if c == '.' && prev_alpha {
            continue;
        }
        prev_alpha = c.is_alphabetic();
        out.push(c);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_compact(s: &str) -> Option<NaiveDate> {
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        NaiveDate::parse_from_str(s, CANONICAL).ok()
    } else {
        None
    }
}

/// `2016-06-27T00:00:00` style timestamps; only the date part is kept.
fn parse_iso_datetime(s: &str) -> Option<NaiveDate> {
    let (date, _) = s.split_once('T')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_forms() {
        assert_eq!(parse_date("2020/01/05").as_deref(), Some("20200105"));
        assert_eq!(parse_date("20200105").as_deref(), Some("20200105"));
        assert_eq!(parse_date("05.01.2020").as_deref(), Some("20200105"));
        assert_eq!(parse_date("05/01/2020").as_deref(), Some("20200105"));
        assert_eq!(parse_date("2016-06-27T00:00:00").as_deref(), Some("20160627"));
    }

    #[test]
    fn test_month_names() {
        assert_eq!(parse_date("January 5, 2020").as_deref(), Some("20200105"));
        assert_eq!(parse_date("5 Jan 2020").as_deref(), Some("20200105"));
        assert_eq!(parse_date("Jan. 2020").as_deref(), Some("20200101"));
        assert_eq!(parse_date("(Dec 3, 1999).").as_deref(), Some("19991203"));
    }

    #[test]
    fn test_month_year() {
        assert_eq!(parse_date("2016-06").as_deref(), Some("20160601"));
        assert_eq!(parse_date("06/2016").as_deref(), Some("20160601"));
    }

    #[test]
    fn test_rejects_non_dates() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("2019"), None);
        assert_eq!(parse_date("2020-13-01"), None);
        assert_eq!(parse_date("31.02.2020"), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("12345678"), None);
    }

    #[test]
    fn test_canonical_dates_dedup_in_order() {
        let dates = canonical_dates(["2020-01-05", "bogus", "05.01.2020", "1999-12-03"]);
        assert_eq!(dates, vec!["20200105", "19991203"]);
    }

    #[test]
    fn test_is_canonical() {
        assert!(is_canonical("20200105"));
        assert!(!is_canonical("2020-01-05"));
        assert!(!is_canonical("20201301"));
    }
}
