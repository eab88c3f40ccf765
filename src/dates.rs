//! Calendar date helpers shared by record payloads and spreadsheet import.

use serde::{Deserialize, Deserializer};
use time::{Date, Month};

/// Order matters: the first layout that parses wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    /// `YYYY-MM-DD`
    Iso,
    /// `DD-MM-YYYY`
    DayMonthYearDash,
    /// `MM/DD/YYYY`
    MonthDayYearSlash,
    /// `DD/MM/YYYY`
    DayMonthYearSlash,
}

pub const DATE_LAYOUTS: [DateLayout; 4] = [
    DateLayout::Iso,
    DateLayout::DayMonthYearDash,
    DateLayout::MonthDayYearSlash,
    DateLayout::DayMonthYearSlash,
];

impl DateLayout {
    pub fn parse(self, input: &str) -> Option<Date> {
        let (sep, order) = match self {
            DateLayout::Iso => ('-', [Part::Year, Part::Month, Part::Day]),
            DateLayout::DayMonthYearDash => ('-', [Part::Day, Part::Month, Part::Year]),
            DateLayout::MonthDayYearSlash => ('/', [Part::Month, Part::Day, Part::Year]),
            DateLayout::DayMonthYearSlash => ('/', [Part::Day, Part::Month, Part::Year]),
        };

        let pieces: Vec<&str> = input.split(sep).collect();
        if pieces.len() != 3 {
            return None;
        }

        let (mut year, mut month, mut day) = (None, None, None);
        for (piece, part) in pieces.into_iter().zip(order) {
            let width_ok = match part {
                Part::Year => piece.len() == 4,
                Part::Month | Part::Day => (1..=2).contains(&piece.len()),
            };
            if !width_ok || !piece.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let n: i32 = piece.parse().ok()?;
            match part {
                Part::Year => year = Some(n),
                Part::Month => month = Some(n),
                Part::Day => day = Some(n),
            }
        }

        let month = Month::try_from(u8::try_from(month?).ok()?).ok()?;
        let day = u8::try_from(day?).ok()?;
        Date::from_calendar_date(year?, month, day).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Year,
    Month,
    Day,
}

/// Parses `input` with the first matching layout in [`DATE_LAYOUTS`].
pub fn parse_flexible(input: &str) -> Option<Date> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    DATE_LAYOUTS.iter().find_map(|layout| layout.parse(input))
}

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub use iso_date::option as iso_date_option;

/// Deserializes an optional date written in any recognised layout.
/// Blank strings and `null` become `None`; anything else must parse.
pub fn de_flexible_date<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_flexible(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognised date '{s}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn iso_wins_first() {
        assert_eq!(parse_flexible("2024-01-15"), Some(date!(2024 - 01 - 15)));
    }

    #[test]
    fn dash_day_first() {
        assert_eq!(parse_flexible("15-01-2024"), Some(date!(2024 - 01 - 15)));
    }

    #[test]
    fn slash_prefers_month_first() {
        assert_eq!(parse_flexible("02/03/2024"), Some(date!(2024 - 02 - 03)));
        // 13 can't be a month, falls through to DD/MM/YYYY
        assert_eq!(parse_flexible("13/03/2024"), Some(date!(2024 - 03 - 13)));
    }

    #[test]
    fn accepts_unpadded_parts() {
        assert_eq!(parse_flexible("1/5/2024"), Some(date!(2024 - 01 - 05)));
        assert_eq!(parse_flexible("2024-1-5"), Some(date!(2024 - 01 - 05)));
    }

    #[test]
    fn rejects_garbage_and_trailing_text() {
        assert_eq!(parse_flexible(""), None);
        assert_eq!(parse_flexible("soon"), None);
        assert_eq!(parse_flexible("2024-01-15 00:00:00"), None);
        assert_eq!(parse_flexible("2024-02-30"), None);
        assert_eq!(parse_flexible("32/01/2024"), None);
    }

    #[test]
    fn year_needs_four_digits() {
        assert_eq!(parse_flexible("15-01-24"), None);
        assert_eq!(parse_flexible("1/2/24"), None);
        assert_eq!(parse_flexible("024-01-15"), None);
        assert_eq!(parse_flexible("20241-01-15"), None);
    }

    #[derive(Debug, serde::Deserialize)]
    struct DatedRow {
        #[serde(default, deserialize_with = "de_flexible_date")]
        when: Option<Date>,
    }

    #[test]
    fn flexible_deserializer() {
        let p: DatedRow = serde_json::from_str(r#"{"when":"05-06-2024"}"#).unwrap();
        assert_eq!(p.when, Some(date!(2024 - 06 - 05)));
        let p: DatedRow = serde_json::from_str(r#"{"when":""}"#).unwrap();
        assert_eq!(p.when, None);
        let p: DatedRow = serde_json::from_str(r#"{"when":null}"#).unwrap();
        assert_eq!(p.when, None);
        let p: DatedRow = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(p.when, None);
        assert!(serde_json::from_str::<DatedRow>(r#"{"when":"someday"}"#).is_err());
        assert!(serde_json::from_str::<DatedRow>(r#"{"when":"15-01-24"}"#).is_err());
    }
}
