use super::Error;
use std::cmp::Ordering;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

/// Time units accepted by `plusTime`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    Day,
    Hour,
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "day" => Ok(TimeUnit::Day),
            "hour" => Ok(TimeUnit::Hour),
            _ => Err(Error::PlusTimeBadUnit),
        }
    }
}

const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// A date-time value inside a CertLogic evaluation.
///
/// Produced by `plusTime` and consumed by the comparison operators, which
/// compare by instant. Date-only strings are interpreted at UTC start of day;
/// the evaluation clock is injected in the same reference, so evaluation is
/// independent of the machine's zone.
#[derive(Clone, Copy, Debug)]
pub struct JsonDateTime(OffsetDateTime);

impl JsonDateTime {
    /// Parse an ISO-8601 date or date-time string.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if let Ok(date_time) = OffsetDateTime::parse(s, &Rfc3339) {
            return Ok(Self(date_time));
        }
        Date::parse(s, DATE_FORMAT)
            .map(|date| Self(date.midnight().assume_utc()))
            .map_err(|_| Error::InvalidDateTime(s.to_string()))
    }

    pub fn plus(&self, amount: i64, unit: TimeUnit) -> Result<Self, Error> {
        let delta = match unit {
            TimeUnit::Day => Duration::days(amount),
            TimeUnit::Hour => Duration::hours(amount),
        };
        self.0
            .checked_add(delta)
            .map(Self)
            .ok_or(Error::DateOutOfRange)
    }

    pub fn instant(&self) -> OffsetDateTime {
        self.0
    }
}

impl From<OffsetDateTime> for JsonDateTime {
    fn from(value: OffsetDateTime) -> Self {
        Self(value)
    }
}

impl PartialEq for JsonDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for JsonDateTime {}

impl PartialOrd for JsonDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JsonDateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_offset_date_times() {
        let parsed = JsonDateTime::parse("2021-06-05T12:00:00+02:00").unwrap();
        assert_eq!(parsed.instant(), datetime!(2021-06-05 12:00 +02:00));
    }

    #[test]
    fn parses_dates_at_start_of_day() {
        let parsed = JsonDateTime::parse("2021-05-01").unwrap();
        assert_eq!(parsed.instant(), datetime!(2021-05-01 00:00 UTC));
    }

    #[test]
    fn rejects_other_strings() {
        assert!(JsonDateTime::parse("today").is_err());
        assert!(JsonDateTime::parse("2021-05-01T10:00:00").is_err());
        assert!(JsonDateTime::parse("").is_err());
    }

    #[test]
    fn comparison_is_by_instant() {
        let a = JsonDateTime::parse("2021-06-05T12:00:00+02:00").unwrap();
        let b = JsonDateTime::parse("2021-06-05T10:00:00Z").unwrap();
        assert_eq!(a, b);
        let later = JsonDateTime::parse("2021-06-05T10:00:01Z").unwrap();
        assert!(later > a);
    }

    #[test]
    fn adds_days_and_hours() {
        let base = JsonDateTime::parse("2021-05-01").unwrap();
        assert_eq!(
            base.plus(21, TimeUnit::Day).unwrap().instant(),
            datetime!(2021-05-22 00:00 UTC)
        );
        assert_eq!(
            base.plus(-2, TimeUnit::Hour).unwrap().instant(),
            datetime!(2021-04-30 22:00 UTC)
        );
    }
}
