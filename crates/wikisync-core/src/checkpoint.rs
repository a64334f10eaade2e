// ABOUTME: Parses the client's sync checkpoint from raw query parameters.
// ABOUTME: Holds the fixed sinceDate text layout so the engine never sees it.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::error::WikiError;
use crate::model::TransactionKey;

/// The sinceDate layout: day-month-year-hour:minute:second and a numeric zone
/// offset, e.g. `19-10-2026-14:03:09+0200`.
pub const SINCE_DATE_FORMAT: &str = "%d-%m-%Y-%H:%M:%S%z";

/// The point in the log a client has already consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Beginning,
    Since(DateTime<Utc>),
    After(TransactionKey),
}

impl Checkpoint {
    /// Build a checkpoint from the `transactionKey` and `sinceDate` query values.
    /// Empty strings count as absent. A date wins over a key when both are given.
    pub fn from_params(
        transaction_key: Option<&str>,
        since_date: Option<&str>,
    ) -> Result<Self, WikiError> {
        let transaction_key = transaction_key.map(str::trim).filter(|s| !s.is_empty());
        let since_date = since_date.map(str::trim).filter(|s| !s.is_empty());

        if let Some(raw) = since_date {
            let since = parse_since_date(raw)?;
            if !is_zero(&since) {
                return Ok(Checkpoint::Since(since));
            }
        }

        match transaction_key {
            Some(raw) => Ok(Checkpoint::After(raw.parse()?)),
            None => Ok(Checkpoint::Beginning),
        }
    }
}

/// Parse a sinceDate value into a UTC instant.
pub fn parse_since_date(raw: &str) -> Result<DateTime<Utc>, WikiError> {
    DateTime::<FixedOffset>::parse_from_str(raw, SINCE_DATE_FORMAT)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| WikiError::InvalidSinceDate(raw.to_string()))
}

/// Render an instant in the sinceDate layout, in UTC.
pub fn format_since_date(date: &DateTime<Utc>) -> String {
    date.format(SINCE_DATE_FORMAT).to_string()
}

// The zero time is 01-01-0001-00:00:00 in UTC; any other instant, even a
// pre-epoch one, is a real checkpoint.
fn is_zero(date: &DateTime<Utc>) -> bool {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .is_some_and(|zero| *date == zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn parses_date_with_offset() {
        let parsed = parse_since_date("19-10-2026-14:03:09+0200").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 10, 19, 12, 3, 9).unwrap());

        let parsed = parse_since_date("01-02-2013-23:59:59-0700").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2013, 2, 2, 6, 59, 59).unwrap());
    }

    #[test]
    fn rejects_other_layouts() {
        for raw in ["2026-10-19T14:03:09Z", "19-10-2026 14:03:09", "19-10-2026-14:03:09"] {
            let err = parse_since_date(raw).unwrap_err();
            assert!(matches!(err, WikiError::InvalidSinceDate(_)), "{raw}");
        }
    }

    #[test]
    fn format_round_trips_through_parse() {
        let date = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(format_since_date(&date), "04-03-2026-05:06:07+0000");
        assert_eq!(parse_since_date(&format_since_date(&date)).unwrap(), date);
    }

    #[test]
    fn empty_params_mean_beginning() {
        assert_eq!(Checkpoint::from_params(None, None).unwrap(), Checkpoint::Beginning);
        assert_eq!(
            Checkpoint::from_params(Some(""), Some("")).unwrap(),
            Checkpoint::Beginning
        );
    }

    #[test]
    fn date_takes_precedence_over_key() {
        let key = Ulid::new().to_string();
        let checkpoint =
            Checkpoint::from_params(Some(&key), Some("19-10-2026-14:03:09+0000")).unwrap();
        assert_eq!(
            checkpoint,
            Checkpoint::Since(Utc.with_ymd_and_hms(2026, 10, 19, 14, 3, 9).unwrap())
        );
    }

    #[test]
    fn zero_date_falls_back_to_key() {
        let key = Ulid::new();
        let checkpoint =
            Checkpoint::from_params(Some(&key.to_string()), Some("01-01-0001-00:00:00+0000"))
                .unwrap();
        assert_eq!(checkpoint, Checkpoint::After(TransactionKey::new(key)));

        let checkpoint = Checkpoint::from_params(None, Some("01-01-0001-00:00:00+0000")).unwrap();
        assert_eq!(checkpoint, Checkpoint::Beginning);
    }

    #[test]
    fn pre_epoch_date_is_a_real_checkpoint() {
        let key = Ulid::new().to_string();
        for raw in ["01-01-1970-00:00:00+0000", "31-12-1969-12:00:00+0000"] {
            let checkpoint = Checkpoint::from_params(Some(&key), Some(raw)).unwrap();
            assert!(matches!(checkpoint, Checkpoint::Since(_)), "{raw}");
        }

        // Same wall time as the zero date but a different instant.
        let checkpoint =
            Checkpoint::from_params(Some(&key), Some("01-01-0001-00:00:00-0100")).unwrap();
        assert!(matches!(checkpoint, Checkpoint::Since(_)));
    }

    #[test]
    fn malformed_key_is_a_decode_error() {
        let err = Checkpoint::from_params(Some("nope"), None).unwrap_err();
        assert!(matches!(err, WikiError::InvalidKey(_)));
    }
}
