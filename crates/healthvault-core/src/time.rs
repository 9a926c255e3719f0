use crate::error::{CoreError, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Format a timestamp for `<msg-time>` and `<signing-time>`.
///
/// The service expects UTC, so any offset is normalized first. Sub-second
/// precision is dropped to keep signed payloads stable.
pub fn format_msg_time(datetime: OffsetDateTime) -> String {
    let utc = datetime
        .to_offset(time::UtcOffset::UTC)
        .replace_nanosecond(0)
        .unwrap_or(datetime);
    // Rfc3339 formatting only fails for years outside 0..=9999.
    utc.format(&Rfc3339)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// Parse a timestamp returned by the service.
pub fn parse_service_time(s: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(s.trim(), &Rfc3339).map_err(|e| {
        CoreError::invalid_date_time(format!("Failed to parse service time '{s}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_format_msg_time_utc() {
        let dt = datetime!(2023-05-15 14:30:00 UTC);
        assert_eq!(format_msg_time(dt), "2023-05-15T14:30:00Z");
    }

    #[test]
    fn test_format_msg_time_normalizes_offset_and_drops_fraction() {
        let dt = datetime!(2023-05-15 16:30:00.123456 +02:00);
        assert_eq!(format_msg_time(dt), "2023-05-15T14:30:00Z");
    }

    #[test]
    fn test_parse_service_time() {
        let parsed = parse_service_time("2023-05-15T14:30:00Z").unwrap();
        assert_eq!(parsed, datetime!(2023-05-15 14:30:00 UTC));

        let parsed = parse_service_time(" 2023-05-15T14:30:00.5+01:00 ").unwrap();
        assert_eq!(
            parsed.to_offset(time::UtcOffset::UTC),
            datetime!(2023-05-15 13:30:00.5 UTC)
        );
    }

    #[test]
    fn test_parse_service_time_invalid() {
        let err = parse_service_time("yesterday").unwrap_err();
        assert!(matches!(err, CoreError::InvalidDateTime(_)));
    }
}
