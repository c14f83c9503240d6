use chrono::{DateTime, Local, SecondsFormat, Utc};

/// One instant captured per Generate invocation.
///
/// Every field that carries time (request body, derived filenames) renders
/// from the same stamp, so the client and the webhook agree on naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestStamp(DateTime<Utc>);

impl RequestStamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// `2024-05-01T12:30:45.123Z`
    pub fn iso8601(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// `yyyyMMdd-HHmmss` in local time.
    pub fn compact(&self) -> String {
        self.0.with_timezone(&Local).format("%Y%m%d-%H%M%S").to_string()
    }

    pub fn input_filename(&self, extension: &str) -> String {
        format!("input_{}.{}", self.compact(), extension)
    }

    pub fn output_filename(&self) -> String {
        format!("output_{}.png", self.compact())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> RequestStamp {
        RequestStamp::at(Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap())
    }

    #[test]
    fn test_iso8601_has_millis_and_z() {
        assert_eq!(fixed().iso8601(), "2024-03-07T09:05:02.000Z");
    }

    #[test]
    fn test_compact_is_zero_padded_local_time() {
        let stamp = fixed();
        let expected = stamp
            .instant()
            .with_timezone(&Local)
            .format("%Y%m%d-%H%M%S")
            .to_string();
        let compact = stamp.compact();
        assert_eq!(compact, expected);
        assert_eq!(compact.len(), 15);
        assert_eq!(&compact[8..9], "-");
        assert!(compact.chars().filter(|c| *c != '-').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_filenames_share_the_stamp() {
        let stamp = fixed();
        let compact = stamp.compact();
        assert_eq!(stamp.input_filename("png"), format!("input_{}.png", compact));
        assert_eq!(stamp.output_filename(), format!("output_{}.png", compact));
    }
}
