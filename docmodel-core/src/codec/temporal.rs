use bson::Bson;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use super::{Codec, CodecResult};
use crate::error::CoercionError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Time zone a temporal codec renders its application values in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZonePolicy {
    /// Render in UTC.
    Utc,
    /// Render in a fixed offset.
    Offset(FixedOffset),
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

fn to_bson(instant: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_millis(instant.timestamp_millis()))
}

/// Parses text into an instant. Strings without an offset are read in `zone`.
fn parse_instant(input: &str, zone: FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Some(instant.with_timezone(&Utc));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    zone.from_local_datetime(&naive)
        .single()
        .map(|instant| instant.with_timezone(&Utc))
}

/// Converts a recognised value to an instant. `Ok(None)` means the kind is not recognised.
fn instant(tag: &str, value: &Bson, zone: FixedOffset) -> Result<Option<DateTime<Utc>>, CoercionError> {
    let out_of_range = || CoercionError::new(tag, value, "out of range");

    match value {
        Bson::DateTime(stored) => from_millis(stored.timestamp_millis())
            .map(Some)
            .ok_or_else(out_of_range),
        Bson::Int32(seconds) => DateTime::<Utc>::from_timestamp(*seconds as i64, 0)
            .map(Some)
            .ok_or_else(out_of_range),
        Bson::Int64(seconds) => DateTime::<Utc>::from_timestamp(*seconds, 0)
            .map(Some)
            .ok_or_else(out_of_range),
        Bson::Double(seconds) if seconds.is_finite() => from_millis((seconds * 1000.0).round() as i64)
            .map(Some)
            .ok_or_else(out_of_range),
        Bson::String(input) => parse_instant(input.trim(), zone)
            .map(Some)
            .ok_or_else(|| CoercionError::new(tag, value, "not a recognised time")),
        _ => Ok(None),
    }
}

fn is_blank(value: &Bson) -> bool {
    match value {
        Bson::Null => true,
        Bson::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Calendar dates, stored as UTC midnight and read back as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy)]
pub struct DateCodec {
    zone: FixedOffset,
}

impl DateCodec {
    pub const TAG: &'static str = "date";

    pub fn new(zone: FixedOffset) -> Self {
        Self { zone }
    }

    fn date(&self, value: &Bson) -> Result<Option<NaiveDate>, CoercionError> {
        if let Bson::String(input) = value {
            let trimmed = input.trim();

            if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
                return Ok(Some(date));
            }
            if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
                return Ok(Some(instant.date_naive()));
            }
        }

        // Stored dates are UTC midnights; anything else is dated in the configured zone.
        let local = !matches!(value, Bson::DateTime(_));
        Ok(instant(Self::TAG, value, self.zone)?.map(|instant| {
            if local {
                instant.with_timezone(&self.zone).date_naive()
            } else {
                instant.date_naive()
            }
        }))
    }
}

impl Codec for DateCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        if is_blank(&value) {
            return Ok(Bson::Null);
        }

        match self.date(&value)? {
            Some(date) => date
                .and_hms_opt(0, 0, 0)
                .map(|midnight| to_bson(midnight.and_utc()))
                .ok_or_else(|| CoercionError::new(Self::TAG, &value, "out of range")),
            None => Ok(value),
        }
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        if let Bson::DateTime(stored) = &value {
            if let Some(instant) = from_millis(stored.timestamp_millis()) {
                return Ok(Bson::String(instant.date_naive().format(DATE_FORMAT).to_string()));
            }
        }

        Ok(value)
    }
}

/// Instants, stored as millisecond BSON datetimes and read back as RFC 3339 text.
///
/// The same codec backs the `time`, `date_time` and `time_with_zone` tags; they differ in the
/// zone they render in.
#[derive(Debug, Clone, Copy)]
pub struct TimeCodec {
    tag: &'static str,
    zone: FixedOffset,
    policy: ZonePolicy,
}

impl TimeCodec {
    pub const TIME: &'static str = "time";
    pub const DATE_TIME: &'static str = "date_time";
    pub const TIME_WITH_ZONE: &'static str = "time_with_zone";

    /// Creates a codec. `zone` interprets input without an offset; `policy` picks the output zone.
    pub fn new(tag: &'static str, zone: FixedOffset, policy: ZonePolicy) -> Self {
        Self { tag, zone, policy }
    }

    fn render(&self, instant: DateTime<Utc>) -> String {
        match self.policy {
            ZonePolicy::Utc => instant.to_rfc3339_opts(SecondsFormat::Millis, true),
            ZonePolicy::Offset(offset) => instant
                .with_timezone(&offset)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl Codec for TimeCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        if is_blank(&value) {
            return Ok(Bson::Null);
        }

        Ok(match instant(self.tag, &value, self.zone)? {
            Some(instant) => to_bson(instant),
            None => value,
        })
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        if let Bson::DateTime(stored) = &value {
            if let Some(instant) = from_millis(stored.timestamp_millis()) {
                return Ok(Bson::String(self.render(instant)));
            }
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn plus_two() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    #[test]
    fn date_is_stored_at_utc_midnight() {
        let codec = DateCodec::new(utc());
        let stored = codec.mongoize(Bson::String("2024-03-01".into())).unwrap();

        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert_eq!(stored, Bson::DateTime(bson::DateTime::from_millis(expected)));
        assert_eq!(codec.demongoize(stored).unwrap(), Bson::String("2024-03-01".into()));
    }

    #[test]
    fn date_drops_time_of_day() {
        let codec = DateCodec::new(utc());
        let from_time = codec.mongoize(Bson::String("2024-03-01T18:30:00Z".into())).unwrap();

        assert_eq!(codec.demongoize(from_time).unwrap(), Bson::String("2024-03-01".into()));
    }

    #[test]
    fn naive_date_times_keep_their_local_date() {
        let codec = DateCodec::new(plus_two());
        let stored = codec.mongoize(Bson::String("2024-03-01 00:30:00".into())).unwrap();

        assert_eq!(codec.demongoize(stored.clone()).unwrap(), Bson::String("2024-03-01".into()));
        assert_eq!(codec.mongoize(stored.clone()).unwrap(), stored);
    }

    #[test]
    fn time_round_trips_in_utc() {
        let codec = TimeCodec::new(TimeCodec::TIME, utc(), ZonePolicy::Utc);
        let stored = codec.mongoize(Bson::String("2024-03-01T10:15:30.250Z".into())).unwrap();

        assert_eq!(codec.demongoize(stored).unwrap(), Bson::String("2024-03-01T10:15:30.250Z".into()));
    }

    #[test]
    fn time_with_zone_renders_in_configured_offset() {
        let codec = TimeCodec::new(TimeCodec::TIME_WITH_ZONE, plus_two(), ZonePolicy::Offset(plus_two()));
        let stored = codec.mongoize(Bson::String("2024-03-01T10:00:00Z".into())).unwrap();
        let rendered = codec.demongoize(stored).unwrap();

        assert_eq!(rendered, Bson::String("2024-03-01T12:00:00.000+02:00".into()));
    }

    #[test]
    fn naive_input_is_read_in_configured_zone() {
        let codec = TimeCodec::new(TimeCodec::TIME, plus_two(), ZonePolicy::Utc);
        let stored = codec.mongoize(Bson::String("2024-03-01 12:00:00".into())).unwrap();

        assert_eq!(codec.demongoize(stored).unwrap(), Bson::String("2024-03-01T10:00:00.000Z".into()));
    }

    #[test]
    fn epoch_seconds_are_accepted() {
        let codec = TimeCodec::new(TimeCodec::DATE_TIME, utc(), ZonePolicy::Utc);

        assert_eq!(
            codec.mongoize(Bson::Int64(60)).unwrap(),
            Bson::DateTime(bson::DateTime::from_millis(60_000))
        );
    }

    #[test]
    fn garbage_text_is_refused() {
        let codec = TimeCodec::new(TimeCodec::TIME, utc(), ZonePolicy::Utc);

        assert!(codec.mongoize(Bson::String("next tuesday".into())).is_err());
        assert_eq!(codec.mongoize(Bson::String("".into())).unwrap(), Bson::Null);
    }
}
