//! Provider time tuples and their conversion to local datetimes.
//!
//! Feed timestamps arrive as broken-down tuples `(year, mon, mday, hour, min,
//! sec, wday, yday, isdst)`. They are converted the way a C `mktime` followed by
//! a local `fromtimestamp` would: the tuple is read as local wall-clock time
//! (honouring the `isdst` flag), turned into an absolute instant, and rendered
//! back in the same zone.
//!
//! Feed parsers emit UTC tuples with `isdst = 0`, so the round trip shifts the
//! value by the zone's offset and, during summer time, by the DST delta. Stored
//! dates depend on this exact behaviour and it must not be "corrected".

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, Offset,
    TimeZone, Timelike, Utc,
};
use thiserror::Error;

/// Broken-down provider time, field-compatible with a C `struct tm` as exposed by
/// feed parsers (`mon` is 1-based, `wday` has Monday = 0, `yday` is 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeTuple {
    pub year: i32,
    pub mon: i32,
    pub mday: i32,
    pub hour: i32,
    pub min: i32,
    pub sec: i32,
    pub wday: i32,
    pub yday: i32,
    pub isdst: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("time tuple {0:?} cannot be represented as a datetime")]
pub struct TimeConversionError(pub TimeTuple);

impl TimeTuple {
    /// Tuple for a UTC instant, as produced by feed parsers (`isdst = 0`).
    pub fn from_utc(dt: &DateTime<Utc>) -> Self {
        Self {
            year: dt.year(),
            mon: dt.month() as i32,
            mday: dt.day() as i32,
            hour: dt.hour() as i32,
            min: dt.minute() as i32,
            sec: dt.second() as i32,
            wday: dt.weekday().num_days_from_monday() as i32,
            yday: dt.ordinal() as i32,
            isdst: 0,
        }
    }

    /// Wall-clock datetime described by the tuple, normalizing out-of-range
    /// fields (`mon = 13`, `mday = 0`, `sec = 60`, ...) by carrying them over.
    /// `wday` and `yday` are ignored.
    fn wall_clock(&self) -> Option<NaiveDateTime> {
        let months = i64::from(self.year) * 12 + i64::from(self.mon) - 1;
        let year = i32::try_from(months.div_euclid(12)).ok()?;
        let month = u32::try_from(months.rem_euclid(12) + 1).ok()?;
        let start = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;

        let carry = Duration::days(i64::from(self.mday) - 1)
            + Duration::hours(i64::from(self.hour))
            + Duration::minutes(i64::from(self.min))
            + Duration::seconds(i64::from(self.sec));
        start.checked_add_signed(carry)
    }
}

impl From<(i32, i32, i32, i32, i32, i32, i32, i32, i32)> for TimeTuple {
    fn from(t: (i32, i32, i32, i32, i32, i32, i32, i32, i32)) -> Self {
        Self {
            year: t.0,
            mon: t.1,
            mday: t.2,
            hour: t.3,
            min: t.4,
            sec: t.5,
            wday: t.6,
            yday: t.7,
            isdst: t.8,
        }
    }
}

/// Convert a provider time tuple into a naive datetime in the process-local zone.
pub fn feed_time_to_datetime(tuple: &TimeTuple) -> Result<NaiveDateTime, TimeConversionError> {
    feed_time_to_datetime_in(tuple, &chrono::Local)
}

/// Convert a provider time tuple into a naive datetime in `tz`.
///
/// The tuple is interpreted as wall-clock time in `tz`:
///
/// - `isdst == 0` applies the zone's standard offset for that year, even when
///   summer time is in effect on that date
/// - `isdst > 0` applies the summer (daylight) offset
/// - `isdst < 0` lets the zone resolve the offset; in a fold the earlier
///   instant wins, in a gap the pre-transition offset is used
///
/// The resulting instant is then expressed as local time in `tz` again.
pub fn feed_time_to_datetime_in<Tz: TimeZone>(
    tuple: &TimeTuple,
    tz: &Tz,
) -> Result<NaiveDateTime, TimeConversionError> {
    let local = tuple.wall_clock().ok_or(TimeConversionError(*tuple))?;
    let offset = offset_for(tz, &local, tuple.isdst).ok_or(TimeConversionError(*tuple))?;

    let instant = local
        .checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))
        .ok_or(TimeConversionError(*tuple))?;

    Ok(tz.from_utc_datetime(&instant).naive_local())
}

fn offset_for<Tz: TimeZone>(tz: &Tz, local: &NaiveDateTime, isdst: i32) -> Option<FixedOffset> {
    if isdst < 0 {
        return match tz.offset_from_local_datetime(local) {
            LocalResult::Single(offset) => Some(offset.fix()),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.fix()),
            LocalResult::None => {
                let before = local.checked_sub_signed(Duration::days(1))?;
                Some(tz.offset_from_utc_datetime(&before).fix())
            }
        };
    }

    let (standard, daylight) = seasonal_offsets(tz, local.year())?;
    Some(if isdst > 0 { daylight } else { standard })
}

/// Standard and summer offsets of `tz` in `year`, sampled mid-winter and
/// mid-summer. Summer time always adds to the offset, so the smaller sample is
/// the standard offset in both hemispheres. Zones without DST return the same
/// offset twice.
fn seasonal_offsets<Tz: TimeZone>(tz: &Tz, year: i32) -> Option<(FixedOffset, FixedOffset)> {
    let sample = |month: u32| -> Option<FixedOffset> {
        let mid_month = NaiveDate::from_ymd_opt(year, month, 15)?.and_hms_opt(12, 0, 0)?;
        Some(tz.offset_from_utc_datetime(&mid_month).fix())
    };
    let january = sample(1)?;
    let july = sample(7)?;

    if january.local_minus_utc() <= july.local_minus_utc() {
        Some((january, july))
    } else {
        Some((july, january))
    }
}
