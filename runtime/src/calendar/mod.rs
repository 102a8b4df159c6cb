//! Local, deterministic conversion of a civil moment into a four-pillar chart.
//!
//! The year turns at 立春 and the month at each month-opening solar term,
//! both located from the Sun's apparent longitude at the moment itself. The
//! day pillar follows the Julian Day Number of the local civil date, and the
//! 23:00 hour already takes its stem from the following day.

pub mod astro;
pub mod terms;

use crate::chart::{Branch, FourPillarSet, Pillar, Stem};
use crate::error::{AcquisitionError, AcquisitionResult};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use terms::SolarTerm;

/// UTC+8, the civil zone charts are reckoned in unless stated otherwise.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 8 * 60;

/// Hour substituted when a caller supplies only a date.
pub const DEFAULT_HOUR: u32 = 12;

/// A civil date and time in a fixed UTC offset. Not validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarMoment {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub utc_offset_minutes: i32,
}

/// Result of [`CalendarMoment::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedMoment {
    pub moment: CalendarMoment,
    /// True when no time was given and [`DEFAULT_HOUR`] was used.
    pub default_time_used: bool,
}

impl CalendarMoment {
    pub fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Capture a wall-clock instant in its own offset, truncated to the minute.
    pub fn from_datetime(dt: &DateTime<FixedOffset>) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            utc_offset_minutes: dt.offset().local_minus_utc() / 60,
        }
    }

    /// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH` or `YYYY-MM-DD HH:MM` (`/` also
    /// accepted as the date separator). A missing time means 12:00.
    pub fn parse(input: &str) -> AcquisitionResult<ParsedMoment> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:\s+(\d{1,2})(?::(\d{1,2}))?)?$")
                .expect("static pattern")
        });

        let normalized = input.trim().replace('/', "-");
        let caps = re.captures(&normalized).ok_or_else(|| {
            AcquisitionError::InvalidMoment(format!(
                "unrecognized format {input:?}, expected YYYY-MM-DD or YYYY-MM-DD HH:MM"
            ))
        })?;

        let field = |i: usize| -> AcquisitionResult<Option<u32>> {
            caps.get(i)
                .map(|m| {
                    m.as_str().parse::<u32>().map_err(|e| {
                        AcquisitionError::InvalidMoment(format!("bad number {:?}: {e}", m.as_str()))
                    })
                })
                .transpose()
        };

        let year = caps[1]
            .parse::<i32>()
            .map_err(|e| AcquisitionError::InvalidMoment(format!("bad year: {e}")))?;
        let month = field(2)?.unwrap_or_default();
        let day = field(3)?.unwrap_or_default();
        let hour = field(4)?;
        let minute = field(5)?.unwrap_or(0);

        let moment = Self::new(year, month, day, hour.unwrap_or(DEFAULT_HOUR), minute);
        moment.validate()?;
        Ok(ParsedMoment {
            moment,
            default_time_used: hour.is_none(),
        })
    }

    /// Check every field against its legal range, including month length.
    pub fn validate(&self) -> AcquisitionResult<()> {
        let invalid = |msg: String| Err(AcquisitionError::InvalidMoment(msg));
        if !(1..=9999).contains(&self.year) {
            return invalid(format!("year {} outside 1..=9999", self.year));
        }
        if !(1..=12).contains(&self.month) {
            return invalid(format!("month {} outside 1..=12", self.month));
        }
        if !(1..=31).contains(&self.day) {
            return invalid(format!("day {} outside 1..=31", self.day));
        }
        if NaiveDate::from_ymd_opt(self.year, self.month, self.day).is_none() {
            return invalid(format!(
                "{:04}-{:02} has no day {}",
                self.year, self.month, self.day
            ));
        }
        if self.hour > 23 {
            return invalid(format!("hour {} outside 0..=23", self.hour));
        }
        if self.minute > 59 {
            return invalid(format!("minute {} outside 0..=59", self.minute));
        }
        if self.utc_offset_minutes.abs() > 14 * 60 {
            return invalid(format!(
                "utc offset {} minutes outside ±14h",
                self.utc_offset_minutes
            ));
        }
        Ok(())
    }

    /// Calendar date string, `YYYY-MM-DD`.
    pub fn date_key(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// Julian Ephemeris Day of this moment.
    fn jde(&self) -> f64 {
        let minutes = (self.hour * 60 + self.minute) as f64 - self.utc_offset_minutes as f64;
        let jd_ut = astro::julian_day(self.year, self.month, self.day, minutes / 1440.0);
        let decimal_year = self.year as f64 + (self.month as f64 - 0.5) / 12.0;
        jd_ut + astro::delta_t_seconds(decimal_year) / 86_400.0
    }
}

impl fmt::Display for CalendarMoment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.utc_offset_minutes < 0 { '-' } else { '+' };
        let off = self.utc_offset_minutes.abs();
        write!(
            f,
            "{} {:02}:{:02} UTC{sign}{:02}:{:02}",
            self.date_key(),
            self.hour,
            self.minute,
            off / 60,
            off % 60
        )
    }
}

/// Pure timestamp → chart conversion. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarConversionEngine;

impl CalendarConversionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Convert a fully specified moment into its four pillars.
    pub fn convert(&self, moment: &CalendarMoment) -> AcquisitionResult<FourPillarSet> {
        moment.validate()?;

        let term = SolarTerm::containing(astro::apparent_solar_longitude(moment.jde()));
        let month_index = term.month_index();

        // January and February dates in the 子/丑 months precede 立春 and
        // still belong to the previous sexagenary year.
        let chart_year = if moment.month <= 2 && month_index >= 10 {
            moment.year - 1
        } else {
            moment.year
        };
        let year = Pillar::from_cycle_index((chart_year - 4).rem_euclid(60) as usize);

        let first_month_stem = (year.stem().index() % 5) * 2 + 2;
        let month = Pillar::new(
            Stem::from_index(first_month_stem + month_index),
            Branch::from_index(month_index + 2),
        )
        .ok_or_else(|| AcquisitionError::InvalidMoment("month pillar out of cycle".into()))?;

        let jdn = astro::julian_day_number(moment.year, moment.month, moment.day);
        let day_index = (jdn + 49).rem_euclid(60) as usize;
        let day = Pillar::from_cycle_index(day_index);

        let hour_branch = ((moment.hour as usize + 1) / 2) % 12;
        let hour_day_stem = if moment.hour == 23 {
            Pillar::from_cycle_index(day_index + 1).stem()
        } else {
            day.stem()
        };
        let hour = Pillar::new(
            Stem::from_index((hour_day_stem.index() % 5) * 2 + hour_branch),
            Branch::from_index(hour_branch),
        )
        .ok_or_else(|| AcquisitionError::InvalidMoment("hour pillar out of cycle".into()))?;

        tracing::debug!(%moment, term = term.name(), "converted moment locally");
        Ok(FourPillarSet::new(year, month, day, hour))
    }

    /// The solar term governing `moment`.
    pub fn solar_term(&self, moment: &CalendarMoment) -> AcquisitionResult<SolarTerm> {
        moment.validate()?;
        Ok(SolarTerm::containing(astro::apparent_solar_longitude(
            moment.jde(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> String {
        CalendarConversionEngine::new()
            .convert(&CalendarMoment::new(y, mo, d, h, mi))
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_golden_moment() {
        assert_eq!(chart(1987, 5, 20, 10, 30), "丁卯 乙巳 己巳 己巳");
    }

    #[test]
    fn test_deterministic() {
        let engine = CalendarConversionEngine::new();
        let m = CalendarMoment::new(1990, 1, 1, 13, 30);
        assert_eq!(engine.convert(&m).unwrap(), engine.convert(&m).unwrap());
    }

    #[test]
    fn test_millennium_noon() {
        // Before 立春, so still the 己卯 year and the 子 month.
        assert_eq!(chart(2000, 1, 1, 12, 0), "己卯 丙子 戊午 戊午");
    }

    #[test]
    fn test_late_zi_hour_takes_next_day_stem() {
        let c = chart(2000, 1, 1, 23, 30);
        assert_eq!(c, "己卯 丙子 戊午 甲子");
        // Midnight proper belongs to the next civil day.
        assert_eq!(chart(2000, 1, 2, 0, 30), "己卯 丙子 己未 甲子");
    }

    #[test]
    fn test_year_turns_at_spring_begins() {
        // 立春 2024-02-04 16:26:53 UTC+8.
        assert_eq!(chart(2024, 2, 4, 16, 24), "癸卯 乙丑 戊戌 庚申");
        assert!(chart(2024, 2, 4, 16, 28).starts_with("甲辰 丙寅 戊戌"));
        // 立春 2000-02-04 20:40:24 UTC+8.
        assert!(chart(2000, 2, 4, 20, 38).starts_with("己卯 丁丑"));
        assert!(chart(2000, 2, 4, 20, 42).starts_with("庚辰 戊寅"));
    }

    #[test]
    fn test_month_turns_at_term_minute() {
        // 驚蟄 2023-03-06 04:36:02 UTC+8.
        let before = CalendarConversionEngine::new()
            .convert(&CalendarMoment::new(2023, 3, 6, 4, 33))
            .unwrap();
        assert_eq!(before.month.code(), "甲寅");
        assert!(chart(2023, 3, 6, 4, 40).starts_with("癸卯 乙卯"));
        // 小寒 2023-01-05 23:04 UTC+8 opens 丑 month inside the 壬寅 year.
        assert!(chart(2023, 1, 5, 23, 0).starts_with("壬寅 壬子"));
        assert!(chart(2023, 1, 5, 23, 10).starts_with("壬寅 癸丑"));
    }

    #[test]
    fn test_utc_offset_shifts_boundary() {
        // 20:00 in UTC+8 is 12:00 UTC; 12:00 in UTC+0 is the same instant
        // for the year/month pillars but a different civil hour.
        let engine = CalendarConversionEngine::new();
        let utc = CalendarMoment::new(2024, 2, 4, 12, 0).with_utc_offset(0);
        assert_eq!(engine.convert(&utc).unwrap().year.code(), "甲辰");
    }

    #[test]
    fn test_rejects_out_of_range() {
        let engine = CalendarConversionEngine::new();
        for m in [
            CalendarMoment::new(2000, 13, 1, 0, 0),
            CalendarMoment::new(2000, 1, 32, 0, 0),
            CalendarMoment::new(2000, 1, 1, 24, 0),
            CalendarMoment::new(2000, 1, 1, 0, 60),
            CalendarMoment::new(2000, 0, 1, 0, 0),
            CalendarMoment::new(2023, 2, 29, 0, 0),
            CalendarMoment::new(0, 1, 1, 0, 0),
        ] {
            assert!(
                matches!(engine.convert(&m), Err(AcquisitionError::InvalidMoment(_))),
                "{m:?} should be rejected"
            );
        }
        assert!(engine.convert(&CalendarMoment::new(2024, 2, 29, 0, 0)).is_ok());
    }

    #[test]
    fn test_parse_formats() {
        let p = CalendarMoment::parse("1990-01-01 13:30").unwrap();
        assert_eq!(p.moment, CalendarMoment::new(1990, 1, 1, 13, 30));
        assert!(!p.default_time_used);

        let p = CalendarMoment::parse("1990/1/1").unwrap();
        assert_eq!(p.moment, CalendarMoment::new(1990, 1, 1, 12, 0));
        assert!(p.default_time_used);

        let p = CalendarMoment::parse("1990-01-01 7").unwrap();
        assert_eq!((p.moment.hour, p.moment.minute), (7, 0));
        assert!(!p.default_time_used);

        assert!(CalendarMoment::parse("01-01-1990").is_err());
        assert!(CalendarMoment::parse("1990-13-01").is_err());
    }

    #[test]
    fn test_solar_term_of_golden_moment() {
        let engine = CalendarConversionEngine::new();
        let term = engine
            .solar_term(&CalendarMoment::new(1987, 5, 20, 10, 30))
            .unwrap();
        // 立夏 or 小滿 depending on the exact instant; both lie in the 巳 month.
        assert_eq!(term.month_index(), 3);
    }

    #[test]
    fn test_from_datetime_keeps_offset() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let dt = chrono::TimeZone::with_ymd_and_hms(&tz, 2025, 1, 2, 0, 5, 59).unwrap();
        let m = CalendarMoment::from_datetime(&dt);
        assert_eq!(m, CalendarMoment::new(2025, 1, 2, 0, 5));
        assert_eq!(m.date_key(), "2025-01-02");
        assert_eq!(m.to_string(), "2025-01-02 00:05 UTC+08:00");
    }
}
