//! The 24 solar terms.

use serde::Serialize;
use std::fmt;

const TERM_NAMES: [&str; 24] = [
    "立春", "雨水", "驚蟄", "春分", "清明", "穀雨", "立夏", "小滿", "芒種", "夏至", "小暑", "大暑",
    "立秋", "處暑", "白露", "秋分", "寒露", "霜降", "立冬", "小雪", "大雪", "冬至", "小寒", "大寒",
];

/// Longitude at which 立春 begins, and with it the sexagenary year.
pub const SPRING_BEGINS_LONGITUDE: f64 = 315.0;

/// One of the 24 solar terms, indexed from 立春.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SolarTerm(u8);

impl SolarTerm {
    /// The term in effect at apparent solar longitude `lambda` (degrees).
    pub fn containing(lambda: f64) -> Self {
        let offset = (lambda - SPRING_BEGINS_LONGITUDE).rem_euclid(360.0);
        Self(((offset / 15.0).floor() as u8).min(23))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        TERM_NAMES[self.index()]
    }

    /// Solar longitude at which this term begins.
    pub fn longitude(self) -> f64 {
        (SPRING_BEGINS_LONGITUDE + 15.0 * self.0 as f64).rem_euclid(360.0)
    }

    /// "Jie" terms open a new chart month; the others fall mid-month.
    pub fn opens_month(self) -> bool {
        self.0 % 2 == 0
    }

    /// Chart month this term falls in, 0 = 寅 month.
    pub fn month_index(self) -> usize {
        self.index() / 2
    }
}

impl fmt::Display for SolarTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
