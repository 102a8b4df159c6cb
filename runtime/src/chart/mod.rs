//! Stem-branch chart types.
//!
//! A [`Pillar`] is one member of the 60-combination sexagenary cycle and a
//! [`FourPillarSet`] is the ordered year/month/day/hour chart of one moment.
//! Both are immutable once constructed and can only be built from valid glyphs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The ten heavenly stems, in cycle order.
pub const STEM_GLYPHS: [char; 10] = ['甲', '乙', '丙', '丁', '戊', '己', '庚', '辛', '壬', '癸'];

/// The twelve earthly branches, in cycle order.
pub const BRANCH_GLYPHS: [char; 12] = [
    '子', '丑', '寅', '卯', '辰', '巳', '午', '未', '申', '酉', '戌', '亥',
];

/// Why a glyph string is not a pillar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GlyphError {
    #[error("expected two glyphs, got {0:?}")]
    Length(String),
    #[error("unknown stem glyph {0:?}")]
    UnknownStem(char),
    #[error("unknown branch glyph {0:?}")]
    UnknownBranch(char),
    #[error("{0:?} is not part of the sexagenary cycle")]
    OutOfCycle(String),
}

/// A heavenly stem, stored as its index into [`STEM_GLYPHS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stem(u8);

impl Stem {
    /// Stem at `index`, wrapping modulo 10.
    pub fn from_index(index: usize) -> Self {
        Self((index % STEM_GLYPHS.len()) as u8)
    }

    pub fn from_glyph(glyph: char) -> Option<Self> {
        STEM_GLYPHS
            .iter()
            .position(|&g| g == glyph)
            .map(|i| Self(i as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn glyph(self) -> char {
        STEM_GLYPHS[self.index()]
    }
}

/// An earthly branch, stored as its index into [`BRANCH_GLYPHS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Branch(u8);

impl Branch {
    /// Branch at `index`, wrapping modulo 12.
    pub fn from_index(index: usize) -> Self {
        Self((index % BRANCH_GLYPHS.len()) as u8)
    }

    pub fn from_glyph(glyph: char) -> Option<Self> {
        BRANCH_GLYPHS
            .iter()
            .position(|&g| g == glyph)
            .map(|i| Self(i as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn glyph(self) -> char {
        BRANCH_GLYPHS[self.index()]
    }
}

/// One stem+branch pair of the sexagenary cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pillar {
    stem: Stem,
    branch: Branch,
}

impl Pillar {
    /// Build the pillar at position `index` of the 60-cycle (0 = 甲子).
    pub fn from_cycle_index(index: usize) -> Self {
        let index = index % 60;
        Self {
            stem: Stem::from_index(index),
            branch: Branch::from_index(index),
        }
    }

    /// Pair a stem with a branch. Returns `None` for mismatched parity,
    /// which never occurs in the cycle.
    pub fn new(stem: Stem, branch: Branch) -> Option<Self> {
        if stem.index() % 2 == branch.index() % 2 {
            Some(Self { stem, branch })
        } else {
            None
        }
    }

    /// Parse a two-glyph code such as `"甲子"`. Surrounding whitespace is ignored.
    pub fn parse(code: &str) -> Result<Self, GlyphError> {
        let trimmed = code.trim();
        let mut chars = trimmed.chars();
        let (Some(s), Some(b), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(GlyphError::Length(trimmed.to_string()));
        };
        let stem = Stem::from_glyph(s).ok_or(GlyphError::UnknownStem(s))?;
        let branch = Branch::from_glyph(b).ok_or(GlyphError::UnknownBranch(b))?;
        Self::new(stem, branch).ok_or_else(|| GlyphError::OutOfCycle(trimmed.to_string()))
    }

    pub fn stem(&self) -> Stem {
        self.stem
    }

    pub fn branch(&self) -> Branch {
        self.branch
    }

    /// Position of this pillar in the 60-cycle.
    pub fn cycle_index(&self) -> usize {
        // Chinese remainder over (10, 12): the unique i < 60 with
        // i ≡ stem (mod 10) and i ≡ branch (mod 12).
        (0..6)
            .map(|k| self.stem.index() + 10 * k)
            .find(|i| i % 12 == self.branch.index())
            .unwrap_or(0)
    }

    pub fn code(&self) -> String {
        let mut s = String::with_capacity(6);
        s.push(self.stem.glyph());
        s.push(self.branch.glyph());
        s
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.stem.glyph(), self.branch.glyph())
    }
}

impl FromStr for Pillar {
    type Err = GlyphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Pillar {
    type Error = GlyphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pillar> for String {
    fn from(p: Pillar) -> Self {
        p.code()
    }
}

/// The ordered year/month/day/hour chart of one calendar moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FourPillarSet {
    pub year: Pillar,
    pub month: Pillar,
    pub day: Pillar,
    pub hour: Pillar,
}

impl FourPillarSet {
    pub fn new(year: Pillar, month: Pillar, day: Pillar, hour: Pillar) -> Self {
        Self {
            year,
            month,
            day,
            hour,
        }
    }

    /// Build a chart from exactly four pillars in year/month/day/hour order.
    pub fn from_slice(pillars: &[Pillar]) -> Option<Self> {
        match pillars {
            [year, month, day, hour] => Some(Self::new(*year, *month, *day, *hour)),
            _ => None,
        }
    }

    pub fn pillars(&self) -> [Pillar; 4] {
        [self.year, self.month, self.day, self.hour]
    }

    /// The four two-glyph codes, year first.
    pub fn codes(&self) -> [String; 4] {
        self.pillars().map(|p| p.code())
    }
}

impl fmt::Display for FourPillarSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.year, self.month, self.day, self.hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_index_roundtrip() {
        for i in 0..60 {
            assert_eq!(Pillar::from_cycle_index(i).cycle_index(), i);
        }
        assert_eq!(Pillar::from_cycle_index(0).code(), "甲子");
        assert_eq!(Pillar::from_cycle_index(59).code(), "癸亥");
        assert_eq!(Pillar::from_cycle_index(60), Pillar::from_cycle_index(0));
    }

    #[test]
    fn test_parse_valid() {
        let p = Pillar::parse(" 丁卯 ").unwrap();
        assert_eq!(p.stem().glyph(), '丁');
        assert_eq!(p.branch().glyph(), '卯');
        assert_eq!(p.to_string(), "丁卯");
    }

    #[test]
    fn test_parse_rejects_foreign_content() {
        assert_eq!(Pillar::parse("甲"), Err(GlyphError::Length("甲".into())));
        assert_eq!(Pillar::parse("甲子丑"), Err(GlyphError::Length("甲子丑".into())));
        assert_eq!(Pillar::parse("年子"), Err(GlyphError::UnknownStem('年')));
        assert_eq!(Pillar::parse("甲柱"), Err(GlyphError::UnknownBranch('柱')));
        assert_eq!(Pillar::parse("甲丑"), Err(GlyphError::OutOfCycle("甲丑".into())));
    }

    #[test]
    fn test_four_pillar_set_from_slice() {
        let p: Vec<Pillar> = ["丁卯", "乙巳", "己巳", "己巳"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let set = FourPillarSet::from_slice(&p).unwrap();
        assert_eq!(set.to_string(), "丁卯 乙巳 己巳 己巳");
        assert!(FourPillarSet::from_slice(&p[..3]).is_none());
    }

    #[test]
    fn test_serde_as_codes() {
        let set = FourPillarSet::new(
            Pillar::from_cycle_index(3),
            Pillar::from_cycle_index(41),
            Pillar::from_cycle_index(5),
            Pillar::from_cycle_index(5),
        );
        let json = serde_json::to_value(set).unwrap();
        assert_eq!(json["year"], "丁卯");
        assert_eq!(json["month"], "乙巳");
        let back: FourPillarSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);

        let bad = serde_json::json!({"year": "甲丑", "month": "乙巳", "day": "己巳", "hour": "己巳"});
        assert!(serde_json::from_value::<FourPillarSet>(bad).is_err());
    }
}
