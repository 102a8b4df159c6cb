//! Solar theory: Julian days, ΔT and the Sun's apparent longitude.
//!
//! The Sun's position comes from the abridged VSOP87 Earth series (heliocentric
//! longitude, radius vector), reduced to the FK5 frame and corrected for
//! nutation and aberration. Longitudes are good to about one arcsecond, which
//! places solar-term instants within half a minute of their true times.

/// One periodic term `A·cos(B + C·τ)`.
type Term = (f64, f64, f64);

const EARTH_L0: &[Term] = &[
    (175_347_046.0, 0.0, 0.0),
    (3_341_656.0, 4.669_256_8, 6_283.075_85),
    (34_894.0, 4.6261, 12_566.1517),
    (3_497.0, 2.7441, 5_753.3849),
    (3_418.0, 2.8289, 3.5231),
    (3_136.0, 3.6277, 77_713.7715),
    (2_676.0, 4.4181, 7_860.4194),
    (2_343.0, 6.1352, 3_930.2097),
    (1_324.0, 0.7425, 11_506.7698),
    (1_273.0, 2.0371, 529.691),
    (1_199.0, 1.1096, 1_577.3435),
    (990.0, 5.233, 5_884.927),
    (902.0, 2.045, 26.298),
    (857.0, 3.508, 398.149),
    (780.0, 1.179, 5_223.694),
    (753.0, 2.533, 5_507.553),
    (505.0, 4.583, 18_849.228),
    (492.0, 4.205, 775.523),
    (357.0, 2.92, 0.067),
    (317.0, 5.849, 11_790.629),
    (284.0, 1.899, 796.298),
    (271.0, 0.315, 10_977.079),
    (243.0, 0.345, 5_486.778),
    (206.0, 4.806, 2_544.314),
    (205.0, 1.869, 5_573.143),
    (202.0, 2.458, 6_069.777),
    (156.0, 0.833, 213.299),
    (132.0, 3.411, 2_942.463),
    (126.0, 1.083, 20.775),
    (115.0, 0.645, 0.98),
    (103.0, 0.636, 4_694.003),
    (102.0, 0.976, 15_720.839),
    (102.0, 4.267, 7.114),
    (99.0, 6.21, 2_146.17),
    (98.0, 0.68, 155.42),
    (86.0, 5.98, 161_000.69),
    (85.0, 1.3, 6_275.96),
    (85.0, 3.67, 71_430.7),
    (80.0, 1.81, 17_260.15),
    (79.0, 3.04, 12_036.46),
    (75.0, 1.76, 5_088.63),
    (74.0, 3.5, 3_154.69),
    (74.0, 4.68, 801.82),
    (70.0, 0.83, 9_437.76),
    (62.0, 3.98, 8_827.39),
    (61.0, 1.82, 7_084.9),
    (57.0, 2.78, 6_286.6),
    (56.0, 4.39, 14_143.5),
    (56.0, 3.47, 6_279.55),
    (52.0, 0.19, 12_139.55),
    (52.0, 1.33, 1_748.02),
    (51.0, 0.28, 5_856.48),
    (49.0, 0.49, 1_194.45),
    (41.0, 5.37, 8_429.24),
    (41.0, 2.4, 19_651.05),
    (39.0, 6.17, 10_447.39),
    (37.0, 6.04, 10_213.29),
    (37.0, 2.57, 1_059.38),
    (36.0, 1.71, 2_352.87),
    (36.0, 1.78, 6_812.77),
    (33.0, 0.59, 17_789.85),
    (30.0, 0.44, 83_996.85),
    (30.0, 2.74, 1_349.87),
    (25.0, 3.16, 4_690.48),
];

const EARTH_L1: &[Term] = &[
    (628_331_966_747.0, 0.0, 0.0),
    (206_059.0, 2.678_235, 6_283.075_85),
    (4_303.0, 2.6351, 12_566.1517),
    (425.0, 1.59, 3.523),
    (119.0, 5.796, 26.298),
    (109.0, 2.966, 1_577.344),
    (93.0, 2.59, 18_849.23),
    (72.0, 1.14, 529.69),
    (68.0, 1.87, 398.15),
    (67.0, 4.41, 5_507.55),
    (59.0, 2.89, 5_223.69),
    (56.0, 2.17, 155.42),
    (45.0, 0.4, 796.3),
    (36.0, 0.47, 775.52),
    (29.0, 2.65, 7.11),
    (21.0, 5.34, 0.98),
    (19.0, 1.85, 5_486.78),
    (19.0, 4.97, 213.3),
    (17.0, 2.99, 6_275.96),
    (16.0, 0.03, 2_544.31),
    (16.0, 1.43, 2_146.17),
    (15.0, 1.21, 10_977.08),
    (12.0, 2.83, 1_748.02),
    (12.0, 3.26, 5_088.63),
    (12.0, 5.27, 1_194.45),
    (12.0, 2.08, 4_694.0),
    (11.0, 0.77, 553.57),
    (10.0, 1.3, 6_286.6),
    (10.0, 4.24, 1_349.87),
    (9.0, 2.7, 242.73),
    (9.0, 5.64, 951.72),
    (8.0, 5.3, 2_352.87),
    (6.0, 2.65, 9_437.76),
    (6.0, 4.67, 4_690.48),
];

const EARTH_L2: &[Term] = &[
    (52_919.0, 0.0, 0.0),
    (8_720.0, 1.0721, 6_283.0758),
    (309.0, 0.867, 12_566.152),
    (27.0, 0.05, 3.52),
    (16.0, 5.19, 26.3),
    (16.0, 3.68, 155.42),
    (10.0, 0.76, 18_849.23),
    (9.0, 2.06, 77_713.77),
    (7.0, 0.83, 775.52),
    (5.0, 4.66, 1_577.34),
    (4.0, 1.03, 7.11),
    (4.0, 3.44, 5_573.14),
    (3.0, 5.14, 796.3),
    (3.0, 6.05, 5_507.55),
    (3.0, 1.19, 242.73),
    (3.0, 6.12, 529.69),
    (3.0, 0.31, 398.15),
    (3.0, 2.28, 553.57),
    (2.0, 4.38, 5_223.69),
    (2.0, 3.75, 0.98),
];

const EARTH_L3: &[Term] = &[
    (289.0, 5.844, 6_283.076),
    (35.0, 0.0, 0.0),
    (17.0, 5.49, 12_566.15),
    (3.0, 5.2, 155.42),
    (1.0, 4.72, 3.52),
    (1.0, 5.3, 18_849.23),
    (1.0, 5.97, 242.73),
];

const EARTH_L4: &[Term] = &[
    (114.0, 3.142, 0.0),
    (8.0, 4.13, 6_283.08),
    (1.0, 3.84, 12_566.15),
];

const EARTH_L5: &[Term] = &[(1.0, 3.14, 0.0)];

// Radius vector, truncated harder: it only scales the aberration.
const EARTH_R0: &[Term] = &[
    (100_013_989.0, 0.0, 0.0),
    (1_670_700.0, 3.098_463_5, 6_283.075_85),
    (13_956.0, 3.055_25, 12_566.1517),
    (3_084.0, 5.1985, 77_713.7715),
    (1_628.0, 1.1739, 5_753.3849),
    (1_576.0, 2.8469, 7_860.4194),
    (925.0, 5.453, 11_506.77),
    (542.0, 4.564, 3_930.21),
    (472.0, 3.661, 5_884.927),
    (346.0, 0.964, 5_507.553),
];

const EARTH_R1: &[Term] = &[
    (103_019.0, 1.107_49, 6_283.075_85),
    (1_721.0, 1.0644, 12_566.1517),
    (702.0, 3.142, 0.0),
];

const EARTH_R2: &[Term] = &[(4_359.0, 5.7846, 6_283.0758), (124.0, 5.579, 12_566.152)];

const ARCSEC: f64 = 1.0 / 3600.0;

/// Julian Day (fractional, UT) for a proleptic Gregorian date.
pub fn julian_day(year: i32, month: u32, day: u32, day_fraction: f64) -> f64 {
    let (y, m) = if month <= 2 {
        (year as f64 - 1.0, month as f64 + 12.0)
    } else {
        (year as f64, month as f64)
    };
    let a = (y / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (y + 4716.0)).floor() + (30.6001 * (m + 1.0)).floor() + day as f64 + day_fraction + b
        - 1524.5
}

/// Julian Day Number (integer, noon-based) of a civil date.
pub fn julian_day_number(year: i32, month: u32, day: u32) -> i64 {
    let a = (14 - month as i64) / 12;
    let y = year as i64 + 4800 - a;
    let m = month as i64 + 12 * a - 3;
    day as i64 + (153 * m + 2) / 5 + 365 * y + y / 4 - y / 100 + y / 400 - 32045
}

/// ΔT = TT − UT in seconds (Espenak-Meeus polynomial fits).
pub fn delta_t_seconds(decimal_year: f64) -> f64 {
    let y = decimal_year;
    let long_term = |y: f64| {
        let u = (y - 1820.0) / 100.0;
        -20.0 + 32.0 * u * u
    };
    match y {
        y if y < 1600.0 => long_term(y),
        y if y < 1700.0 => {
            let t = y - 1600.0;
            120.0 - 0.9808 * t - 0.01532 * t * t + t.powi(3) / 7129.0
        }
        y if y < 1800.0 => {
            let t = y - 1700.0;
            8.83 + 0.1603 * t - 0.005_928_5 * t * t + 0.000_133_36 * t.powi(3)
                - t.powi(4) / 1_174_000.0
        }
        y if y < 1860.0 => {
            let t = y - 1800.0;
            13.72 - 0.332_447 * t + 0.006_861_2 * t * t + 0.004_111_6 * t.powi(3)
                - 0.000_374_36 * t.powi(4)
                + 0.000_012_127_2 * t.powi(5)
                - 0.000_000_169_9 * t.powi(6)
                + 0.000_000_000_875 * t.powi(7)
        }
        y if y < 1900.0 => {
            let t = y - 1860.0;
            7.62 + 0.5737 * t - 0.251_754 * t * t + 0.016_806_68 * t.powi(3)
                - 0.000_447_362_4 * t.powi(4)
                + t.powi(5) / 233_174.0
        }
        y if y < 1920.0 => {
            let t = y - 1900.0;
            -2.79 + 1.494_119 * t - 0.059_893_9 * t * t + 0.006_196_6 * t.powi(3)
                - 0.000_197 * t.powi(4)
        }
        y if y < 1941.0 => {
            let t = y - 1920.0;
            21.20 + 0.844_93 * t - 0.076_100 * t * t + 0.002_093_6 * t.powi(3)
        }
        y if y < 1961.0 => {
            let t = y - 1950.0;
            29.07 + 0.407 * t - t * t / 233.0 + t.powi(3) / 2547.0
        }
        y if y < 1986.0 => {
            let t = y - 1975.0;
            45.45 + 1.067 * t - t * t / 260.0 - t.powi(3) / 718.0
        }
        y if y < 2005.0 => {
            let t = y - 2000.0;
            63.86 + 0.3345 * t - 0.060_374 * t * t
                + 0.001_727_5 * t.powi(3)
                + 0.000_651_814 * t.powi(4)
                + 0.000_023_735_99 * t.powi(5)
        }
        y if y < 2050.0 => {
            let t = y - 2000.0;
            62.92 + 0.322_17 * t + 0.005_589 * t * t
        }
        y if y < 2150.0 => long_term(y) - 0.5628 * (2150.0 - y),
        y => long_term(y),
    }
}

fn series(terms: &[Term], tau: f64) -> f64 {
    terms.iter().map(|&(a, b, c)| a * (b + c * tau).cos()).sum()
}

/// `Σ seriesᵢ(τ)·τⁱ`, scaled from 1e-8 units.
fn power_series(series_set: &[&[Term]], tau: f64) -> f64 {
    series_set
        .iter()
        .rev()
        .fold(0.0, |acc, terms| acc * tau + series(terms, tau))
        / 1e8
}

/// Nutation in longitude, arcseconds (0.5" series).
fn nutation_in_longitude(t: f64) -> f64 {
    let omega = (125.044_52 - 1_934.136_261 * t + 0.002_070_8 * t * t + t.powi(3) / 450_000.0)
        .to_radians();
    let sun = (280.4665 + 36_000.7698 * t).to_radians();
    let moon = (218.3165 + 481_267.8813 * t).to_radians();
    -17.20 * omega.sin() - 1.32 * (2.0 * sun).sin() - 0.23 * (2.0 * moon).sin()
        + 0.21 * (2.0 * omega).sin()
}

/// Apparent geocentric ecliptic longitude of the Sun, degrees in `[0, 360)`,
/// at Julian Ephemeris Day `jde`.
pub fn apparent_solar_longitude(jde: f64) -> f64 {
    let tau = (jde - 2_451_545.0) / 365_250.0;
    let t = tau * 10.0;

    let heliocentric = power_series(
        &[EARTH_L0, EARTH_L1, EARTH_L2, EARTH_L3, EARTH_L4, EARTH_L5],
        tau,
    )
    .to_degrees();
    let radius = power_series(&[EARTH_R0, EARTH_R1, EARTH_R2], tau);

    // Geocentric, then FK5 (only the longitude correction survives here).
    let geometric = heliocentric + 180.0 - 0.090_33 * ARCSEC;
    let aberration = -20.4898 * ARCSEC / radius;
    let apparent = geometric + nutation_in_longitude(t) * ARCSEC + aberration;
    apparent.rem_euclid(360.0)
}
