use serde::{Deserialize, Serialize};

use super::{Z_SCORES, interpolate_rows};

/// One yearly row of the international height-for-age standard.
///
/// Height is treated as normally distributed at each age, so the percentile
/// curves are `median + z * sd`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OmsRow {
    pub age_years: f64,
    pub median: f64,
    pub sd: f64,
}

/// Percentile curves at `age_years`, interpolating median and SD linearly
/// between the bracketing rows. Ages outside the table clamp to its ends.
pub(super) fn curves(rows: &[OmsRow], age_years: f64) -> [f64; 7] {
    let (lo, hi, t) = interpolate_rows(rows, age_years, |r| r.age_years);
    let median = lo.median + (hi.median - lo.median) * t;
    let sd = lo.sd + (hi.sd - lo.sd) * t;
    Z_SCORES.map(|z| median + z * sd)
}

#[rustfmt::skip]
pub(super) const MALE: [OmsRow; 20] = [
    OmsRow { age_years: 0.0, median: 49.9, sd: 1.89 },
    OmsRow { age_years: 1.0, median: 75.7, sd: 2.6 },
    OmsRow { age_years: 2.0, median: 87.1, sd: 3.2 },
    OmsRow { age_years: 3.0, median: 96.1, sd: 3.8 },
    OmsRow { age_years: 4.0, median: 103.3, sd: 4.3 },
    OmsRow { age_years: 5.0, median: 110.0, sd: 4.7 },
    OmsRow { age_years: 6.0, median: 116.0, sd: 5.0 },
    OmsRow { age_years: 7.0, median: 121.7, sd: 5.3 },
    OmsRow { age_years: 8.0, median: 127.3, sd: 5.6 },
    OmsRow { age_years: 9.0, median: 132.6, sd: 6.0 },
    OmsRow { age_years: 10.0, median: 137.8, sd: 6.4 },
    OmsRow { age_years: 11.0, median: 143.1, sd: 7.0 },
    OmsRow { age_years: 12.0, median: 149.1, sd: 7.7 },
    OmsRow { age_years: 13.0, median: 156.0, sd: 8.0 },
    OmsRow { age_years: 14.0, median: 163.2, sd: 7.9 },
    OmsRow { age_years: 15.0, median: 169.0, sd: 7.5 },
    OmsRow { age_years: 16.0, median: 172.9, sd: 7.2 },
    OmsRow { age_years: 17.0, median: 175.2, sd: 7.0 },
    OmsRow { age_years: 18.0, median: 176.1, sd: 7.0 },
    OmsRow { age_years: 19.0, median: 176.5, sd: 7.0 },
];

#[rustfmt::skip]
pub(super) const FEMALE: [OmsRow; 20] = [
    OmsRow { age_years: 0.0, median: 49.1, sd: 1.86 },
    OmsRow { age_years: 1.0, median: 74.0, sd: 2.6 },
    OmsRow { age_years: 2.0, median: 85.7, sd: 3.2 },
    OmsRow { age_years: 3.0, median: 95.1, sd: 3.9 },
    OmsRow { age_years: 4.0, median: 102.7, sd: 4.3 },
    OmsRow { age_years: 5.0, median: 109.4, sd: 4.7 },
    OmsRow { age_years: 6.0, median: 115.1, sd: 5.0 },
    OmsRow { age_years: 7.0, median: 120.8, sd: 5.4 },
    OmsRow { age_years: 8.0, median: 126.6, sd: 5.8 },
    OmsRow { age_years: 9.0, median: 132.5, sd: 6.2 },
    OmsRow { age_years: 10.0, median: 138.6, sd: 6.7 },
    OmsRow { age_years: 11.0, median: 145.0, sd: 7.1 },
    OmsRow { age_years: 12.0, median: 151.2, sd: 7.1 },
    OmsRow { age_years: 13.0, median: 156.4, sd: 6.8 },
    OmsRow { age_years: 14.0, median: 159.8, sd: 6.5 },
    OmsRow { age_years: 15.0, median: 161.7, sd: 6.4 },
    OmsRow { age_years: 16.0, median: 162.5, sd: 6.4 },
    OmsRow { age_years: 17.0, median: 162.9, sd: 6.4 },
    OmsRow { age_years: 18.0, median: 163.1, sd: 6.4 },
    OmsRow { age_years: 19.0, median: 163.2, sd: 6.4 },
];
