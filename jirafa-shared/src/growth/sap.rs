use serde::{Deserialize, Serialize};

use super::interpolate_rows;

/// One yearly row of the national standard: heights (cm) at the
/// 3rd, 10th, 25th, 50th, 75th, 90th and 97th percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SapRow {
    pub age_years: f64,
    pub percentiles: [f64; 7],
}

/// The national tables are published per completed year, so lookups use the
/// nearest lower row instead of interpolating.
pub(super) fn curves(rows: &[SapRow], age_years: f64) -> [f64; 7] {
    let (lo, _, _) = interpolate_rows(rows, age_years, |r| r.age_years);
    lo.percentiles
}

pub(super) const MALE: [SapRow; 20] = [
    SapRow {
        age_years: 0.0,
        percentiles: [46.2, 47.4, 48.6, 49.9, 51.2, 52.4, 53.6],
    },
    SapRow {
        age_years: 1.0,
        percentiles: [70.3, 71.9, 73.5, 75.3, 77.1, 78.7, 80.3],
    },
    SapRow {
        age_years: 2.0,
        percentiles: [80.3, 82.3, 84.3, 86.5, 88.7, 90.7, 92.7],
    },
    SapRow {
        age_years: 3.0,
        percentiles: [87.9, 90.3, 92.7, 95.3, 97.9, 100.3, 102.7],
    },
    SapRow {
        age_years: 4.0,
        percentiles: [94.1, 96.7, 99.4, 102.4, 105.4, 108.1, 110.7],
    },
    SapRow {
        age_years: 5.0,
        percentiles: [99.9, 102.8, 105.7, 109.0, 112.3, 115.2, 118.1],
    },
    SapRow {
        age_years: 6.0,
        percentiles: [105.2, 108.3, 111.4, 114.9, 118.4, 121.5, 124.6],
    },
    SapRow {
        age_years: 7.0,
        percentiles: [110.2, 113.5, 116.8, 120.5, 124.2, 127.5, 130.8],
    },
    SapRow {
        age_years: 8.0,
        percentiles: [115.2, 118.6, 122.1, 126.0, 129.9, 133.4, 136.8],
    },
    SapRow {
        age_years: 9.0,
        percentiles: [119.6, 123.3, 127.0, 131.2, 135.4, 139.1, 142.8],
    },
    SapRow {
        age_years: 10.0,
        percentiles: [123.9, 127.9, 131.9, 136.3, 140.7, 144.7, 148.7],
    },
    SapRow {
        age_years: 11.0,
        percentiles: [127.9, 132.3, 136.6, 141.5, 146.4, 150.7, 155.1],
    },
    SapRow {
        age_years: 12.0,
        percentiles: [132.5, 137.2, 142.1, 147.4, 152.7, 157.6, 162.3],
    },
    SapRow {
        age_years: 13.0,
        percentiles: [138.7, 143.6, 148.6, 154.2, 159.8, 164.8, 169.7],
    },
    SapRow {
        age_years: 14.0,
        percentiles: [146.1, 151.0, 155.9, 161.4, 166.9, 171.8, 176.7],
    },
    SapRow {
        age_years: 15.0,
        percentiles: [152.8, 157.4, 162.1, 167.3, 172.5, 177.2, 181.8],
    },
    SapRow {
        age_years: 16.0,
        percentiles: [157.4, 161.8, 166.3, 171.3, 176.3, 180.8, 185.2],
    },
    SapRow {
        age_years: 17.0,
        percentiles: [160.1, 164.5, 168.8, 173.7, 178.6, 182.9, 187.3],
    },
    SapRow {
        age_years: 18.0,
        percentiles: [161.0, 165.4, 169.7, 174.6, 179.5, 183.8, 188.2],
    },
    SapRow {
        age_years: 19.0,
        percentiles: [161.4, 165.8, 170.1, 175.0, 179.9, 184.2, 188.6],
    },
];

pub(super) const FEMALE: [SapRow; 20] = [
    SapRow {
        age_years: 0.0,
        percentiles: [45.5, 46.6, 47.8, 49.1, 50.4, 51.6, 52.7],
    },
    SapRow {
        age_years: 1.0,
        percentiles: [68.6, 70.2, 71.8, 73.6, 75.4, 77.0, 78.6],
    },
    SapRow {
        age_years: 2.0,
        percentiles: [78.9, 80.9, 82.9, 85.1, 87.3, 89.3, 91.3],
    },
    SapRow {
        age_years: 3.0,
        percentiles: [86.7, 89.2, 91.6, 94.3, 97.0, 99.4, 101.9],
    },
    SapRow {
        age_years: 4.0,
        percentiles: [93.5, 96.1, 98.8, 101.8, 104.8, 107.5, 110.1],
    },
    SapRow {
        age_years: 5.0,
        percentiles: [99.3, 102.2, 105.1, 108.4, 111.7, 114.6, 117.5],
    },
    SapRow {
        age_years: 6.0,
        percentiles: [104.3, 107.4, 110.5, 114.0, 117.5, 120.6, 123.7],
    },
    SapRow {
        age_years: 7.0,
        percentiles: [109.1, 112.5, 115.8, 119.6, 123.4, 126.7, 130.1],
    },
    SapRow {
        age_years: 8.0,
        percentiles: [114.1, 117.6, 121.3, 125.3, 129.3, 133.0, 136.5],
    },
    SapRow {
        age_years: 9.0,
        percentiles: [119.1, 122.9, 126.8, 131.1, 135.4, 139.3, 143.1],
    },
    SapRow {
        age_years: 10.0,
        percentiles: [124.1, 128.3, 132.4, 137.1, 141.8, 145.9, 150.1],
    },
    SapRow {
        age_years: 11.0,
        percentiles: [129.6, 134.0, 138.5, 143.4, 148.3, 152.8, 157.2],
    },
    SapRow {
        age_years: 12.0,
        percentiles: [135.7, 140.1, 144.6, 149.5, 154.4, 158.9, 163.3],
    },
    SapRow {
        age_years: 13.0,
        percentiles: [141.4, 145.6, 149.9, 154.6, 159.3, 163.6, 167.8],
    },
    SapRow {
        age_years: 14.0,
        percentiles: [145.4, 149.4, 153.5, 158.0, 162.5, 166.6, 170.6],
    },
    SapRow {
        age_years: 15.0,
        percentiles: [147.6, 151.6, 155.6, 160.0, 164.4, 168.4, 172.4],
    },
    SapRow {
        age_years: 16.0,
        percentiles: [148.5, 152.5, 156.5, 160.9, 165.3, 169.3, 173.3],
    },
    SapRow {
        age_years: 17.0,
        percentiles: [149.0, 153.0, 157.0, 161.4, 165.8, 169.8, 173.8],
    },
    SapRow {
        age_years: 18.0,
        percentiles: [149.2, 153.2, 157.2, 161.6, 166.0, 170.0, 174.0],
    },
    SapRow {
        age_years: 19.0,
        percentiles: [149.3, 153.3, 157.3, 161.7, 166.1, 170.1, 174.1],
    },
];
