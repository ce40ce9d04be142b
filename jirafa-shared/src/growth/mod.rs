//! Height-for-age percentile lookup against the two reference standards.
//!
//! Both standards boil down to seven percentile curves (3rd..97th) for a given
//! sex and age. A height is labelled with the nearest curve, or as `<3` /
//! `>97` when it falls outside the outermost curves. The OMS standard derives
//! the curves from median and SD (z-scores); the SAP standard tabulates them
//! directly.

mod age;
mod oms;
mod sap;

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Sex;

pub use age::{DAYS_PER_MONTH, age_in_months, age_years};
pub use oms::OmsRow;
pub use sap::SapRow;

/// Percentiles every curve set is expressed in, lowest first.
pub const PERCENTILES: [u8; 7] = [3, 10, 25, 50, 75, 90, 97];

/// Standard-normal quantiles matching [`PERCENTILES`].
pub const Z_SCORES: [f64; 7] = [-1.8808, -1.2816, -0.6745, 0.0, 0.6745, 1.2816, 1.8808];

static BUILTIN: LazyLock<GrowthStandards> = LazyLock::new(GrowthStandards::builtin);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standard {
    Oms,
    Sap,
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Standard::Oms => f.write_str("oms"),
            Standard::Sap => f.write_str("sap"),
        }
    }
}

/// Where a height falls relative to the percentile curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentileBand {
    Below(u8),
    At(u8),
    Above(u8),
}

impl PercentileBand {
    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PercentileBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PercentileBand::Below(p) => write!(f, "<{p}"),
            PercentileBand::At(p) => write!(f, "{p}"),
            PercentileBand::Above(p) => write!(f, ">{p}"),
        }
    }
}

/// Both standards applied to one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub oms: PercentileBand,
    pub sap: PercentileBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BySex<R> {
    pub male: Vec<R>,
    pub female: Vec<R>,
}

impl<R> BySex<R> {
    fn get(&self, sex: Sex) -> &[R] {
        match sex {
            Sex::Male => &self.male,
            Sex::Female => &self.female,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("{standard} table for {sex} is empty")]
    Empty { standard: Standard, sex: Sex },
    #[error("{standard} table for {sex}: ages must be non-negative and strictly ascending (row {row})")]
    Unordered {
        standard: Standard,
        sex: Sex,
        row: usize,
    },
    #[error("{standard} table for {sex}: row {row} has a non-positive or non-finite value")]
    BadValue {
        standard: Standard,
        sex: Sex,
        row: usize,
    },
    #[error("{standard} table for {sex}: percentiles of row {row} are not ascending")]
    Thresholds {
        standard: Standard,
        sex: Sex,
        row: usize,
    },
}

/// Reference data for both standards. Always validated: the only ways to
/// obtain one are [`GrowthStandards::builtin`], [`GrowthStandards::new`] and
/// deserialization, which goes through `new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TablesDef", into = "TablesDef")]
pub struct GrowthStandards {
    oms: BySex<OmsRow>,
    sap: BySex<SapRow>,
}

#[derive(Serialize, Deserialize)]
struct TablesDef {
    oms: BySex<OmsRow>,
    sap: BySex<SapRow>,
}

impl TryFrom<TablesDef> for GrowthStandards {
    type Error = TableError;
    fn try_from(value: TablesDef) -> Result<Self, Self::Error> {
        GrowthStandards::new(value.oms, value.sap)
    }
}

impl From<GrowthStandards> for TablesDef {
    fn from(value: GrowthStandards) -> Self {
        TablesDef {
            oms: value.oms,
            sap: value.sap,
        }
    }
}

impl GrowthStandards {
    pub fn new(oms: BySex<OmsRow>, sap: BySex<SapRow>) -> Result<Self, TableError> {
        let standards = GrowthStandards { oms, sap };
        standards.validate()?;
        Ok(standards)
    }

    /// The tables compiled into the binary.
    pub fn builtin() -> Self {
        GrowthStandards {
            oms: BySex {
                male: oms::MALE.to_vec(),
                female: oms::FEMALE.to_vec(),
            },
            sap: BySex {
                male: sap::MALE.to_vec(),
                female: sap::FEMALE.to_vec(),
            },
        }
    }

    pub fn validate(&self) -> Result<(), TableError> {
        for sex in [Sex::Male, Sex::Female] {
            let rows = self.oms.get(sex);
            check_ages(Standard::Oms, sex, rows.iter().map(|r| r.age_years))?;
            for (row, r) in rows.iter().enumerate() {
                if !(r.median.is_finite() && r.median > 0.0 && r.sd.is_finite() && r.sd > 0.0) {
                    return Err(TableError::BadValue {
                        standard: Standard::Oms,
                        sex,
                        row,
                    });
                }
            }

            let rows = self.sap.get(sex);
            check_ages(Standard::Sap, sex, rows.iter().map(|r| r.age_years))?;
            for (row, r) in rows.iter().enumerate() {
                if r.percentiles.iter().any(|p| !p.is_finite() || *p <= 0.0) {
                    return Err(TableError::BadValue {
                        standard: Standard::Sap,
                        sex,
                        row,
                    });
                }
                if r.percentiles.windows(2).any(|w| w[0] > w[1]) {
                    return Err(TableError::Thresholds {
                        standard: Standard::Sap,
                        sex,
                        row,
                    });
                }
            }
        }
        Ok(())
    }

    /// Heights of the seven percentile curves for `sex` at `age_years`.
    pub fn curves(&self, standard: Standard, sex: Sex, age_years: f64) -> [f64; 7] {
        match standard {
            Standard::Oms => oms::curves(self.oms.get(sex), age_years),
            Standard::Sap => sap::curves(self.sap.get(sex), age_years),
        }
    }

    pub fn percentile(
        &self,
        standard: Standard,
        sex: Sex,
        age_years: f64,
        height_cm: f64,
    ) -> PercentileBand {
        band_for(&self.curves(standard, sex, age_years), height_cm)
    }

    pub fn classify(&self, sex: Sex, age_years: f64, height_cm: f64) -> Classification {
        Classification {
            oms: self.percentile(Standard::Oms, sex, age_years, height_cm),
            sap: self.percentile(Standard::Sap, sex, age_years, height_cm),
        }
    }
}

impl Default for GrowthStandards {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Percentile band of `height_cm` against the built-in tables.
pub fn compute_percentile(
    standard: Standard,
    sex: Sex,
    age_years: f64,
    height_cm: f64,
) -> PercentileBand {
    BUILTIN.percentile(standard, sex, age_years, height_cm)
}

fn check_ages(
    standard: Standard,
    sex: Sex,
    ages: impl Iterator<Item = f64>,
) -> Result<(), TableError> {
    let mut prev: Option<f64> = None;
    let mut count = 0;
    for (row, age) in ages.enumerate() {
        count += 1;
        let ordered = age.is_finite() && age >= 0.0 && prev.is_none_or(|p| age > p);
        if !ordered {
            return Err(TableError::Unordered {
                standard,
                sex,
                row,
            });
        }
        prev = Some(age);
    }
    if count == 0 {
        return Err(TableError::Empty { standard, sex });
    }
    Ok(())
}

/// Finds the rows bracketing `age` and the interpolation weight between them.
/// Ages are clamped to the table range; `rows` must be non-empty and sorted.
fn interpolate_rows<R>(rows: &[R], age: f64, key: impl Fn(&R) -> f64) -> (&R, &R, f64) {
    let first = &rows[0];
    let last = &rows[rows.len() - 1];
    let age = age.max(key(first)).min(key(last));
    let idx = rows.partition_point(|r| key(r) <= age).max(1);
    let lo = &rows[idx - 1];
    let hi = rows.get(idx).unwrap_or(lo);
    let span = key(hi) - key(lo);
    let t = if span > 0.0 {
        (age - key(lo)) / span
    } else {
        0.0
    };
    (lo, hi, t)
}

fn band_for(curves: &[f64; 7], height_cm: f64) -> PercentileBand {
    if height_cm < curves[0] {
        return PercentileBand::Below(PERCENTILES[0]);
    }
    if height_cm > curves[6] {
        return PercentileBand::Above(PERCENTILES[6]);
    }
    // Strict `<` keeps the lower curve on ties.
    let mut best = 0;
    for i in 1..curves.len() {
        if (height_cm - curves[i]).abs() < (height_cm - curves[best]).abs() {
            best = i;
        }
    }
    PercentileBand::At(PERCENTILES[best])
}
