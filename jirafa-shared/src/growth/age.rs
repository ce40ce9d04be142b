use chrono::NaiveDate;

/// Average month length used to turn a day count into months.
pub const DAYS_PER_MONTH: f64 = 30.4;

/// Age in months between `birth` and `on`, rounded to two decimals.
/// Negative when `on` precedes `birth`; callers validate ordering first.
pub fn age_in_months(birth: NaiveDate, on: NaiveDate) -> f64 {
    let days = (on - birth).num_days() as f64;
    round2(days / DAYS_PER_MONTH)
}

/// Whole completed months expressed in years, the age key used for table
/// lookups (e.g. 12.9 months -> 1.0 years, 18.2 months -> 1.5 years).
pub fn age_years(age_months: f64) -> f64 {
    age_months.max(0.0).trunc() / 12.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
