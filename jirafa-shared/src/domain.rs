use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Date layouts accepted on input, tried in order. Output is always `%Y-%m-%d`.
pub const DATE_INPUT_FORMATS: [&str; 3] = ["%d/%m/%Y", "%Y-%m-%d", "%Y/%m/%d"];

pub const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d";

/// Minimum plausible height in centimeters; anything below is assumed to be
/// in the wrong unit.
pub const MIN_HEIGHT_CM: f64 = 20.0;

/// Upper bound for a plausible height in centimeters.
pub const MAX_HEIGHT_CM: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }

    /// Single-letter tag used in generated kid usernames.
    pub fn initial(self) -> char {
        match self {
            Sex::Male => 'm',
            Sex::Female => 'f',
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sex: {0}")]
pub struct UnknownSex(pub String);

impl FromStr for Sex {
    type Err = UnknownSex;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            _ => Err(UnknownSex(s.to_string())),
        }
    }
}

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_OUTPUT_FORMAT).to_string()
}

/// Builds `kid_{xx}_{s}{nnnnn}` from the first two characters of the name,
/// the sex initial and a five digit suffix.
///
/// The name prefix goes through `slug` so the result is always URL-safe;
/// names that slugify to nothing fall back to `"xx"`.
pub fn kid_username(name: &str, sex: Sex, suffix: u32) -> String {
    let head: String = name.trim().chars().take(2).collect();
    let mut prefix = slug::slugify(head).replace('-', "");
    if prefix.is_empty() {
        prefix.push_str("xx");
    }
    format!("kid_{}_{}{:05}", prefix, sex.initial(), suffix % 100_000)
}

/// Deserializes a field that distinguishes "absent" (`None`) from an explicit
/// `null` (`Some(None)`). Use together with `#[serde(default)]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
