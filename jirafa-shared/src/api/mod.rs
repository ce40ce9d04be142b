use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Sex, double_option};

pub mod endpoints;

pub const API_V1_PREFIX: &str = "/api/v1";

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResp {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResp {
    pub username: String,
}

/// Token that lets a kid act on its own profile.
#[derive(Debug, Serialize, Deserialize)]
pub struct KidSessionResp {
    pub token: String,
    pub username: String,
}

// Kids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KidDto {
    pub username: String,
    pub name: String,
    pub birthdate: NaiveDate,
    pub sex: Sex,
    pub premature_date: Option<NaiveDate>,
}

/// Fields are optional so missing ones are reported per field instead of
/// failing the whole body. Dates are strings in any of
/// [`crate::domain::DATE_INPUT_FORMATS`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateKidReq {
    pub name: Option<String>,
    pub birthdate: Option<String>,
    #[serde(alias = "gender")]
    pub sex: Option<String>,
    pub premature_date: Option<String>,
}

/// Partial update; absent fields are left untouched and
/// `"premature_date": null` clears the adjustment date.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateKidReq {
    pub name: Option<String>,
    pub birthdate: Option<String>,
    #[serde(alias = "gender")]
    pub sex: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub premature_date: Option<Option<String>>,
}

// Heights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightDto {
    pub id: i32,
    pub height: i32,
    pub date_height: NaiveDate,
    pub age_height: f64, // months
    pub percentile_oms: String,
    pub percentile_sap: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateHeightReq {
    pub height: Option<f64>, // cm
    pub date_height: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateHeightReq {
    pub height: Option<f64>,
    pub date_height: Option<String>,
}

/// Kid profile plus its measurements ordered by `date_height`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDto {
    pub kid: KidDto,
    pub data: Vec<HeightDto>,
}
