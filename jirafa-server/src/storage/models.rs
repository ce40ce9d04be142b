use crate::storage::schema::{kid_heights, kids, sessions, users};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use jirafa_shared::domain::{Sex, UnknownSex};

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
#[diesel(primary_key(username))]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub jti: &'a str,
    pub username: &'a str,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = kids)]
pub struct Kid {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub birthdate: NaiveDate,
    pub sex: String,
    pub premature_date: Option<NaiveDate>,
    /// Username of the owning parent account.
    pub parent: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Kid {
    pub fn parsed_sex(&self) -> Result<Sex, UnknownSex> {
        self.sex.parse()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = kids)]
pub struct NewKid {
    pub username: String,
    pub name: String,
    pub birthdate: NaiveDate,
    pub sex: String,
    pub premature_date: Option<NaiveDate>,
    pub parent: String,
}

/// Partial kid update; `None` leaves a column as is. For `premature_date`,
/// `Some(None)` writes NULL.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = kids)]
pub struct KidChanges {
    pub name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub sex: Option<String>,
    pub premature_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = kid_heights)]
#[diesel(belongs_to(Kid, foreign_key = kid_id))]
pub struct KidHeight {
    pub id: i32,
    pub kid_id: i32,
    pub height: i32,
    pub date_height: NaiveDate,
    pub age_height: f64,
    pub percentile_oms: String,
    pub percentile_sap: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Everything derived for one measurement. Used both to insert a record and
/// to rewrite one after a patch.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = kid_heights)]
pub struct HeightValues {
    pub height: i32,
    pub date_height: NaiveDate,
    pub age_height: f64,
    pub percentile_oms: String,
    pub percentile_sap: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = kid_heights)]
pub struct NewKidHeight {
    pub kid_id: i32,
    #[diesel(embed)]
    pub values: HeightValues,
}
