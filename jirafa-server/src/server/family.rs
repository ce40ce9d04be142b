//! Family access controller: who may see or change a kid, and the CRUD
//! flows for kids and their height measurements.
//!
//! Everything here takes the resolved caller and store as arguments, so it
//! runs the same against SQLite and against the in-memory stores used in
//! tests.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use jirafa_shared::api::{CreateHeightReq, CreateKidReq, UpdateHeightReq, UpdateKidReq};
use jirafa_shared::auth::Role;
use jirafa_shared::domain::{self, MAX_HEIGHT_CM, MIN_HEIGHT_CM, Sex};
use jirafa_shared::growth::{self, GrowthStandards};
use jirafa_shared::jwt::JwtClaims;
use serde::Serialize;
use tracing::{debug, info, warn};
use rand::Rng;

use crate::storage::models::{HeightValues, Kid, KidChanges, KidHeight, NewKid};
use crate::storage::{FamilyStore, Page, StorageError};

/// How many random suffixes to try before giving up on a kid username.
const USERNAME_ATTEMPTS: usize = 5;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const BEFORE_BIRTH: &str = "The measurement cannot be earlier than the date of birth.";

/// The authenticated identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub username: String,
    pub role: Role,
}

impl Caller {
    pub fn parent(username: impl Into<String>) -> Self {
        Caller {
            username: username.into(),
            role: Role::Parent,
        }
    }

    pub fn kid(username: impl Into<String>) -> Self {
        Caller {
            username: username.into(),
            role: Role::Kid,
        }
    }
}

impl From<&JwtClaims> for Caller {
    fn from(claims: &JwtClaims) -> Self {
        Caller {
            username: claims.sub.clone(),
            role: claims.role,
        }
    }
}

/// A kid is owned by its parent account and by its own kid-scoped identity.
pub fn is_owner_of(kid: &Kid, caller: &Caller) -> bool {
    match caller.role {
        Role::Parent => kid.parent == caller.username,
        Role::Kid => kid.username == caller.username,
    }
}

/// Per-field validation messages, keyed by request field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn check(self) -> Result<(), FamilyError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(FamilyError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for m in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{field}: {m}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FamilyError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("inconsistent record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Kid and height operations on behalf of one caller.
pub struct FamilyAccess<'a, S> {
    store: &'a S,
    standards: &'a GrowthStandards,
}

impl<'a, S: FamilyStore> FamilyAccess<'a, S> {
    pub fn new(store: &'a S, standards: &'a GrowthStandards) -> Self {
        FamilyAccess { store, standards }
    }

    /// Kids of `username`, oldest first. Only the account itself may list.
    pub async fn list_family(
        &self,
        caller: &Caller,
        username: &str,
        page: Page,
    ) -> Result<Vec<Kid>, FamilyError> {
        self.ensure_family_caller(caller, username).await?;
        Ok(self.store.list_kids_by_parent(username, page).await?)
    }

    /// Registers a kid under `username`, generating its unique username.
    pub async fn create_kid(
        &self,
        caller: &Caller,
        username: &str,
        req: CreateKidReq,
    ) -> Result<Kid, FamilyError> {
        self.ensure_family_caller(caller, username).await?;
        let fields = validate_new_kid(req)?;

        for attempt in 1..=USERNAME_ATTEMPTS {
            let kid_username = domain::kid_username(&fields.name, fields.sex, random_suffix());
            let new_kid = NewKid {
                username: kid_username.clone(),
                name: fields.name.clone(),
                birthdate: fields.birthdate,
                sex: fields.sex.as_str().to_string(),
                premature_date: fields.premature_date,
                parent: username.to_string(),
            };
            match self.store.create_kid(new_kid).await {
                Ok(kid) => {
                    info!(kid = %kid.username, parent = %username, "kid created");
                    return Ok(kid);
                }
                Err(StorageError::Conflict(msg)) => {
                    warn!(attempt, kid = %kid_username, error = %msg, "kid username taken; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::Conflict(format!(
            "no free kid username after {USERNAME_ATTEMPTS} attempts"
        ))
        .into())
    }

    /// Looks up a kid and checks the caller owns it. Unknown kids are 404
    /// before ownership is considered.
    pub async fn load_owned_kid(
        &self,
        caller: &Caller,
        kid_username: &str,
    ) -> Result<Kid, FamilyError> {
        let kid = self
            .store
            .find_kid(kid_username)
            .await?
            .ok_or_else(|| FamilyError::NotFound(format!("kid not found: {kid_username}")))?;
        if !is_owner_of(&kid, caller) {
            warn!(
                kid = %kid.username,
                caller = %caller.username,
                role = ?caller.role,
                "access to kid denied"
            );
            return Err(FamilyError::Forbidden);
        }
        Ok(kid)
    }

    /// Partial update: only submitted fields change.
    pub async fn update_kid(
        &self,
        caller: &Caller,
        kid_username: &str,
        req: UpdateKidReq,
    ) -> Result<Kid, FamilyError> {
        let kid = self.load_owned_kid(caller, kid_username).await?;
        let changes = validate_kid_changes(&kid, req)?;

        if let Some(birthdate) = changes.birthdate {
            let heights = self.store.list_heights(kid.id).await?;
            if let Some(first) = heights.iter().map(|h| h.date_height).min()
                && first < birthdate
            {
                return Err(FamilyError::Validation(FieldErrors::single(
                    "birthdate",
                    format!(
                        "Birth date cannot be after an existing measurement ({}).",
                        domain::format_date(first)
                    ),
                )));
            }
        }

        let updated = self
            .store
            .update_kid(kid.id, changes)
            .await
            .map_err(|e| {
                rejected_write(
                    e,
                    "birthdate",
                    "Birth date cannot be after an existing measurement.",
                )
            })?;
        debug!(kid = %updated.username, "kid updated");
        Ok(updated)
    }

    /// Deletes the kid and all of its measurements.
    pub async fn delete_kid(&self, caller: &Caller, kid_username: &str) -> Result<(), FamilyError> {
        let kid = self.load_owned_kid(caller, kid_username).await?;
        if !self.store.delete_kid(kid.id).await? {
            return Err(FamilyError::NotFound(format!("kid not found: {kid_username}")));
        }
        info!(kid = %kid.username, by = %caller.username, "kid deleted");
        Ok(())
    }

    /// Records a measurement and returns the kid with its full history.
    pub async fn add_height(
        &self,
        caller: &Caller,
        kid_username: &str,
        req: CreateHeightReq,
    ) -> Result<(Kid, Vec<KidHeight>), FamilyError> {
        let kid = self.load_owned_kid(caller, kid_username).await?;

        let mut errors = FieldErrors::default();
        let height = match req.height {
            Some(h) => check_height(h, &mut errors),
            None => {
                errors.add("height", REQUIRED);
                None
            }
        };
        let date = match req.date_height.as_deref() {
            Some(raw) => check_date_height(&kid, raw, &mut errors),
            None => {
                errors.add("date_height", REQUIRED);
                None
            }
        };
        let (Some(height), Some(date)) = (height, date) else {
            return Err(FamilyError::Validation(errors));
        };

        let values = self.measure(&kid, height, date)?;
        let record = self
            .store
            .create_height(kid.id, values)
            .await
            .map_err(|e| rejected_write(e, "date_height", BEFORE_BIRTH))?;
        info!(
            kid = %kid.username,
            height_id = record.id,
            height = record.height,
            age_months = record.age_height,
            oms = %record.percentile_oms,
            sap = %record.percentile_sap,
            "height recorded"
        );
        let heights = self.store.list_heights(kid.id).await?;
        Ok((kid, heights))
    }

    /// Patches one measurement. A changed height or date re-derives age and
    /// both percentiles; an empty patch leaves the record untouched.
    pub async fn update_height(
        &self,
        caller: &Caller,
        kid_username: &str,
        height_id: i32,
        req: UpdateHeightReq,
    ) -> Result<KidHeight, FamilyError> {
        let kid = self.load_owned_kid(caller, kid_username).await?;
        let existing = self
            .store
            .find_height(kid.id, height_id)
            .await?
            .ok_or_else(|| FamilyError::NotFound(format!("height not found: {height_id}")))?;

        if req.height.is_none() && req.date_height.is_none() {
            return Ok(existing);
        }

        let mut errors = FieldErrors::default();
        let height = match req.height {
            Some(h) => check_height(h, &mut errors),
            None => Some(f64::from(existing.height)),
        };
        let date = match req.date_height.as_deref() {
            Some(raw) => check_date_height(&kid, raw, &mut errors),
            None => Some(existing.date_height),
        };
        let (Some(height), Some(date)) = (height, date) else {
            return Err(FamilyError::Validation(errors));
        };

        let values = self.measure(&kid, height, date)?;
        self.store
            .update_height(existing.id, values)
            .await
            .map_err(|e| rejected_write(e, "date_height", BEFORE_BIRTH))
    }

    pub async fn delete_height(
        &self,
        caller: &Caller,
        kid_username: &str,
        height_id: i32,
    ) -> Result<(), FamilyError> {
        let kid = self.load_owned_kid(caller, kid_username).await?;
        if !self.store.delete_height(kid.id, height_id).await? {
            return Err(FamilyError::NotFound(format!("height not found: {height_id}")));
        }
        debug!(kid = %kid.username, height_id, "height deleted");
        Ok(())
    }

    /// The kid profile and every measurement ordered by date.
    pub async fn history(
        &self,
        caller: &Caller,
        kid_username: &str,
    ) -> Result<(Kid, Vec<KidHeight>), FamilyError> {
        let kid = self.load_owned_kid(caller, kid_username).await?;
        let heights = self.store.list_heights(kid.id).await?;
        Ok((kid, heights))
    }

    async fn ensure_family_caller(&self, caller: &Caller, username: &str) -> Result<(), FamilyError> {
        if !self.store.user_exists(username).await? {
            return Err(FamilyError::NotFound(format!("user not found: {username}")));
        }
        if caller.role != Role::Parent || caller.username != username {
            warn!(
                family = %username,
                caller = %caller.username,
                role = ?caller.role,
                "access to family denied"
            );
            return Err(FamilyError::Forbidden);
        }
        Ok(())
    }

    /// Derives age and both percentile labels for a measurement.
    ///
    /// `age_height` counts from the birth date. Percentiles use the corrected
    /// age (counted from `premature_date`) when the kid has one.
    fn measure(&self, kid: &Kid, height: f64, date: NaiveDate) -> Result<HeightValues, FamilyError> {
        let sex = kid
            .parsed_sex()
            .map_err(|e| FamilyError::Corrupt(format!("kid {}: {e}", kid.username)))?;
        let age_height = growth::age_in_months(kid.birthdate, date);
        let lookup_age = match kid.premature_date {
            Some(due) => growth::age_in_months(due, date).max(0.0),
            None => age_height,
        };
        let class = self
            .standards
            .classify(sex, growth::age_years(lookup_age), height);
        Ok(HeightValues {
            height: height.trunc() as i32,
            date_height: date,
            age_height,
            percentile_oms: class.oms.label(),
            percentile_sap: class.sap.label(),
        })
    }
}

struct NewKidFields {
    name: String,
    birthdate: NaiveDate,
    sex: Sex,
    premature_date: Option<NaiveDate>,
}

fn validate_new_kid(req: CreateKidReq) -> Result<NewKidFields, FamilyError> {
    let mut errors = FieldErrors::default();
    let name = match req.name {
        Some(n) => check_name(&n, &mut errors),
        None => {
            errors.add("name", REQUIRED);
            None
        }
    };
    let birthdate = match req.birthdate.as_deref() {
        Some(raw) => check_date("birthdate", raw, &mut errors),
        None => {
            errors.add("birthdate", REQUIRED);
            None
        }
    };
    let sex = match req.sex.as_deref() {
        Some(raw) => check_sex(raw, &mut errors),
        None => {
            errors.add("sex", REQUIRED);
            None
        }
    };
    let premature_date = req
        .premature_date
        .as_deref()
        .and_then(|raw| check_date("premature_date", raw, &mut errors));
    if let (Some(birth), Some(due)) = (birthdate, premature_date) {
        check_premature(birth, due, &mut errors);
    }
    match (name, birthdate, sex) {
        (Some(name), Some(birthdate), Some(sex)) if errors.is_empty() => Ok(NewKidFields {
            name,
            birthdate,
            sex,
            premature_date,
        }),
        _ => Err(FamilyError::Validation(errors)),
    }
}

fn validate_kid_changes(kid: &Kid, req: UpdateKidReq) -> Result<KidChanges, FamilyError> {
    let mut errors = FieldErrors::default();
    let name = req.name.and_then(|n| check_name(&n, &mut errors));
    let birthdate = req
        .birthdate
        .as_deref()
        .and_then(|raw| check_date("birthdate", raw, &mut errors));
    let sex = req
        .sex
        .as_deref()
        .and_then(|raw| check_sex(raw, &mut errors))
        .map(|s| s.as_str().to_string());
    let premature_date = match req.premature_date {
        Some(Some(raw)) => check_date("premature_date", &raw, &mut errors).map(Some),
        Some(None) => Some(None),
        None => None,
    };

    let effective_birth = birthdate.unwrap_or(kid.birthdate);
    let effective_due = match premature_date {
        Some(due) => due,
        None => kid.premature_date,
    };
    if let Some(due) = effective_due {
        check_premature(effective_birth, due, &mut errors);
    }
    errors.check()?;

    Ok(KidChanges {
        name,
        birthdate,
        sex,
        premature_date,
    })
}

fn check_name(raw: &str, errors: &mut FieldErrors) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() {
        errors.add("name", BLANK);
        return None;
    }
    if name.chars().count() > 100 {
        errors.add("name", "Ensure this field has no more than 100 characters.");
        return None;
    }
    Some(name.to_string())
}

fn check_date(field: &str, raw: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    let parsed = domain::parse_date(raw);
    if parsed.is_none() {
        errors.add(
            field,
            "Date has wrong format. Use one of these formats instead: DD/MM/YYYY, YYYY-MM-DD, YYYY/MM/DD.",
        );
    }
    parsed
}

fn check_sex(raw: &str, errors: &mut FieldErrors) -> Option<Sex> {
    match raw.parse::<Sex>() {
        Ok(sex) => Some(sex),
        Err(_) => {
            errors.add("sex", format!("\"{raw}\" is not a valid choice."));
            None
        }
    }
}

fn check_premature(birth: NaiveDate, due: NaiveDate, errors: &mut FieldErrors) {
    if due < birth {
        errors.add(
            "premature_date",
            "The adjustment date cannot be earlier than the date of birth.",
        );
    }
}

fn check_height(height: f64, errors: &mut FieldErrors) -> Option<f64> {
    if !(MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&height) {
        errors.add("height", "The height must be in cms.");
        return None;
    }
    Some(height)
}

fn check_date_height(kid: &Kid, raw: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    let date = check_date("date_height", raw, errors)?;
    if date < kid.birthdate {
        errors.add("date_height", BEFORE_BIRTH);
        return None;
    }
    Some(date)
}

/// Five digit suffix (10000..=99999) for generated kid usernames.
fn random_suffix() -> u32 {
    rand::thread_rng().gen_range(10_000..=99_999)
}

/// The store re-checks the birth date inside its write transaction; a
/// violation there means a concurrent change won the race.
fn rejected_write(err: StorageError, field: &str, message: &str) -> FamilyError {
    match err {
        StorageError::Invariant(detail) => {
            warn!(%detail, field, "write rejected by store");
            FamilyError::Validation(FieldErrors::single(field, message))
        }
        other => other.into(),
    }
}
