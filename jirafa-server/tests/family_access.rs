use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use jirafa_server::server::family::{Caller, FamilyAccess, FamilyError};
use jirafa_server::storage::models::{HeightValues, Kid, KidChanges, KidHeight, NewKid};
use jirafa_server::storage::{FamilyStore, Page, StorageError};
use jirafa_shared::api::{CreateHeightReq, CreateKidReq, UpdateHeightReq, UpdateKidReq};
use jirafa_shared::growth::GrowthStandards;

#[derive(Default)]
struct Tables {
    users: Vec<String>,
    kids: Vec<Kid>,
    heights: Vec<KidHeight>,
    next_id: i32,
}

/// `FamilyStore` kept in memory. `conflicts` makes the next N kid inserts
/// fail as if the username were taken. `birth_race` is applied to the kid
/// right before the next height write, as a concurrent PATCH would.
#[derive(Default)]
struct MemoryStore {
    tables: Mutex<Tables>,
    conflicts: Mutex<usize>,
    birth_race: Mutex<Option<NaiveDate>>,
}

impl MemoryStore {
    fn with_users(users: &[&str]) -> Self {
        let store = MemoryStore::default();
        store.tables.lock().unwrap().users = users.iter().map(|u| u.to_string()).collect();
        store
    }
}

fn missing() -> StorageError {
    StorageError::Database(diesel::result::Error::NotFound)
}

impl Tables {
    fn ensure_after_birth(&self, kid_id: i32, date: NaiveDate) -> Result<(), StorageError> {
        let kid = self.kids.iter().find(|k| k.id == kid_id).ok_or_else(missing)?;
        if date < kid.birthdate {
            return Err(StorageError::Invariant(format!("{date} before {}", kid.birthdate)));
        }
        Ok(())
    }
}

impl MemoryStore {
    fn apply_birth_race(&self, t: &mut Tables, kid_id: i32) {
        if let Some(birth) = self.birth_race.lock().unwrap().take()
            && let Some(kid) = t.kids.iter_mut().find(|k| k.id == kid_id)
        {
            kid.birthdate = birth;
        }
    }
}

impl FamilyStore for MemoryStore {
    async fn user_exists(&self, username: &str) -> Result<bool, StorageError> {
        Ok(self.tables.lock().unwrap().users.iter().any(|u| u == username))
    }

    async fn list_kids_by_parent(&self, parent: &str, page: Page) -> Result<Vec<Kid>, StorageError> {
        let t = self.tables.lock().unwrap();
        Ok(t.kids
            .iter()
            .filter(|k| k.parent == parent)
            .skip(page.offset())
            .take(page.per_page)
            .cloned()
            .collect())
    }

    async fn find_kid(&self, username: &str) -> Result<Option<Kid>, StorageError> {
        let t = self.tables.lock().unwrap();
        Ok(t.kids.iter().find(|k| k.username == username).cloned())
    }

    async fn create_kid(&self, kid: NewKid) -> Result<Kid, StorageError> {
        {
            let mut left = self.conflicts.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(StorageError::Conflict("UNIQUE constraint failed: kids.username".into()));
            }
        }
        let mut t = self.tables.lock().unwrap();
        if t.kids.iter().any(|k| k.username == kid.username) {
            return Err(StorageError::Conflict(kid.username));
        }
        t.next_id += 1;
        let now = Utc::now().naive_utc();
        let row = Kid {
            id: t.next_id,
            username: kid.username,
            name: kid.name,
            birthdate: kid.birthdate,
            sex: kid.sex,
            premature_date: kid.premature_date,
            parent: kid.parent,
            created_at: now,
            updated_at: now,
        };
        t.kids.push(row.clone());
        Ok(row)
    }

    async fn update_kid(&self, kid_id: i32, changes: KidChanges) -> Result<Kid, StorageError> {
        let mut t = self.tables.lock().unwrap();
        if let Some(birth) = changes.birthdate
            && t.heights.iter().any(|h| h.kid_id == kid_id && h.date_height < birth)
        {
            return Err(StorageError::Invariant(format!("measurement before {birth}")));
        }
        let kid = t.kids.iter_mut().find(|k| k.id == kid_id).ok_or_else(missing)?;
        if let Some(name) = changes.name {
            kid.name = name;
        }
        if let Some(birthdate) = changes.birthdate {
            kid.birthdate = birthdate;
        }
        if let Some(sex) = changes.sex {
            kid.sex = sex;
        }
        if let Some(due) = changes.premature_date {
            kid.premature_date = due;
        }
        kid.updated_at = Utc::now().naive_utc();
        Ok(kid.clone())
    }

    async fn delete_kid(&self, kid_id: i32) -> Result<bool, StorageError> {
        let mut t = self.tables.lock().unwrap();
        let before = t.kids.len();
        t.kids.retain(|k| k.id != kid_id);
        t.heights.retain(|h| h.kid_id != kid_id);
        Ok(t.kids.len() != before)
    }

    async fn list_heights(&self, kid_id: i32) -> Result<Vec<KidHeight>, StorageError> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<KidHeight> = t.heights.iter().filter(|h| h.kid_id == kid_id).cloned().collect();
        rows.sort_by_key(|h| (h.date_height, h.id));
        Ok(rows)
    }

    async fn find_height(&self, kid_id: i32, height_id: i32) -> Result<Option<KidHeight>, StorageError> {
        let t = self.tables.lock().unwrap();
        Ok(t.heights
            .iter()
            .find(|h| h.kid_id == kid_id && h.id == height_id)
            .cloned())
    }

    async fn create_height(&self, kid_id: i32, values: HeightValues) -> Result<KidHeight, StorageError> {
        let mut t = self.tables.lock().unwrap();
        self.apply_birth_race(&mut t, kid_id);
        t.ensure_after_birth(kid_id, values.date_height)?;
        t.next_id += 1;
        let now = Utc::now().naive_utc();
        let row = KidHeight {
            id: t.next_id,
            kid_id,
            height: values.height,
            date_height: values.date_height,
            age_height: values.age_height,
            percentile_oms: values.percentile_oms,
            percentile_sap: values.percentile_sap,
            created_at: now,
            updated_at: now,
        };
        t.heights.push(row.clone());
        Ok(row)
    }

    async fn update_height(&self, height_id: i32, values: HeightValues) -> Result<KidHeight, StorageError> {
        let mut t = self.tables.lock().unwrap();
        let owner = t.heights.iter().find(|h| h.id == height_id).ok_or_else(missing)?.kid_id;
        self.apply_birth_race(&mut t, owner);
        t.ensure_after_birth(owner, values.date_height)?;
        let row = t.heights.iter_mut().find(|h| h.id == height_id).ok_or_else(missing)?;
        row.height = values.height;
        row.date_height = values.date_height;
        row.age_height = values.age_height;
        row.percentile_oms = values.percentile_oms;
        row.percentile_sap = values.percentile_sap;
        row.updated_at = Utc::now().naive_utc();
        Ok(row.clone())
    }

    async fn delete_height(&self, kid_id: i32, height_id: i32) -> Result<bool, StorageError> {
        let mut t = self.tables.lock().unwrap();
        let before = t.heights.len();
        t.heights.retain(|h| !(h.kid_id == kid_id && h.id == height_id));
        Ok(t.heights.len() != before)
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn kid_req(name: &str, birthdate: &str, sex: &str) -> CreateKidReq {
    CreateKidReq {
        name: Some(name.into()),
        birthdate: Some(birthdate.into()),
        sex: Some(sex.into()),
        premature_date: None,
    }
}

fn height_req(height: f64, on: &str) -> CreateHeightReq {
    CreateHeightReq {
        height: Some(height),
        date_height: Some(on.into()),
    }
}

fn field_messages(err: FamilyError, field: &str) -> Vec<String> {
    match err {
        FamilyError::Validation(fields) => fields.get(field).map(<[String]>::to_vec).unwrap_or_default(),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn creating_a_kid_generates_its_username() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);

    let kid = access
        .create_kid(&Caller::parent("ana"), "ana", kid_req(" Lucía ", "01/02/2020", "female"))
        .await
        .unwrap();
    assert!(kid.username.starts_with("kid_lu_f"), "{}", kid.username);
    assert_eq!(kid.username.len(), "kid_lu_f".len() + 5);
    assert_eq!(kid.name, "Lucía");
    assert_eq!(kid.birthdate, date(2020, 2, 1));
    assert_eq!(kid.sex, "female");
    assert_eq!(kid.parent, "ana");

    for _ in 0..20 {
        let kid = access
            .create_kid(&Caller::parent("ana"), "ana", kid_req("Leo", "2020-01-01", "m"))
            .await
            .unwrap();
        let suffix: u32 = kid.username["kid_le_m".len()..].parse().unwrap();
        assert!((10_000..=99_999).contains(&suffix), "{}", kid.username);
    }
}

#[tokio::test]
async fn family_routes_check_existence_before_ownership() {
    let store = MemoryStore::with_users(&["ana", "bob"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let req = || kid_req("Leo", "2020-01-01", "m");

    let err = access.create_kid(&Caller::parent("bob"), "ghost", req()).await.unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
    let err = access.create_kid(&Caller::parent("bob"), "ana", req()).await.unwrap_err();
    assert!(matches!(err, FamilyError::Forbidden));
    let err = access.list_family(&Caller::kid("ana"), "ana", Page::default()).await.unwrap_err();
    assert!(matches!(err, FamilyError::Forbidden));
}

#[tokio::test]
async fn missing_and_invalid_kid_fields_are_reported_per_field() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");

    let err = access.create_kid(&ana, "ana", CreateKidReq::default()).await.unwrap_err();
    let FamilyError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    for field in ["name", "birthdate", "sex"] {
        assert_eq!(fields.get(field), Some(&["This field is required.".to_string()][..]));
    }

    let mut req = kid_req("Leo", "2020-13-40", "robot");
    req.premature_date = Some("2019-01-01".into());
    let err = access.create_kid(&ana, "ana", req).await.unwrap_err();
    let FamilyError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    assert!(fields.get("birthdate").is_some());
    assert_eq!(fields.get("sex"), Some(&["\"robot\" is not a valid choice.".to_string()][..]));

    let mut req = kid_req("Leo", "2020-05-01", "m");
    req.premature_date = Some("2020-04-01".into());
    let err = access.create_kid(&ana, "ana", req).await.unwrap_err();
    assert_eq!(
        field_messages(err, "premature_date"),
        vec!["The adjustment date cannot be earlier than the date of birth.".to_string()]
    );
    assert!(store.tables.lock().unwrap().kids.is_empty());
}

#[tokio::test]
async fn username_collisions_are_retried_a_bounded_number_of_times() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");

    *store.conflicts.lock().unwrap() = 2;
    access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();

    *store.conflicts.lock().unwrap() = 5;
    let err = access
        .create_kid(&ana, "ana", kid_req("Mia", "2020-01-01", "f"))
        .await
        .unwrap_err();
    assert!(matches!(err, FamilyError::Storage(StorageError::Conflict(_))));
}

#[tokio::test]
async fn listing_only_returns_the_callers_kids_in_creation_order() {
    let store = MemoryStore::with_users(&["ana", "bob"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);

    for name in ["Leo", "Mia", "Noa"] {
        access
            .create_kid(&Caller::parent("ana"), "ana", kid_req(name, "2020-01-01", "f"))
            .await
            .unwrap();
    }
    access
        .create_kid(&Caller::parent("bob"), "bob", kid_req("Max", "2021-01-01", "m"))
        .await
        .unwrap();

    let kids = access.list_family(&Caller::parent("ana"), "ana", Page::default()).await.unwrap();
    let names: Vec<_> = kids.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, ["Leo", "Mia", "Noa"]);

    let second = access
        .list_family(&Caller::parent("ana"), "ana", Page::new(Some(2), Some(2)))
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].name, "Noa");
}

#[tokio::test]
async fn only_the_owner_or_the_kid_itself_reach_a_kid() {
    let store = MemoryStore::with_users(&["ana", "bob"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let kid = access
        .create_kid(&Caller::parent("ana"), "ana", kid_req("Leo", "2020-01-01", "m"))
        .await
        .unwrap();
    let sibling = access
        .create_kid(&Caller::parent("ana"), "ana", kid_req("Mia", "2020-01-01", "f"))
        .await
        .unwrap();

    access.load_owned_kid(&Caller::parent("ana"), &kid.username).await.unwrap();
    access.load_owned_kid(&Caller::kid(kid.username.clone()), &kid.username).await.unwrap();

    let err = access.load_owned_kid(&Caller::parent("bob"), &kid.username).await.unwrap_err();
    assert!(matches!(err, FamilyError::Forbidden));
    let err = access
        .load_owned_kid(&Caller::kid(sibling.username.clone()), &kid.username)
        .await
        .unwrap_err();
    assert!(matches!(err, FamilyError::Forbidden));
    let err = access.load_owned_kid(&Caller::parent("bob"), "kid_no_m00000").await.unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
}

#[tokio::test]
async fn recording_a_height_derives_age_and_percentiles() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");
    let kid = access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();

    access.add_height(&ana, &kid.username, height_req(80.0, "2021-06-01")).await.unwrap();
    let (_, data) = access
        .add_height(&ana, &kid.username, height_req(75.4, "01/01/2021"))
        .await
        .unwrap();

    assert_eq!(data.len(), 2);
    // Ordered by measurement date, not insertion.
    let first = &data[0];
    assert_eq!(first.date_height, date(2021, 1, 1));
    assert_eq!(first.height, 75);
    assert_eq!(first.age_height, 12.04);
    assert_eq!(first.percentile_oms, "50");
    assert_eq!(first.percentile_sap, "50");
    assert_eq!(data[1].date_height, date(2021, 6, 1));
}

#[tokio::test]
async fn corrected_age_is_used_for_premature_kids() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");

    let term = access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();
    let mut req = kid_req("Max", "2020-01-01", "m");
    req.premature_date = Some("2020-03-01".into());
    let early = access.create_kid(&ana, "ana", req).await.unwrap();

    let (_, term_data) = access
        .add_height(&ana, &term.username, height_req(75.0, "2021-03-01"))
        .await
        .unwrap();
    let (_, early_data) = access
        .add_height(&ana, &early.username, height_req(75.0, "2021-03-01"))
        .await
        .unwrap();

    // Age itself always counts from birth.
    assert_eq!(term_data[0].age_height, 13.98);
    assert_eq!(early_data[0].age_height, 13.98);
    assert_eq!(term_data[0].percentile_oms, "25");
    assert_eq!(early_data[0].percentile_oms, "50");
}

#[tokio::test]
async fn implausible_measurements_are_rejected() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");
    let kid = access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();

    let err = access
        .add_height(&ana, &kid.username, height_req(19.9, "2021-01-01"))
        .await
        .unwrap_err();
    assert_eq!(field_messages(err, "height"), vec!["The height must be in cms.".to_string()]);

    let err = access
        .add_height(&ana, &kid.username, height_req(50.0, "2019-12-31"))
        .await
        .unwrap_err();
    assert_eq!(
        field_messages(err, "date_height"),
        vec!["The measurement cannot be earlier than the date of birth.".to_string()]
    );

    let err = access
        .add_height(&ana, &kid.username, CreateHeightReq::default())
        .await
        .unwrap_err();
    let FamilyError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    assert!(fields.get("height").is_some());
    assert!(fields.get("date_height").is_some());

    let (_, data) = access.history(&ana, &kid.username).await.unwrap();
    assert!(data.is_empty());
}

#[tokio::test]
async fn patching_a_height_recomputes_derived_fields() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");
    let kid = access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();
    let (_, data) = access
        .add_height(&ana, &kid.username, height_req(75.0, "2021-01-01"))
        .await
        .unwrap();
    let id = data[0].id;

    let same = access
        .update_height(&ana, &kid.username, id, UpdateHeightReq::default())
        .await
        .unwrap();
    assert_eq!(same, data[0]);

    let taller = access
        .update_height(
            &ana,
            &kid.username,
            id,
            UpdateHeightReq {
                height: Some(95.0),
                date_height: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(taller.height, 95);
    assert_eq!(taller.date_height, date(2021, 1, 1));
    assert_eq!(taller.percentile_oms, ">97");

    let later = access
        .update_height(
            &ana,
            &kid.username,
            id,
            UpdateHeightReq {
                height: None,
                date_height: Some("2022-01-01".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(later.height, 95);
    assert_eq!(later.age_height, 24.05);

    let err = access
        .update_height(
            &ana,
            &kid.username,
            id,
            UpdateHeightReq {
                height: Some(5.0),
                date_height: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FamilyError::Validation(_)));

    let err = access
        .update_height(&ana, &kid.username, id + 100, UpdateHeightReq::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
}

#[tokio::test]
async fn heights_belong_to_exactly_one_kid() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");
    let leo = access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();
    let mia = access.create_kid(&ana, "ana", kid_req("Mia", "2020-01-01", "f")).await.unwrap();
    let (_, data) = access
        .add_height(&ana, &leo.username, height_req(75.0, "2021-01-01"))
        .await
        .unwrap();
    let id = data[0].id;

    let err = access.delete_height(&ana, &mia.username, id).await.unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));

    access.delete_height(&ana, &leo.username, id).await.unwrap();
    let err = access.delete_height(&ana, &leo.username, id).await.unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
}

#[tokio::test]
async fn kid_updates_are_partial_and_keep_history_consistent() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");
    let mut req = kid_req("Leo", "2020-01-01", "m");
    req.premature_date = Some("2020-02-01".into());
    let kid = access.create_kid(&ana, "ana", req).await.unwrap();
    access
        .add_height(&ana, &kid.username, height_req(60.0, "2020-06-01"))
        .await
        .unwrap();

    let renamed = access
        .update_kid(
            &ana,
            &kid.username,
            UpdateKidReq {
                name: Some("Leon".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Leon");
    assert_eq!(renamed.birthdate, kid.birthdate);
    assert_eq!(renamed.premature_date, Some(date(2020, 2, 1)));

    let cleared = access
        .update_kid(
            &ana,
            &kid.username,
            UpdateKidReq {
                premature_date: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.premature_date, None);

    let err = access
        .update_kid(
            &ana,
            &kid.username,
            UpdateKidReq {
                birthdate: Some("2020-07-01".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FamilyError::Validation(_)));
}

#[tokio::test]
async fn deleting_a_kid_removes_its_measurements() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");
    let kid = access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();
    access
        .add_height(&ana, &kid.username, height_req(75.0, "2021-01-01"))
        .await
        .unwrap();

    let err = access.delete_kid(&Caller::kid(kid.username.clone()), "kid_xx_m00000").await.unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));

    access.delete_kid(&ana, &kid.username).await.unwrap();
    assert!(store.tables.lock().unwrap().heights.is_empty());
    let err = access.history(&ana, &kid.username).await.unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
}

#[tokio::test]
async fn oversized_page_numbers_are_clamped() {
    let page = Page::new(Some(usize::MAX), Some(usize::MAX));
    assert_eq!(page.page, Page::MAX_PAGE);
    assert_eq!(page.per_page, Page::MAX_PER_PAGE);
    assert_eq!(page.offset(), (Page::MAX_PAGE - 1) * Page::MAX_PER_PAGE);
    assert!(i64::try_from(page.offset()).is_ok());

    let floor = Page::new(Some(0), Some(0));
    assert_eq!((floor.page, floor.per_page, floor.offset()), (1, 1, 0));

    // Built by hand, bypassing `new`.
    let raw = Page {
        page: usize::MAX,
        per_page: usize::MAX,
    };
    assert_eq!(raw.offset(), usize::MAX);

    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");
    access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();
    let kids = access
        .list_family(&ana, "ana", Page::new(Some(usize::MAX), Some(1000)))
        .await
        .unwrap();
    assert!(kids.is_empty());
}

#[tokio::test]
async fn heights_beyond_the_plausible_range_are_rejected() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");
    let kid = access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();

    for height in [3e9, 300.5, f64::INFINITY, f64::NAN] {
        let err = access
            .add_height(&ana, &kid.username, height_req(height, "2021-01-01"))
            .await
            .unwrap_err();
        assert_eq!(
            field_messages(err, "height"),
            vec!["The height must be in cms.".to_string()],
            "height {height}"
        );
    }
    let (_, data) = access
        .add_height(&ana, &kid.username, height_req(300.0, "2021-01-01"))
        .await
        .unwrap();
    assert_eq!(data[0].height, 300);
}

#[tokio::test]
async fn birth_date_moved_concurrently_rejects_the_measurement() {
    let store = MemoryStore::with_users(&["ana"]);
    let standards = GrowthStandards::builtin();
    let access = FamilyAccess::new(&store, &standards);
    let ana = Caller::parent("ana");
    let kid = access.create_kid(&ana, "ana", kid_req("Leo", "2020-01-01", "m")).await.unwrap();

    *store.birth_race.lock().unwrap() = Some(date(2021, 6, 1));
    let err = access
        .add_height(&ana, &kid.username, height_req(75.0, "2021-01-01"))
        .await
        .unwrap_err();
    assert_eq!(
        field_messages(err, "date_height"),
        vec!["The measurement cannot be earlier than the date of birth.".to_string()]
    );
    assert!(store.tables.lock().unwrap().heights.is_empty());

    let (_, data) = access
        .add_height(&ana, &kid.username, height_req(80.0, "2021-07-01"))
        .await
        .unwrap();
    *store.birth_race.lock().unwrap() = Some(date(2021, 8, 1));
    let err = access
        .update_height(
            &ana,
            &kid.username,
            data[0].id,
            UpdateHeightReq {
                height: Some(81.0),
                date_height: None,
            },
        )
        .await
        .unwrap_err();
    assert!(field_messages(err, "date_height").len() == 1);
}
