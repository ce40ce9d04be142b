use chrono::NaiveDate;
use jirafa_server::server::UserConfig;
use jirafa_server::storage::models::{HeightValues, Kid, KidChanges, NewKid};
use jirafa_server::storage::{FamilyStore, Page, Store, StorageError};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn measured(height: i32, on: NaiveDate) -> HeightValues {
    HeightValues {
        height,
        date_height: on,
        age_height: 0.0,
        percentile_oms: "P50".into(),
        percentile_sap: "P50".into(),
    }
}

async fn open_store(dir: &tempfile::TempDir) -> (Store, Kid) {
    let db = dir.path().join("jirafa.db");
    let store = Store::connect_sqlite(db.to_str().unwrap()).await.expect("connect");
    store
        .seed_users(&[UserConfig {
            username: "ana".into(),
            password_hash: bcrypt::hash("secret", 4).unwrap(),
        }])
        .await
        .expect("seed");
    let kid = store
        .create_kid(NewKid {
            username: "kid_leo_12345".into(),
            name: "Leo".into(),
            birthdate: date(2020, 1, 1),
            sex: "male".into(),
            premature_date: None,
            parent: "ana".into(),
        })
        .await
        .expect("create kid");
    (store, kid)
}

#[tokio::test]
async fn birth_date_cannot_move_past_a_stored_measurement() {
    let dir = tempfile::tempdir().unwrap();
    let (store, kid) = open_store(&dir).await;
    store
        .create_height(kid.id, measured(80, date(2021, 1, 1)))
        .await
        .expect("height");

    let err = store
        .update_kid(
            kid.id,
            KidChanges {
                birthdate: Some(date(2021, 6, 1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Invariant(_)), "{err:?}");
    let stored = store.find_kid(&kid.username).await.unwrap().unwrap();
    assert_eq!(stored.birthdate, date(2020, 1, 1));

    let moved = store
        .update_kid(
            kid.id,
            KidChanges {
                birthdate: Some(date(2021, 1, 1)),
                ..Default::default()
            },
        )
        .await
        .expect("same day as the measurement");
    assert_eq!(moved.birthdate, date(2021, 1, 1));
}

#[tokio::test]
async fn measurements_cannot_predate_the_birth_date() {
    let dir = tempfile::tempdir().unwrap();
    let (store, kid) = open_store(&dir).await;

    let err = store
        .create_height(kid.id, measured(50, date(2019, 12, 31)))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Invariant(_)), "{err:?}");
    assert!(store.list_heights(kid.id).await.unwrap().is_empty());

    let row = store
        .create_height(kid.id, measured(50, date(2020, 1, 1)))
        .await
        .expect("on the birth date");
    let err = store
        .update_height(row.id, measured(50, date(2019, 6, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Invariant(_)), "{err:?}");
    let heights = store.list_heights(kid.id).await.unwrap();
    assert_eq!(heights.len(), 1);
    assert_eq!(heights[0].date_height, date(2020, 1, 1));
}

#[tokio::test]
async fn listing_far_past_the_end_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let (store, kid) = open_store(&dir).await;

    let first = store.list_kids_by_parent("ana", Page::default()).await.unwrap();
    assert_eq!(first, vec![kid]);

    let far = Page::new(Some(usize::MAX), Some(usize::MAX));
    assert!(store.list_kids_by_parent("ana", far).await.unwrap().is_empty());

    // Built by hand, so `offset()` saturates to `usize::MAX`.
    let raw = Page {
        page: usize::MAX,
        per_page: usize::MAX,
    };
    assert!(store.list_kids_by_parent("ana", raw).await.unwrap().is_empty());
}
