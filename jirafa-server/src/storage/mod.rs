pub mod models;
pub mod schema;

use std::future::Future;

use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::DatabaseErrorKind;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{
    HeightValues, Kid, KidChanges, KidHeight, NewKid, NewKidHeight, NewSession, NewUser, User,
};
use tracing::{debug, trace};

use crate::server::UserConfig;

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// A unique key (username) is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The write would leave a measurement dated before the kid's birth.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

fn unique_to_conflict(err: diesel::result::Error) -> StorageError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StorageError::Conflict(info.message().to_string())
        }
        other => StorageError::Database(other),
    }
}

/// Window into an ordered listing. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub per_page: usize,
}

impl Page {
    pub const DEFAULT_PER_PAGE: usize = 100;
    pub const MAX_PER_PAGE: usize = 1000;
    /// Keeps `offset()` well inside `i64` (and 32-bit `usize`).
    pub const MAX_PAGE: usize = 1_000_000;

    pub fn new(page: Option<usize>, per_page: Option<usize>) -> Self {
        Page {
            page: page.unwrap_or(1).clamp(1, Self::MAX_PAGE),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

/// Data access needed by the family access controller.
///
/// Implemented by [`Store`] over SQLite; tests provide in-memory versions.
/// Every method is a single atomic operation.
pub trait FamilyStore: Send + Sync {
    fn user_exists(&self, username: &str)
    -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Kids owned by `parent`, oldest first.
    fn list_kids_by_parent(
        &self,
        parent: &str,
        page: Page,
    ) -> impl Future<Output = Result<Vec<Kid>, StorageError>> + Send;

    fn find_kid(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<Kid>, StorageError>> + Send;

    /// Fails with [`StorageError::Conflict`] when the username is taken.
    fn create_kid(&self, kid: NewKid) -> impl Future<Output = Result<Kid, StorageError>> + Send;

    /// Fails with [`StorageError::Invariant`] when a new birth date falls
    /// after an existing measurement.
    fn update_kid(
        &self,
        kid_id: i32,
        changes: KidChanges,
    ) -> impl Future<Output = Result<Kid, StorageError>> + Send;

    /// Removes the kid together with its measurements and sessions.
    fn delete_kid(&self, kid_id: i32) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Measurements of a kid ordered by measurement date.
    fn list_heights(
        &self,
        kid_id: i32,
    ) -> impl Future<Output = Result<Vec<KidHeight>, StorageError>> + Send;

    fn find_height(
        &self,
        kid_id: i32,
        height_id: i32,
    ) -> impl Future<Output = Result<Option<KidHeight>, StorageError>> + Send;

    /// Fails with [`StorageError::Invariant`] when the measurement predates
    /// the kid's birth date as stored at write time.
    fn create_height(
        &self,
        kid_id: i32,
        values: HeightValues,
    ) -> impl Future<Output = Result<KidHeight, StorageError>> + Send;

    /// Same birth date check as [`FamilyStore::create_height`].
    fn update_height(
        &self,
        height_id: i32,
        values: HeightValues,
    ) -> impl Future<Output = Result<KidHeight, StorageError>> + Send;

    fn delete_height(
        &self,
        kid_id: i32,
        height_id: i32,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(Store { pool })
    }

    /// Upserts the parent accounts listed in config; existing users get the
    /// configured password hash.
    pub async fn seed_users(&self, cfg_users: &[UserConfig]) -> Result<(), StorageError> {
        use schema::users;

        let pool = self.pool.clone();
        let users_owned = cfg_users.to_owned();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            for u in &users_owned {
                let new_user = NewUser {
                    username: &u.username,
                    password_hash: &u.password_hash,
                };
                diesel::insert_into(users::table)
                    .values(&new_user)
                    .on_conflict(users::username)
                    .do_update()
                    .set(users::password_hash.eq(new_user.password_hash))
                    .execute(&mut conn)?;
            }
            Ok(())
        })
        .await?
    }

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StorageError> {
        use schema::users;
        let pool = self.pool.clone();
        let u = username.to_string();
        let h = password_hash.to_string();
        tokio::task::spawn_blocking(move || -> Result<User, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let new_user = NewUser {
                username: &u,
                password_hash: &h,
            };
            diesel::insert_into(users::table)
                .values(&new_user)
                .get_result::<User>(&mut conn)
                .map_err(unique_to_conflict)
        })
        .await?
    }

    pub async fn get_user(&self, username_: &str) -> Result<Option<User>, StorageError> {
        use schema::users::dsl::*;
        let pool = self.pool.clone();
        let u = username_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<User>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(users
                .filter(username.eq(&u))
                .first::<User>(&mut conn)
                .optional()?)
        })
        .await?
    }

    // Session helpers for JWT inactivity windows
    pub async fn create_session(&self, jti_: &str, username_: &str) -> Result<(), StorageError> {
        use schema::sessions;
        let pool = self.pool.clone();
        let j = jti_.to_string();
        let u = username_.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let new = NewSession {
                jti: &j,
                username: &u,
            };
            diesel::insert_into(sessions::table)
                .values(&new)
                .on_conflict_do_nothing()
                .execute(&mut conn)?;
            Ok(())
        })
        .await?
    }

    /// Touch session atomically, but only if it hasn't expired.
    /// Returns `true` if the session was found and updated, `false` otherwise.
    ///
    /// The idle check and the `last_used_at` update are one UPDATE statement,
    /// so a concurrent request cannot revive an expired session.
    pub async fn touch_session_with_cutoff(
        &self,
        jti_: &str,
        cutoff: chrono::NaiveDateTime,
    ) -> Result<bool, StorageError> {
        use schema::sessions::dsl::*;
        let pool = self.pool.clone();
        let j = jti_.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let now = Utc::now().naive_utc();
            let updated =
                diesel::update(sessions.filter(jti.eq(&j)).filter(last_used_at.ge(cutoff)))
                    .set(last_used_at.eq(now))
                    .execute(&mut conn)?;
            Ok(updated > 0)
        })
        .await?
    }
}

impl FamilyStore for Store {
    async fn user_exists(&self, username_: &str) -> Result<bool, StorageError> {
        use schema::users::dsl::*;
        let pool = self.pool.clone();
        let u = username_.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let count: i64 = users
                .filter(username.eq(&u))
                .count()
                .get_result(&mut conn)?;
            Ok(count > 0)
        })
        .await?
    }

    async fn list_kids_by_parent(&self, parent_: &str, page: Page) -> Result<Vec<Kid>, StorageError> {
        use schema::kids::dsl::*;
        let pool = self.pool.clone();
        let p = parent_.to_string();
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
        let limit = i64::try_from(page.per_page).unwrap_or(i64::MAX);
        tokio::task::spawn_blocking(move || -> Result<Vec<Kid>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(kids
                .filter(parent.eq(&p))
                .order((created_at.asc(), id.asc()))
                .offset(offset)
                .limit(limit)
                .load::<Kid>(&mut conn)?)
        })
        .await?
    }

    async fn find_kid(&self, username_: &str) -> Result<Option<Kid>, StorageError> {
        use schema::kids::dsl::*;
        let pool = self.pool.clone();
        let u = username_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Kid>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(kids
                .filter(username.eq(&u))
                .first::<Kid>(&mut conn)
                .optional()?)
        })
        .await?
    }

    async fn create_kid(&self, kid: NewKid) -> Result<Kid, StorageError> {
        use schema::kids;
        let pool = self.pool.clone();
        trace!(username = %kid.username, parent = %kid.parent, "create_kid starting");
        tokio::task::spawn_blocking(move || -> Result<Kid, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            diesel::insert_into(kids::table)
                .values(&kid)
                .get_result::<Kid>(&mut conn)
                .map_err(unique_to_conflict)
        })
        .await?
    }

    async fn update_kid(&self, kid_id: i32, changes: KidChanges) -> Result<Kid, StorageError> {
        use schema::{kid_heights, kids};
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Kid, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<Kid, StorageError> {
                if let Some(birth) = changes.birthdate {
                    let earlier: i64 = kid_heights::table
                        .filter(kid_heights::kid_id.eq(kid_id))
                        .filter(kid_heights::date_height.lt(birth))
                        .count()
                        .get_result(conn)?;
                    if earlier > 0 {
                        return Err(StorageError::Invariant(format!(
                            "kid {kid_id}: {earlier} measurement(s) before {birth}"
                        )));
                    }
                }
                let now = Utc::now().naive_utc();
                Ok(diesel::update(kids::table.filter(kids::id.eq(kid_id)))
                    .set((&changes, kids::updated_at.eq(now)))
                    .get_result::<Kid>(conn)?)
            })
        })
        .await?
    }

    async fn delete_kid(&self, kid_id: i32) -> Result<bool, StorageError> {
        use schema::{kid_heights, kids, sessions};
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<bool, StorageError> {
                let kid_username: Option<String> = kids::table
                    .filter(kids::id.eq(kid_id))
                    .select(kids::username)
                    .first::<String>(conn)
                    .optional()?;
                let Some(kid_username) = kid_username else {
                    return Ok(false);
                };
                let heights =
                    diesel::delete(kid_heights::table.filter(kid_heights::kid_id.eq(kid_id)))
                        .execute(conn)?;
                // Kid-scoped tokens die with the kid
                diesel::delete(sessions::table.filter(sessions::username.eq(&kid_username)))
                    .execute(conn)?;
                diesel::delete(kids::table.filter(kids::id.eq(kid_id))).execute(conn)?;
                debug!(kid = %kid_username, heights, "kid deleted");
                Ok(true)
            })
        })
        .await?
    }

    async fn list_heights(&self, kid: i32) -> Result<Vec<KidHeight>, StorageError> {
        use schema::kid_heights::dsl::*;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<KidHeight>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(kid_heights
                .filter(kid_id.eq(kid))
                .order((date_height.asc(), id.asc()))
                .load::<KidHeight>(&mut conn)?)
        })
        .await?
    }

    async fn find_height(&self, kid: i32, height_id: i32) -> Result<Option<KidHeight>, StorageError> {
        use schema::kid_heights::dsl::*;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<KidHeight>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(kid_heights
                .filter(id.eq(height_id))
                .filter(kid_id.eq(kid))
                .first::<KidHeight>(&mut conn)
                .optional()?)
        })
        .await?
    }

    async fn create_height(&self, kid: i32, values: HeightValues) -> Result<KidHeight, StorageError> {
        use schema::kid_heights;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<KidHeight, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<KidHeight, StorageError> {
                ensure_after_birth(conn, kid, values.date_height)?;
                let row = NewKidHeight { kid_id: kid, values };
                Ok(diesel::insert_into(kid_heights::table)
                    .values(&row)
                    .get_result::<KidHeight>(conn)?)
            })
        })
        .await?
    }

    async fn update_height(&self, height_id: i32, values: HeightValues) -> Result<KidHeight, StorageError> {
        use schema::kid_heights::dsl::*;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<KidHeight, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<KidHeight, StorageError> {
                let owner: i32 = kid_heights
                    .filter(id.eq(height_id))
                    .select(kid_id)
                    .first(conn)?;
                ensure_after_birth(conn, owner, values.date_height)?;
                let now = Utc::now().naive_utc();
                Ok(diesel::update(kid_heights.filter(id.eq(height_id)))
                    .set((&values, updated_at.eq(now)))
                    .get_result::<KidHeight>(conn)?)
            })
        })
        .await?
    }

    async fn delete_height(&self, kid: i32, height_id: i32) -> Result<bool, StorageError> {
        use schema::kid_heights::dsl::*;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let deleted =
                diesel::delete(kid_heights.filter(id.eq(height_id)).filter(kid_id.eq(kid)))
                    .execute(&mut conn)?;
            Ok(deleted > 0)
        })
        .await?
    }
}

/// Reads the birth date inside the caller's transaction so a concurrent
/// birth date change cannot slip between check and write.
fn ensure_after_birth(
    conn: &mut SqliteConnection,
    kid: i32,
    date: chrono::NaiveDate,
) -> Result<(), StorageError> {
    use schema::kids;
    let birth: chrono::NaiveDate = kids::table
        .filter(kids::id.eq(kid))
        .select(kids::birthdate)
        .first(conn)?;
    if date < birth {
        return Err(StorageError::Invariant(format!(
            "kid {kid}: measurement {date} before birth {birth}"
        )));
    }
    Ok(())
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys=ON;").execute(conn)?;
    Ok(())
}
