use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};

use super::{Change, Committed, Entity, IdentityStore, Repository, StagedChanges, Store};
use crate::errors::PersistenceError;
use crate::models::client::Client;
use crate::models::identity::Identity;

pub type PgQueryAs<'q, T> = QueryAs<'q, Postgres, T, PgArguments>;

/// Table metadata for entities stored in Postgres.
///
/// The primary key column is always `id`; `COLUMNS` lists the remaining
/// columns in the order `bind_columns` binds them.
pub trait PgEntity: Entity + Unpin + for<'r> sqlx::FromRow<'r, PgRow> {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn bind_columns<'q>(&'q self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self>;
}

impl PgEntity for Client {
    const TABLE: &'static str = "clients";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn bind_columns<'q>(&'q self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query.bind(&self.name)
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    identities: Arc<PgIdentityStore>,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            identities: Arc::new(PgIdentityStore { pool: pool.clone() }),
            pool,
        }
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    fn clients(&self) -> Box<dyn Repository<Client>> {
        Box::new(PgRepository::<Client>::new(self.pool.clone()))
    }

    fn identities(&self) -> Arc<dyn IdentityStore> {
        self.identities.clone()
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// -- Generic Repository --

pub struct PgRepository<T> {
    pool: PgPool,
    staged: StagedChanges<T>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: PgEntity> PgRepository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            staged: StagedChanges::default(),
            _entity: PhantomData,
        }
    }
}

fn all_columns<T: PgEntity>() -> String {
    std::iter::once("id")
        .chain(T::COLUMNS.iter().copied())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn select_sql<T: PgEntity>() -> String {
    format!("SELECT {} FROM {}", all_columns::<T>(), T::TABLE)
}

pub fn insert_sql<T: PgEntity>() -> String {
    let placeholders = (1..=T::COLUMNS.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        T::TABLE,
        T::COLUMNS.join(", "),
        placeholders,
        all_columns::<T>()
    )
}

/// Column values bind first, the id binds last.
pub fn update_sql<T: PgEntity>() -> String {
    let assignments = T::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ${}", col, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE id = ${} RETURNING {}",
        T::TABLE,
        assignments,
        T::COLUMNS.len() + 1,
        all_columns::<T>()
    )
}

pub fn delete_sql<T: PgEntity>() -> String {
    format!("DELETE FROM {} WHERE id = $1", T::TABLE)
}

#[async_trait]
impl<T: PgEntity> Repository<T> for PgRepository<T> {
    async fn get_by_id(&self, id: i32) -> Result<Option<T>, PersistenceError> {
        let sql = format!("{} WHERE id = $1", select_sql::<T>());
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_all(&self) -> Result<Vec<T>, PersistenceError> {
        let sql = format!("{} ORDER BY id ASC", select_sql::<T>());
        let rows = sqlx::query_as::<_, T>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    fn add(&self, entity: T) {
        self.staged.push(Change::Insert(entity));
    }

    fn update(&self, entity: T) {
        self.staged.push(Change::Update(entity));
    }

    fn remove(&self, entity: T) {
        self.staged.push(Change::Remove(entity));
    }

    async fn save(&self) -> Result<Committed<T>, PersistenceError> {
        let changes = self.staged.take();
        let mut committed = Committed::default();
        if changes.is_empty() {
            return Ok(committed);
        }

        // Dropping the transaction on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        for change in changes {
            match change {
                Change::Insert(entity) => {
                    let sql = insert_sql::<T>();
                    let row = entity
                        .bind_columns(sqlx::query_as::<_, T>(&sql))
                        .fetch_one(&mut *tx)
                        .await?;
                    committed.inserted.push(row);
                }
                Change::Update(entity) => {
                    let sql = update_sql::<T>();
                    let row = entity
                        .bind_columns(sqlx::query_as::<_, T>(&sql))
                        .bind(entity.id())
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or(PersistenceError::MissingRow {
                            entity: T::NAME,
                            id: entity.id(),
                        })?;
                    committed.updated.push(row);
                }
                Change::Remove(entity) => {
                    let sql = delete_sql::<T>();
                    let result = sqlx::query(&sql)
                        .bind(entity.id())
                        .execute(&mut *tx)
                        .await?;
                    if result.rows_affected() == 0 {
                        return Err(PersistenceError::MissingRow {
                            entity: T::NAME,
                            id: entity.id(),
                        });
                    }
                    committed.removed += 1;
                }
            }
        }

        tx.commit().await?;

        tracing::debug!(
            entity = T::NAME,
            inserted = committed.inserted.len(),
            updated = committed.updated.len(),
            removed = committed.removed,
            "committed staged changes"
        );
        Ok(committed)
    }

    fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }
}

// -- Identity Operations --

pub struct PgIdentityStore {
    pool: PgPool,
}

const IDENTITY_COLUMNS: &str = "id, username, email, password_hash, security_stamp, lockout_enabled, lockout_end, access_failed_count, created_at";

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, PersistenceError> {
        let sql = format!("SELECT {} FROM identities WHERE username = $1", IDENTITY_COLUMNS);
        let row = sqlx::query_as::<_, Identity>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert(&self, identity: &Identity) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"INSERT INTO identities (id, username, email, password_hash, security_stamp, lockout_enabled, lockout_end, access_failed_count, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(identity.id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(identity.security_stamp)
        .bind(identity.lockout_enabled)
        .bind(identity.lockout_end)
        .bind(identity.access_failed_count)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Identity>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM identities ORDER BY created_at ASC",
            IDENTITY_COLUMNS
        );
        let rows = sqlx::query_as::<_, Identity>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
