//! User repository with soft delete support.
//!
//! Queries are written once against `ConnectionTrait` and shared by the
//! pooled store and the transaction-scoped store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, QueryFilter, SqlErr,
};
use uuid::Uuid;

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use crate::domain::User;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User repository trait for dependency injection.
///
/// Lookups exclude soft-deleted rows unless the method name says otherwise.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find active user by ID
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find active user by email address
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Find user by email including soft-deleted
    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>>;

    /// Insert a new user. A taken email is a `Conflict`.
    async fn create(&self, user: User) -> AppResult<User>;

    /// Persist every field of an existing user
    async fn update(&self, user: User) -> AppResult<User>;

    /// Stamp last activity without loading the row
    async fn touch_last_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
}

/// Pooled implementation of UserRepository
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        queries::find_by_id(&self.db, id).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        queries::find_by_email(&self.db, email, false).await
    }

    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>> {
        queries::find_by_email(&self.db, email, true).await
    }

    async fn create(&self, user: User) -> AppResult<User> {
        queries::insert(&self.db, &user).await
    }

    async fn update(&self, user: User) -> AppResult<User> {
        queries::save(&self.db, &user).await
    }

    async fn touch_last_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        queries::touch_last_activity(&self.db, id, at).await
    }
}

/// Transaction-scoped implementation of UserRepository.
///
/// Borrows the transaction so it cannot outlive the unit of work.
pub struct TxUserRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxUserRepository<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }
}

#[async_trait]
impl<'a> UserRepository for TxUserRepository<'a> {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        queries::find_by_id(self.txn, id).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        queries::find_by_email(self.txn, email, false).await
    }

    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>> {
        queries::find_by_email(self.txn, email, true).await
    }

    async fn create(&self, user: User) -> AppResult<User> {
        queries::insert(self.txn, &user).await
    }

    async fn update(&self, user: User) -> AppResult<User> {
        queries::save(self.txn, &user).await
    }

    async fn touch_last_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        queries::touch_last_activity(self.txn, id, at).await
    }
}

mod queries {
    use super::*;

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<User>> {
        let model = UserEntity::find_by_id(id)
            .filter(user::Column::DeletedAt.is_null())
            .one(db)
            .await?;
        Ok(model.map(User::from))
    }

    pub async fn find_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
        include_deleted: bool,
    ) -> AppResult<Option<User>> {
        let mut query = UserEntity::find().filter(user::Column::Email.eq(email));
        if !include_deleted {
            query = query.filter(user::Column::DeletedAt.is_null());
        }
        Ok(query.one(db).await?.map(User::from))
    }

    pub async fn insert<C: ConnectionTrait>(db: &C, user: &User) -> AppResult<User> {
        let model = ActiveModel::from(user)
            .insert(db)
            .await
            .map_err(|e| insert_error(e.sql_err(), e))?;
        Ok(User::from(model))
    }

    /// Another signup for the same email won the race to the unique index.
    pub(super) fn insert_error(sql_err: Option<SqlErr>, err: DbErr) -> AppError {
        match sql_err {
            Some(SqlErr::UniqueConstraintViolation(constraint)) => {
                tracing::warn!(%constraint, "Concurrent signup for an existing email");
                AppError::conflict("User")
            }
            _ => AppError::from(err),
        }
    }

    pub async fn save<C: ConnectionTrait>(db: &C, user: &User) -> AppResult<User> {
        let mut active = ActiveModel::from(user);
        active.updated_at = sea_orm::Set(Utc::now());
        let model = active.update(db).await.map_err(|e| match e {
            sea_orm::DbErr::RecordNotUpdated => AppError::NotFound,
            other => AppError::from(other),
        })?;
        Ok(User::from(model))
    }

    pub async fn touch_last_activity<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = UserEntity::update_many()
            .col_expr(user::Column::LastActivityAt, Expr::value(Some(at)))
            .filter(user::Column::Id.eq(id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
