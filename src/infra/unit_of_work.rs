//! Unit of Work pattern implementation.
//!
//! Manages the transaction lifecycle and repository access so that
//! multi-step account changes (signup restore, OAuth linking) commit atomically.

use async_trait::async_trait;
use sea_orm::{AccessMode, DatabaseConnection, IsolationLevel, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::repositories::{TxUserRepository, UserRepository, UserStore};
use crate::errors::{AppError, AppResult};

/// Boxed future returned by transactional closures.
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>;

/// Unit of Work trait for dependency injection.
///
/// Not mockable directly due to generic methods; tests provide a small
/// implementation that runs the closure against a mock repository.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Get user repository
    fn users(&self) -> Arc<dyn UserRepository>;

    /// Execute a closure within a ReadCommitted transaction.
    ///
    /// Committed on success, rolled back on error.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;
}

/// Transaction context providing repository access within a transaction.
///
/// Every repository call made through the context joins the same transaction.
pub struct TransactionContext<'a> {
    users: &'a dyn UserRepository,
}

impl<'a> TransactionContext<'a> {
    /// Build a context over an arbitrary repository (test doubles included).
    pub fn new(users: &'a dyn UserRepository) -> Self {
        Self { users }
    }

    /// Get user repository for this transaction
    pub fn users(&self) -> &'a dyn UserRepository {
        self.users
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    user_repo: Arc<UserStore>,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        let user_repo = Arc::new(UserStore::new(db.clone()));
        Self { db, user_repo }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(
                Some(IsolationLevel::ReadCommitted),
                Some(AccessMode::ReadWrite),
            )
            .await
            .map_err(AppError::from)?;

        let outcome = {
            let repo = TxUserRepository::new(&txn);
            f(TransactionContext::new(&repo)).await
        };

        match outcome {
            Ok(result) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}
