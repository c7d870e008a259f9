//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use crate::domain::{LoginSource, User};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub verified: bool,
    pub login_source: String,
    pub authorizer_id: Option<String>,
    pub mfa_enabled: bool,
    pub failed_otp_attempts: i32,
    pub account_locked_until: Option<DateTimeUtc>,
    pub last_activity_at: Option<DateTimeUtc>,
    pub logout_pin: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    /// Soft delete timestamp (NULL = active, set = deleted)
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        User {
            id: model.id,
            email: model.email,
            password_hash: model.password_hash,
            first_name: model.first_name,
            last_name: model.last_name,
            verified: model.verified,
            login_source: LoginSource::from(model.login_source.as_str()),
            authorizer_id: model.authorizer_id,
            mfa_enabled: model.mfa_enabled,
            failed_otp_attempts: model.failed_otp_attempts,
            account_locked_until: model.account_locked_until,
            last_activity_at: model.last_activity_at,
            logout_pin: model.logout_pin,
            created_at: model.created_at,
            updated_at: model.updated_at,
            deleted_at: model.deleted_at,
        }
    }
}

/// Every column set from the domain entity; used for inserts and full saves.
impl From<&User> for ActiveModel {
    fn from(user: &User) -> Self {
        ActiveModel {
            id: Set(user.id),
            email: Set(user.email.clone()),
            password_hash: Set(user.password_hash.clone()),
            first_name: Set(user.first_name.clone()),
            last_name: Set(user.last_name.clone()),
            verified: Set(user.verified),
            login_source: Set(user.login_source.as_str().to_string()),
            authorizer_id: Set(user.authorizer_id.clone()),
            mfa_enabled: Set(user.mfa_enabled),
            failed_otp_attempts: Set(user.failed_otp_attempts),
            account_locked_until: Set(user.account_locked_until),
            last_activity_at: Set(user.last_activity_at),
            logout_pin: Set(user.logout_pin.clone()),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
            deleted_at: Set(user.deleted_at),
        }
    }
}
