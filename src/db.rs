//! Persistence seam. Handlers only see [`Store`]; Postgres backs it in
//! production and an in-memory map backs it in tests.

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, PasswordReset, Theme, User, UserPatch},
    records::model::{
        BillTrackerRecord, Contractor, ContractorRecord, EpbgRecord, NewBillTrackerRecord,
        NewContractorRecord, NewEpbgRecord,
    },
    renewal::scan::ExpiryCandidate,
};

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint would be violated.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    // users

    /// Matches `login` against the email column when it contains `@`,
    /// otherwise against the username column.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    /// Newest first.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn count_users(&self) -> Result<i64, StoreError>;
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;
    /// Returns `false` when no such user exists.
    async fn update_user(&self, id: i64, patch: &UserPatch) -> Result<bool, StoreError>;
    async fn delete_user(&self, id: i64) -> Result<bool, StoreError>;
    async fn set_theme(&self, id: i64, theme: Theme) -> Result<(), StoreError>;

    // sessions

    async fn create_session(&self, user_id: i64, expires_at: OffsetDateTime) -> Result<Uuid, StoreError>;
    /// The owner of a live session.
    async fn session_user(&self, session_id: Uuid, now: OffsetDateTime) -> Result<Option<User>, StoreError>;
    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError>;
    /// Drops every session that expired at or before `now`.
    async fn purge_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, StoreError>;

    // password resets

    async fn insert_reset(
        &self,
        email: &str,
        otp_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;
    /// Unused, unexpired requests for `email`, newest first.
    async fn active_resets(&self, email: &str, now: OffsetDateTime) -> Result<Vec<PasswordReset>, StoreError>;
    /// Marks the request used and sets the new password in one step. Returns
    /// `false` if the request had already been consumed.
    async fn complete_reset(&self, reset_id: i64, email: &str, new_password: &str) -> Result<bool, StoreError>;

    // records; saves replace the whole table

    async fn list_contractor_records(&self) -> Result<Vec<ContractorRecord>, StoreError>;
    async fn replace_contractor_records(&self, records: &[NewContractorRecord]) -> Result<usize, StoreError>;
    async fn list_bill_records(&self) -> Result<Vec<BillTrackerRecord>, StoreError>;
    async fn replace_bill_records(&self, records: &[NewBillTrackerRecord]) -> Result<usize, StoreError>;
    async fn list_epbg_records(&self) -> Result<Vec<EpbgRecord>, StoreError>;
    async fn replace_epbg_records(&self, records: &[NewEpbgRecord]) -> Result<usize, StoreError>;

    async fn list_contractors(&self) -> Result<Vec<Contractor>, StoreError>;
    async fn add_contractor(&self, name: &str) -> Result<Contractor, StoreError>;

    /// Contractor-list and bill-tracker rows whose end date is within `[from, to]`.
    async fn contracts_ending_between(&self, from: Date, to: Date) -> Result<Vec<ExpiryCandidate>, StoreError>;
}
