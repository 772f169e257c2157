//! Database layer.
//!
//! Handlers never talk to a backend directly. They go through the
//! [`CredentialStore`] and [`RecordStore`] traits, implemented by
//! interchangeable adapters:
//!
//! - [`FirestoreDb`]: document store
//! - [`PgStore`]: relational store
//! - [`MemoryDb`]: in-process maps for local development and tests

pub mod firestore;
pub mod memory;
pub mod postgres;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;
pub use postgres::PgStore;

use crate::error::AppError;
use crate::models::{FitnessRecord, NewUser, User};
use async_trait::async_trait;
use uuid::Uuid;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Uniqueness claims, keyed by normalized email
    pub const USER_EMAILS: &str = "user_emails";
    /// Uniqueness claims, keyed by normalized username
    pub const USER_NAMES: &str = "user_names";
    pub const FITNESS_RECORDS: &str = "fitness_data";
}

/// Persistence of user accounts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look a user up by username or email. Not found is `Ok(None)`.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    /// Insert a user. Fails with [`AppError::Duplicate`] naming the field
    /// when the email or username is already taken.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError>;
}

/// Persistence of fitness records.
///
/// Every read and delete takes the owner's id and must filter on it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_record(&self, record: &FitnessRecord) -> Result<(), AppError>;

    /// All records of `user_id`, date descending then newest insertion first.
    async fn list_records_for_user(&self, user_id: Uuid) -> Result<Vec<FitnessRecord>, AppError>;

    async fn get_record_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<FitnessRecord>, AppError>;

    /// Returns `false` when no record with that id belongs to `user_id`.
    async fn delete_record_for_user(&self, user_id: Uuid, record_id: Uuid)
        -> Result<bool, AppError>;
}

/// A complete backend.
pub trait Datastore: CredentialStore + RecordStore {
    /// Short backend name for logs and the health check.
    fn backend(&self) -> &'static str;
}
