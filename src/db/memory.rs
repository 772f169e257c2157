//! In-process datastore backed by concurrent maps.
//!
//! Used for local development (`DATASTORE=memory`) and the test suite.
//! Records are bucketed per owner, so a listing can only ever see the
//! caller's own bucket.

use super::{CredentialStore, Datastore, RecordStore};
use crate::error::AppError;
use crate::models::fitness::sort_newest_first;
use crate::models::user::normalize_identifier;
use crate::models::{FitnessRecord, NewUser, User};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<Uuid, User>>,
    /// Normalized email -> user id
    emails: Arc<DashMap<String, Uuid>>,
    /// Normalized username -> user id
    usernames: Arc<DashMap<String, Uuid>>,
    records: Arc<DashMap<Uuid, Vec<FitnessRecord>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` in `index` for `user_id`. Returns false if already taken.
    fn claim(index: &DashMap<String, Uuid>, key: String, user_id: Uuid) -> bool {
        match index.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(user_id);
                true
            }
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryDb {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let key = normalize_identifier(identifier);
        let user_id = self
            .emails
            .get(&key)
            .or_else(|| self.usernames.get(&key))
            .map(|entry| *entry.value());

        Ok(user_id.and_then(|id| self.users.get(&id).map(|u| u.value().clone())))
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let user = User::from_new(new_user);
        let email_key = normalize_identifier(&user.email);
        let username_key = normalize_identifier(&user.username);

        if !Self::claim(&self.emails, email_key.clone(), user.id) {
            return Err(AppError::Duplicate("email".to_string()));
        }
        if !Self::claim(&self.usernames, username_key, user.id) {
            // Release the email claim so a retry with another username works.
            self.emails.remove_if(&email_key, |_, id| *id == user.id);
            return Err(AppError::Duplicate("username".to_string()));
        }

        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl RecordStore for MemoryDb {
    async fn insert_record(&self, record: &FitnessRecord) -> Result<(), AppError> {
        self.records
            .entry(record.user_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn list_records_for_user(&self, user_id: Uuid) -> Result<Vec<FitnessRecord>, AppError> {
        let mut records = self
            .records
            .get(&user_id)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn get_record_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<FitnessRecord>, AppError> {
        Ok(self
            .records
            .get(&user_id)
            .and_then(|bucket| bucket.iter().find(|r| r.id == record_id).cloned()))
    }

    async fn delete_record_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<bool, AppError> {
        let Some(mut bucket) = self.records.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = bucket.len();
        bucket.retain(|r| r.id != record_id);
        Ok(bucket.len() != before)
    }
}

impl Datastore for MemoryDb {
    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$argon2id$stub".to_string(),
        }
    }

    fn record(user_id: Uuid, date: &str) -> FitnessRecord {
        FitnessRecord {
            id: Uuid::new_v4(),
            user_id,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            steps: 1000,
            calories: 100,
            distance: 1.0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username() {
        let db = MemoryDb::new();
        db.create_user(new_user("a@example.com", "alice")).await.unwrap();

        let err = db
            .create_user(new_user("A@Example.com", "someone"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate(ref f) if f == "email"));

        let err = db
            .create_user(new_user("b@example.com", "ALICE"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate(ref f) if f == "username"));

        // The failed attempt above must not have kept its email claim.
        db.create_user(new_user("b@example.com", "bob")).await.unwrap();
    }

    #[tokio::test]
    async fn test_find_by_identifier() {
        let db = MemoryDb::new();
        let created = db
            .create_user(new_user("alice@example.com", "alice"))
            .await
            .unwrap();

        let by_name = db.find_by_identifier("alice").await.unwrap().unwrap();
        let by_email = db.find_by_identifier("Alice@Example.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_email.id, created.id);
        assert!(db.find_by_identifier("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let db = MemoryDb::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.create_user(new_user("race@example.com", &format!("racer{}", i)))
                    .await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn test_records_scoped_by_owner() {
        let db = MemoryDb::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let a_rec = record(a, "2024-01-01");
        let b_rec = record(b, "2024-01-01");
        db.insert_record(&a_rec).await.unwrap();
        db.insert_record(&b_rec).await.unwrap();

        let listed = db.list_records_for_user(a).await.unwrap();
        assert_eq!(listed, vec![a_rec.clone()]);

        assert!(db.get_record_for_user(a, b_rec.id).await.unwrap().is_none());
        assert!(!db.delete_record_for_user(a, b_rec.id).await.unwrap());
        assert_eq!(db.list_records_for_user(b).await.unwrap().len(), 1);

        assert!(db.delete_record_for_user(a, a_rec.id).await.unwrap());
        assert!(db.list_records_for_user(a).await.unwrap().is_empty());
    }
}
