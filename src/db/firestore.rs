// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (account documents keyed by user id)
//! - Email / username claims (one document per normalized value, the
//!   uniqueness constraint a document store does not give us)
//! - Fitness records (queried by owner)

use super::{collections, CredentialStore, Datastore, RecordStore};
use crate::error::AppError;
use crate::models::user::normalize_identifier;
use crate::models::{FitnessRecord, NewUser, User};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claim document pointing a unique value at its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityClaim {
    user_id: Uuid,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator does not accept real credentials.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Storage(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client for testing (offline mode).
    ///
    /// All database operations will return a storage error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Storage("Database not connected (offline mode)".to_string()))
    }

    /// Document id for a claim. Emails may contain characters Firestore
    /// reserves in document ids.
    fn claim_id(value: &str) -> String {
        urlencoding::encode(&normalize_identifier(value)).into_owned()
    }

    async fn get_claim(&self, collection: &str, value: &str) -> Result<Option<Uuid>, AppError> {
        let claim: Option<IdentityClaim> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&Self::claim_id(value))
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(claim.map(|c| c.user_id))
    }

    /// Which of `user`'s unique values is now held by someone else, if any.
    async fn claimed_field(&self, user: &User) -> Option<&'static str> {
        let taken = |owner: Option<Uuid>| owner.is_some_and(|id| id != user.id);

        if taken(self.get_claim(collections::USER_EMAILS, &user.email).await.ok()?) {
            Some("email")
        } else if taken(self.get_claim(collections::USER_NAMES, &user.username).await.ok()?) {
            Some("username")
        } else {
            None
        }
    }

    async fn get_record(&self, record_id: Uuid) -> Result<Option<FitnessRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::FITNESS_RECORDS)
            .obj()
            .one(&record_id.to_string())
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }
}

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let user_id = match self.get_claim(collections::USER_EMAILS, identifier).await? {
            Some(id) => Some(id),
            None => self.get_claim(collections::USER_NAMES, identifier).await?,
        };

        match user_id {
            Some(id) => self.find_user_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }

    /// Create the user and both claim documents in one transaction.
    ///
    /// The claims are written with an "must not exist" precondition, so two
    /// concurrent registrations for the same email cannot both commit.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let user = User::from_new(new_user);

        // Fast path for the common case, with a precise field name.
        if self
            .get_claim(collections::USER_EMAILS, &user.email)
            .await?
            .is_some()
        {
            return Err(AppError::Duplicate("email".to_string()));
        }
        if self
            .get_claim(collections::USER_NAMES, &user.username)
            .await?
            .is_some()
        {
            return Err(AppError::Duplicate("username".to_string()));
        }

        let client = self.get_client()?;
        let claim = IdentityClaim { user_id: user.id };

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to begin transaction: {}", e)))?;

        for (collection, value) in [
            (collections::USER_EMAILS, &user.email),
            (collections::USER_NAMES, &user.username),
        ] {
            client
                .fluent()
                .update()
                .in_col(collection)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(Self::claim_id(value))
                .object(&claim)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Storage(format!("Failed to add claim to transaction: {}", e))
                })?;
        }

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.id.to_string())
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Storage(format!("Failed to add user to transaction: {}", e)))?;

        match transaction.commit().await {
            Ok(_) => {
                tracing::info!(user_id = %user.id, "User created");
                Ok(user)
            }
            // Lost a race against a concurrent registration.
            Err(FirestoreError::DataConflictError(_)) => {
                Err(AppError::Duplicate("email or username".to_string()))
            }
            // Contention can also surface as an aborted transaction.
            Err(e) => match self.claimed_field(&user).await {
                Some(field) => Err(AppError::Duplicate(field.to_string())),
                None => Err(AppError::Storage(format!("Transaction commit failed: {}", e))),
            },
        }
    }
}

#[async_trait]
impl RecordStore for FirestoreDb {
    async fn insert_record(&self, record: &FitnessRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::FITNESS_RECORDS)
            .document_id(record.id.to_string())
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Requires a composite index on (`user_id`, `date` desc, `created_at` desc).
    async fn list_records_for_user(&self, user_id: Uuid) -> Result<Vec<FitnessRecord>, AppError> {
        let owner = user_id.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::FITNESS_RECORDS)
            .filter(move |q| q.for_all([q.field("user_id").eq(owner.clone())]))
            .order_by([
                ("date", firestore::FirestoreQueryDirection::Descending),
                ("created_at", firestore::FirestoreQueryDirection::Descending),
            ])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }

    async fn get_record_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<FitnessRecord>, AppError> {
        Ok(self
            .get_record(record_id)
            .await?
            .filter(|record| record.user_id == user_id))
    }

    async fn delete_record_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<bool, AppError> {
        if self.get_record_for_user(user_id, record_id).await?.is_none() {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::FITNESS_RECORDS)
            .document_id(record_id.to_string())
            .execute()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        tracing::debug!(%user_id, %record_id, "Fitness record deleted");
        Ok(true)
    }
}

impl Datastore for FirestoreDb {
    fn backend(&self) -> &'static str {
        "firestore"
    }
}
