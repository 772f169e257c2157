// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-scoped access to fitness records.
//!
//! Every operation takes the owner's id as resolved by the auth gate.
//! Nothing a client submits can change which user a record belongs to.

use crate::db::RecordStore;
use crate::error::AppError;
use crate::models::{FitnessRecord, RecordDraft};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Dates before this are almost certainly typos.
const MIN_YEAR: i32 = 1900;

#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
}

impl RecordService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// All of `user_id`'s records, newest date first. Empty is not an error.
    pub async fn list_records(&self, user_id: Uuid) -> Result<Vec<FitnessRecord>, AppError> {
        self.store.list_records_for_user(user_id).await
    }

    /// Validate and store a record owned by `user_id`.
    pub async fn add_record(
        &self,
        user_id: Uuid,
        draft: RecordDraft,
    ) -> Result<FitnessRecord, AppError> {
        let record = build_record(user_id, draft)?;
        self.store.insert_record(&record).await?;

        tracing::info!(
            %user_id,
            record_id = %record.id,
            date = %record.date,
            "Fitness record added"
        );
        Ok(record)
    }

    pub async fn get_record(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<FitnessRecord, AppError> {
        self.store
            .get_record_for_user(user_id, record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fitness record {}", record_id)))
    }

    /// Delete one of `user_id`'s records. Someone else's record id looks
    /// exactly like a missing one.
    pub async fn delete_record(&self, user_id: Uuid, record_id: Uuid) -> Result<(), AppError> {
        if self.store.delete_record_for_user(user_id, record_id).await? {
            tracing::info!(%user_id, %record_id, "Fitness record deleted");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Fitness record {}", record_id)))
        }
    }
}

/// Turn a draft into a record, or explain which field is wrong.
fn build_record(user_id: Uuid, draft: RecordDraft) -> Result<FitnessRecord, AppError> {
    let date = parse_record_date(&draft.date)?;

    if draft.steps < 0 {
        return Err(AppError::Validation(
            "steps: must be a non-negative whole number".to_string(),
        ));
    }
    if draft.calories < 0 {
        return Err(AppError::Validation(
            "calories: must be a non-negative whole number".to_string(),
        ));
    }
    if !draft.distance.is_finite() || draft.distance < 0.0 {
        return Err(AppError::Validation(
            "distance: must be a non-negative number".to_string(),
        ));
    }

    Ok(FitnessRecord {
        id: Uuid::new_v4(),
        user_id,
        date,
        steps: draft.steps,
        calories: draft.calories,
        distance: draft.distance,
        created_at: Utc::now(),
    })
}

/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp whose UTC date is used.
pub fn parse_record_date(raw: &str) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .ok_or_else(|| {
            AppError::Validation("date: must be YYYY-MM-DD or an RFC 3339 timestamp".to_string())
        })?;

    if date.year() < MIN_YEAR {
        return Err(AppError::Validation(format!(
            "date: must not be before {}",
            MIN_YEAR
        )));
    }
    Ok(date)
}
