// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fitness Tracker: accounts, sessions and per-user fitness records
//!
//! This crate provides the backend for a small fitness tracker. Users
//! register, log in, and read or write only their own daily entries.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Datastore;
use error::AppError;
use services::{AccountService, PasswordHasher, RecordService, SessionManager};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Datastore>,
    pub sessions: SessionManager,
    pub accounts: AccountService,
    pub records: RecordService,
}

impl AppState {
    /// Wire the services around an already-constructed datastore.
    pub fn new<S: Datastore + 'static>(config: Config, store: Arc<S>) -> Result<Self, AppError> {
        let sessions = SessionManager::from_config(&config)?;
        let hasher = PasswordHasher::new(config.password_work_factor)?;
        let accounts = AccountService::new(store.clone(), hasher, sessions.clone());
        let records = RecordService::new(store.clone());
        let store: Arc<dyn Datastore> = store;

        Ok(Self {
            config,
            store,
            sessions,
            accounts,
            records,
        })
    }
}
