// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod fitness;
pub mod user;

pub use fitness::{FitnessRecord, RecordDraft};
pub use user::{NewUser, User};
