// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod accounts;
pub mod password;
pub mod records;
pub mod session;

pub use accounts::{AccountService, Credentials, Registration};
pub use password::PasswordHasher;
pub use records::RecordService;
pub use session::{SessionManager, SessionToken, SESSION_COOKIE};
