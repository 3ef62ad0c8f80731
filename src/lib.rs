// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lockout-Tracker: permit and lockout/tagout tracking backend
//!
//! This crate provides the HTTP API that records lockout activities, the
//! chain of energy owners, supervisors and workers that authorize them,
//! and the user directory behind it.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{ActivityService, AuthService, UserService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub activity_service: ActivityService,
    pub user_service: UserService,
    pub auth_service: AuthService,
}

impl AppState {
    /// Wire every service to the same database handle.
    pub fn new(config: Config, db: FirestoreDb) -> Self {
        Self {
            activity_service: ActivityService::new(db.clone()),
            user_service: UserService::new(db.clone(), config.bcrypt_cost),
            auth_service: AuthService::new(
                db.clone(),
                config.jwt_signing_key.clone(),
                config.jwt_ttl_seconds,
            ),
            config,
            db,
        }
    }
}
