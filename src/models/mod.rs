// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod crew;
pub mod equipment;
pub mod user;

pub use activity::{Activity, PopulatedActivity, ZeroEnergyValidation};
pub use crew::{EnergyOwner, PopulatedEnergyOwner, PopulatedSupervisor, Supervisor, Worker};
pub use equipment::Equipment;
pub use user::{EmailReservation, Profile, User, UserResponse};

/// Generate a fresh document identifier.
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
