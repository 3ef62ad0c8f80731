// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lockout activity model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Equipment, PopulatedEnergyOwner};

/// Attestation that energy sources were measured at zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ZeroEnergyValidation {
    #[serde(default)]
    pub validator_name: Option<String>,
    #[serde(default)]
    pub instrument_used: Option<String>,
    /// Reading as entered by the validator (free text, units included)
    #[serde(default)]
    pub energy_value: Option<String>,
}

/// Stored activity record in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Activity {
    /// Document ID
    #[serde(rename = "_id")]
    pub id: String,
    /// Human-facing sequence number from the `activityId` counter
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub activity_id: u64,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub is_blocked: bool,
    pub block_type: String,
    /// Creation time (RFC 3339)
    pub created_at: String,
    /// Energy owner document IDs. Block updates append user IDs here too.
    #[serde(default)]
    pub energy_owners: Vec<String>,
    /// Equipment document IDs
    #[serde(default)]
    pub equipments: Vec<String>,
    #[serde(default)]
    pub zero_energy_validation: Option<ZeroEnergyValidation>,
}

/// Activity with its reference chain materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PopulatedActivity {
    #[serde(rename = "_id")]
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub activity_id: u64,
    pub name: String,
    pub description: String,
    pub is_blocked: bool,
    pub block_type: String,
    pub created_at: String,
    pub energy_owners: Vec<PopulatedEnergyOwner>,
    pub equipments: Vec<Equipment>,
    pub zero_energy_validation: Option<ZeroEnergyValidation>,
}
