// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Equipment referenced by activities.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Equipment document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Equipment {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Equipment category (e.g. "bomba", "tablero")
    #[serde(rename = "type")]
    pub equipment_type: String,
    pub status: String,
}
