// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reference population for activities.
//!
//! Expands activity → energy owners → supervisors → workers and
//! activity → equipments. Each level is fetched with one batch read per
//! collection, shared across every activity in the request.

use std::collections::HashMap;

use crate::db::firestore::Document;
use crate::db::{collections, ActivityCascade, FirestoreDb};
use crate::error::AppError;
use crate::models::{
    Activity, EnergyOwner, Equipment, PopulatedActivity, PopulatedEnergyOwner,
    PopulatedSupervisor, Supervisor, Worker,
};

/// Documents resolved for a set of activities, keyed by ID.
#[derive(Debug, Default)]
pub struct Lookup {
    pub energy_owners: HashMap<String, EnergyOwner>,
    pub supervisors: HashMap<String, Supervisor>,
    pub workers: HashMap<String, Worker>,
    pub equipments: HashMap<String, Equipment>,
}

impl Lookup {
    /// Materialize one activity.
    ///
    /// References that do not resolve are dropped; order and resolved
    /// duplicates are kept.
    pub fn populate(&self, activity: Activity) -> PopulatedActivity {
        let energy_owners = activity
            .energy_owners
            .iter()
            .filter_map(|id| self.energy_owners.get(id))
            .map(|owner| self.populate_owner(owner))
            .collect();

        let equipments = activity
            .equipments
            .iter()
            .filter_map(|id| self.equipments.get(id))
            .cloned()
            .collect();

        PopulatedActivity {
            id: activity.id,
            activity_id: activity.activity_id,
            name: activity.name,
            description: activity.description,
            is_blocked: activity.is_blocked,
            block_type: activity.block_type,
            created_at: activity.created_at,
            energy_owners,
            equipments,
            zero_energy_validation: activity.zero_energy_validation,
        }
    }

    fn populate_owner(&self, owner: &EnergyOwner) -> PopulatedEnergyOwner {
        PopulatedEnergyOwner {
            id: owner.id.clone(),
            name: owner.name.clone(),
            is_blocked: owner.is_blocked,
            supervisors: owner
                .supervisors
                .iter()
                .filter_map(|id| self.supervisors.get(id))
                .map(|supervisor| PopulatedSupervisor {
                    id: supervisor.id.clone(),
                    name: supervisor.name.clone(),
                    workers: supervisor
                        .workers
                        .iter()
                        .filter_map(|id| self.workers.get(id))
                        .cloned()
                        .collect(),
                })
                .collect(),
        }
    }
}

impl ActivityCascade {
    /// Materialize a freshly built cascade without reading it back.
    pub fn into_populated(self) -> PopulatedActivity {
        let lookup = Lookup {
            energy_owners: by_id(self.energy_owners),
            supervisors: by_id(self.supervisors),
            workers: by_id(self.workers),
            equipments: by_id(self.equipments),
        };
        lookup.populate(self.activity)
    }
}

fn by_id<T: Document>(docs: Vec<T>) -> HashMap<String, T> {
    docs.into_iter()
        .map(|doc| (doc.id().to_string(), doc))
        .collect()
}

impl FirestoreDb {
    /// Resolve the full reference chain for `activities`.
    pub async fn populate_activities(
        &self,
        activities: Vec<Activity>,
    ) -> Result<Vec<PopulatedActivity>, AppError> {
        let owner_ids: Vec<String> = activities
            .iter()
            .flat_map(|a| a.energy_owners.iter().cloned())
            .collect();
        let equipment_ids: Vec<String> = activities
            .iter()
            .flat_map(|a| a.equipments.iter().cloned())
            .collect();

        let (energy_owners, equipments) = tokio::try_join!(
            self.get_many::<EnergyOwner>(collections::ENERGY_OWNERS, &owner_ids),
            self.get_many::<Equipment>(collections::EQUIPMENTS, &equipment_ids),
        )?;

        let supervisor_ids: Vec<String> = energy_owners
            .values()
            .flat_map(|o| o.supervisors.iter().cloned())
            .collect();
        let supervisors = self
            .get_many::<Supervisor>(collections::SUPERVISORS, &supervisor_ids)
            .await?;

        let worker_ids: Vec<String> = supervisors
            .values()
            .flat_map(|s| s.workers.iter().cloned())
            .collect();
        let workers = self
            .get_many::<Worker>(collections::WORKERS, &worker_ids)
            .await?;

        tracing::debug!(
            activities = activities.len(),
            energy_owners = energy_owners.len(),
            supervisors = supervisors.len(),
            workers = workers.len(),
            equipments = equipments.len(),
            "Resolved activity references"
        );

        let lookup = Lookup {
            energy_owners,
            supervisors,
            workers,
            equipments,
        };

        Ok(activities
            .into_iter()
            .map(|activity| lookup.populate(activity))
            .collect())
    }

    /// Resolve the reference chain for a single activity.
    pub async fn populate_activity(&self, activity: Activity) -> Result<PopulatedActivity, AppError> {
        let mut populated = self.populate_activities(vec![activity]).await?;
        populated
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("population dropped the activity")))
    }
}
