// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity service.
//!
//! Handles the lockout workflow:
//! 1. Create an activity together with its authorization chain and equipment
//! 2. Read activities with every reference populated
//! 3. Block an activity on behalf of an energy-owner user

use serde::Deserialize;
use validator::Validate;

use crate::db::firestore::MAX_CASCADE_WRITES;
use crate::db::{ActivityCascade, FirestoreDb, ACTIVITY_SEQUENCE};
use crate::error::{AppError, Result};
use crate::models::{
    new_document_id, Activity, EnergyOwner, Equipment, PopulatedActivity, PopulatedEnergyOwner,
    Profile, Supervisor, User, Worker, ZeroEnergyValidation,
};
use crate::time_utils::now_rfc3339;

/// Payload for `POST /activities`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub is_blocked: bool,
    #[validate(length(min = 1, message = "blockType is required"))]
    pub block_type: String,
    #[validate(nested)]
    pub energy_owners: Vec<NewEnergyOwner>,
    #[validate(nested)]
    pub equipments: Vec<NewEquipment>,
    pub zero_energy_validation: Option<ZeroEnergyValidation>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct NewEnergyOwner {
    #[validate(length(min = 1, message = "energy owner name is required"))]
    pub name: String,
    pub is_blocked: bool,
    #[validate(nested)]
    pub supervisors: Vec<NewSupervisor>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewSupervisor {
    #[validate(length(min = 1, message = "supervisor name is required"))]
    pub name: String,
    #[validate(nested)]
    pub workers: Vec<NewWorker>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewWorker {
    #[validate(length(min = 1, message = "worker name is required"))]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewEquipment {
    #[validate(length(min = 1, message = "equipment name is required"))]
    pub name: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "equipment type is required"))]
    pub equipment_type: String,
    #[validate(length(min = 1, message = "equipment status is required"))]
    pub status: String,
}

impl CreateActivityRequest {
    /// Document writes needed to persist this request (activity included).
    pub fn planned_writes(&self) -> usize {
        let chain: usize = self
            .energy_owners
            .iter()
            .map(|owner| {
                1 + owner
                    .supervisors
                    .iter()
                    .map(|s| 1 + s.workers.len())
                    .sum::<usize>()
            })
            .sum();
        chain + self.equipments.len() + 1
    }
}

/// Build every document of a new activity.
///
/// Workers are created before the supervisor that references them, supervisors
/// before their energy owner, and equipment last, so each document only ever
/// references IDs that already exist in the cascade.
pub fn build_cascade(
    request: CreateActivityRequest,
    activity_id: u64,
    created_at: String,
) -> ActivityCascade {
    let mut workers = Vec::new();
    let mut supervisors = Vec::new();
    let mut energy_owners = Vec::new();

    for owner in request.energy_owners {
        let mut supervisor_ids = Vec::with_capacity(owner.supervisors.len());

        for supervisor in owner.supervisors {
            let worker_ids: Vec<String> = supervisor
                .workers
                .into_iter()
                .map(|w| {
                    let worker = Worker {
                        id: new_document_id(),
                        name: w.name,
                    };
                    let id = worker.id.clone();
                    workers.push(worker);
                    id
                })
                .collect();

            let supervisor = Supervisor {
                id: new_document_id(),
                name: supervisor.name,
                workers: worker_ids,
            };
            supervisor_ids.push(supervisor.id.clone());
            supervisors.push(supervisor);
        }

        energy_owners.push(EnergyOwner {
            id: new_document_id(),
            name: owner.name,
            is_blocked: owner.is_blocked,
            supervisors: supervisor_ids,
        });
    }

    let equipments: Vec<Equipment> = request
        .equipments
        .into_iter()
        .map(|e| Equipment {
            id: new_document_id(),
            name: e.name,
            equipment_type: e.equipment_type,
            status: e.status,
        })
        .collect();

    let activity = Activity {
        id: new_document_id(),
        activity_id,
        name: request.name,
        description: request.description,
        is_blocked: request.is_blocked,
        block_type: request.block_type,
        created_at,
        energy_owners: energy_owners.iter().map(|o| o.id.clone()).collect(),
        equipments: equipments.iter().map(|e| e.id.clone()).collect(),
        zero_energy_validation: request.zero_energy_validation,
    };

    ActivityCascade {
        workers,
        supervisors,
        energy_owners,
        equipments,
        activity,
    }
}

/// Reject users that may not block activities.
pub fn authorize_block(user: &User) -> Result<()> {
    if user.profile != Profile::EnergyOwner {
        return Err(AppError::Forbidden(
            "Usuario no tiene permiso para bloquear".to_string(),
        ));
    }
    Ok(())
}

/// Record `user` as a blocking energy owner.
///
/// Repeated calls append the same user again.
pub fn apply_block(activity: &mut Activity, user: &User) {
    activity.energy_owners.push(user.id.clone());
    activity.is_blocked = true;
}

/// Activity operations backed by Firestore.
#[derive(Clone)]
pub struct ActivityService {
    db: FirestoreDb,
}

impl ActivityService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Create an activity and its whole authorization chain.
    pub async fn create(&self, request: CreateActivityRequest) -> Result<PopulatedActivity> {
        request.validate()?;

        let writes = request.planned_writes();
        if writes > MAX_CASCADE_WRITES {
            return Err(AppError::BadRequest(format!(
                "Activity needs {} document writes, the limit is {}",
                writes, MAX_CASCADE_WRITES
            )));
        }

        let activity_id = self.db.next_sequence(ACTIVITY_SEQUENCE).await?;
        let cascade = build_cascade(request, activity_id, now_rfc3339());

        tracing::info!(
            activity_id,
            energy_owners = cascade.energy_owners.len(),
            supervisors = cascade.supervisors.len(),
            workers = cascade.workers.len(),
            equipments = cascade.equipments.len(),
            "Creating activity"
        );

        self.db.insert_activity_cascade(&cascade).await?;

        Ok(cascade.into_populated())
    }

    /// All activities, populated.
    pub async fn list(&self) -> Result<Vec<PopulatedActivity>> {
        let activities = self.db.list_activities().await?;
        self.db.populate_activities(activities).await
    }

    /// One activity, populated.
    pub async fn get(&self, id: &str) -> Result<PopulatedActivity> {
        let activity = self.find(id).await?;
        self.db.populate_activity(activity).await
    }

    /// An energy owner within an activity's populated owner list.
    pub async fn get_energy_owner(
        &self,
        activity_id: &str,
        energy_owner_id: &str,
    ) -> Result<PopulatedEnergyOwner> {
        let activity = self.get(activity_id).await?;

        activity
            .energy_owners
            .into_iter()
            .find(|owner| owner.id == energy_owner_id)
            .ok_or_else(|| AppError::NotFound("EnergyOwner not found".to_string()))
    }

    /// Block an activity on behalf of the user `user_id`.
    ///
    /// The append happens inside a transaction, so concurrent blocks by
    /// different users all land.
    pub async fn block(&self, activity_id: &str, user_id: &str) -> Result<Activity> {
        self.find(activity_id).await?;

        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::MethodNotAllowed("Usuario no encontrado".to_string()))?;

        if let Err(e) = authorize_block(&user) {
            tracing::warn!(
                activity_id,
                user_id,
                profile = user.profile.as_str(),
                "Rejected block request from non energy owner"
            );
            return Err(e);
        }

        let activity = self
            .db
            .update_activity(activity_id, move |activity| apply_block(activity, &user))
            .await?;

        tracing::info!(
            activity_id,
            user_id,
            sequence = activity.activity_id,
            energy_owners = activity.energy_owners.len(),
            "Activity blocked"
        );

        Ok(activity)
    }

    async fn find(&self, id: &str) -> Result<Activity> {
        self.db
            .get_activity(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))
    }
}
