// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (directory accounts)
//! - Activities (lockout work tasks)
//! - The activity creation cascade (workers, supervisors, energy owners, equipment)
//! - Named sequence counters

use crate::db::collections;
use crate::error::AppError;
use crate::models::{
    Activity, EmailReservation, EnergyOwner, Equipment, Supervisor, User, Worker,
};
use firestore::errors::{BackoffError, FirestoreError};
use firestore::{FirestoreTransactionOptions, FirestoreWritePrecondition};
use futures_util::{FutureExt, StreamExt};
use gcloud_sdk::google::firestore::v1::value::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
pub const MAX_CASCADE_WRITES: usize = 400;

const MAX_COUNTER_ATTEMPTS: u32 = 5;
const COUNTER_RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Upper bound on retries of a contended read-write transaction.
const TRANSACTION_DEADLINE_SECS: i64 = 30;

/// Documents that carry their own ID in the `_id` field.
pub trait Document {
    fn id(&self) -> &str;
}

macro_rules! impl_document {
    ($($ty:ty),*) => {
        $(impl Document for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

impl_document!(Worker, Supervisor, EnergyOwner, Equipment, Activity, User);

/// Every document written by one activity creation.
#[derive(Debug, Clone)]
pub struct ActivityCascade {
    pub workers: Vec<Worker>,
    pub supervisors: Vec<Supervisor>,
    pub energy_owners: Vec<EnergyOwner>,
    pub equipments: Vec<Equipment>,
    pub activity: Activity,
}

impl ActivityCascade {
    /// Number of document writes the cascade needs (activity included).
    pub fn write_count(&self) -> usize {
        self.workers.len()
            + self.supervisors.len()
            + self.energy_owners.len()
            + self.equipments.len()
            + 1
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by document ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look up a user by login email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field("email").eq(email)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    /// List every user in the directory.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a new user and claim its email in one transaction.
    ///
    /// Fails with 400 if another user already holds the email.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let client = self.get_client()?;

        client
            .run_transaction_with_options(
                |db, transaction| {
                    let user = user.clone();
                    async move {
                        if let Some(claim) = read_reservation(&db, &user.email).await? {
                            tracing::debug!(email = %user.email, owner = %claim.user_id, "Email already claimed");
                            return Err(BackoffError::permanent(email_taken(&user.email)));
                        }

                        let claim = EmailReservation::new(&user.email, &user.id);
                        db.fluent()
                            .update()
                            .in_col(collections::USER_EMAILS)
                            .precondition(FirestoreWritePrecondition::Exists(false))
                            .document_id(&user.email)
                            .object(&claim)
                            .add_to_transaction(transaction)
                            .map_err(in_transaction)?;
                        db.fluent()
                            .update()
                            .in_col(collections::USERS)
                            .precondition(FirestoreWritePrecondition::Exists(false))
                            .document_id(&user.id)
                            .object(&user)
                            .add_to_transaction(transaction)
                            .map_err(in_transaction)?;
                        Ok::<_, BackoffError<AppError>>(())
                    }
                    .boxed()
                },
                transaction_options(),
            )
            .await
            .map_err(|e| match e {
                // A create precondition lost to a concurrent claim
                FirestoreError::DataConflictError(_) => email_taken(&user.email),
                other => from_transaction(other),
            })
    }

    /// Replace a stored user, moving its email claim if the email changed.
    ///
    /// Fails with 404 if the user no longer exists and with 400 if the new
    /// email belongs to someone else.
    pub async fn update_user(&self, user: &User) -> Result<(), AppError> {
        let client = self.get_client()?;

        client
            .run_transaction_with_options(
                |db, transaction| {
                    let user = user.clone();
                    async move {
                        let stored: User = db
                            .fluent()
                            .select()
                            .by_id_in(collections::USERS)
                            .obj()
                            .one(&user.id)
                            .await
                            .map_err(in_transaction)?
                            .ok_or_else(|| {
                                BackoffError::permanent(AppError::NotFound(
                                    "Usuario not found".to_string(),
                                ))
                            })?;

                        if stored.email != user.email {
                            let new_claim = read_reservation(&db, &user.email).await?;
                            if new_claim.is_some_and(|c| c.user_id != user.id) {
                                return Err(BackoffError::permanent(email_taken(&user.email)));
                            }
                            let old_claim = read_reservation(&db, &stored.email).await?;

                            let claim = EmailReservation::new(&user.email, &user.id);
                            db.fluent()
                                .update()
                                .in_col(collections::USER_EMAILS)
                                .document_id(&user.email)
                                .object(&claim)
                                .add_to_transaction(transaction)
                                .map_err(in_transaction)?;

                            if old_claim.is_some_and(|c| c.user_id == user.id) {
                                db.fluent()
                                    .delete()
                                    .from(collections::USER_EMAILS)
                                    .document_id(&stored.email)
                                    .add_to_transaction(transaction)
                                    .map_err(in_transaction)?;
                            }
                        }

                        db.fluent()
                            .update()
                            .in_col(collections::USERS)
                            .document_id(&user.id)
                            .object(&user)
                            .add_to_transaction(transaction)
                            .map_err(in_transaction)?;
                        Ok::<_, BackoffError<AppError>>(())
                    }
                    .boxed()
                },
                transaction_options(),
            )
            .await
            .map_err(from_transaction)
    }

    /// Delete a user and release its email claim.
    ///
    /// Deleting a missing user is not an error.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), AppError> {
        let client = self.get_client()?;

        client
            .run_transaction_with_options(
                |db, transaction| {
                    let user_id = user_id.to_string();
                    async move {
                        let stored: Option<User> = db
                            .fluent()
                            .select()
                            .by_id_in(collections::USERS)
                            .obj()
                            .one(&user_id)
                            .await
                            .map_err(in_transaction)?;
                        let Some(stored) = stored else {
                            return Ok(());
                        };

                        let claim = read_reservation(&db, &stored.email).await?;
                        if claim.is_some_and(|c| c.user_id == user_id) {
                            db.fluent()
                                .delete()
                                .from(collections::USER_EMAILS)
                                .document_id(&stored.email)
                                .add_to_transaction(transaction)
                                .map_err(in_transaction)?;
                        }
                        db.fluent()
                            .delete()
                            .from(collections::USERS)
                            .document_id(&user_id)
                            .add_to_transaction(transaction)
                            .map_err(in_transaction)?;
                        Ok::<_, BackoffError<AppError>>(())
                    }
                    .boxed()
                },
                transaction_options(),
            )
            .await
            .map_err(from_transaction)
    }

    /// Who holds `email`, if anyone.
    pub async fn get_email_reservation(
        &self,
        email: &str,
    ) -> Result<Option<EmailReservation>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(email)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Get an activity by document ID (references unpopulated).
    pub async fn get_activity(&self, id: &str) -> Result<Option<Activity>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all activities ordered by sequence number.
    pub async fn list_activities(&self) -> Result<Vec<Activity>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .order_by([("activityId", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Read-modify-write an activity inside a transaction.
    ///
    /// `mutate` runs against the transaction's snapshot and may run more
    /// than once when a concurrent writer forces a retry. Fails with 404 if
    /// the activity does not exist.
    pub async fn update_activity<F>(&self, id: &str, mutate: F) -> Result<Activity, AppError>
    where
        F: Fn(&mut Activity) + Clone + Send + Sync + 'static,
    {
        let client = self.get_client()?;

        client
            .run_transaction_with_options(
                |db, transaction| {
                    let id = id.to_string();
                    let mutate = mutate.clone();
                    async move {
                        let mut activity: Activity = db
                            .fluent()
                            .select()
                            .by_id_in(collections::ACTIVITIES)
                            .obj()
                            .one(&id)
                            .await
                            .map_err(in_transaction)?
                            .ok_or_else(|| {
                                BackoffError::permanent(AppError::NotFound(
                                    "Activity not found".to_string(),
                                ))
                            })?;

                        mutate(&mut activity);

                        db.fluent()
                            .update()
                            .in_col(collections::ACTIVITIES)
                            .document_id(&activity.id)
                            .object(&activity)
                            .add_to_transaction(transaction)
                            .map_err(in_transaction)?;
                        Ok::<_, BackoffError<AppError>>(activity)
                    }
                    .boxed()
                },
                transaction_options(),
            )
            .await
            .map_err(from_transaction)
    }

    /// Write every document of an activity creation in one transaction.
    ///
    /// Either the whole graph (workers, supervisors, energy owners, equipment
    /// and the activity itself) becomes visible, or none of it does.
    pub async fn insert_activity_cascade(&self, cascade: &ActivityCascade) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        if let Err(e) = stage_cascade(client, &mut transaction, cascade) {
            let _ = transaction.rollback().await;
            return Err(e);
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            activity_id = cascade.activity.activity_id,
            writes = cascade.write_count(),
            "Activity cascade committed"
        );

        Ok(())
    }

    // ─── Reference Lookups ───────────────────────────────────────

    /// Fetch many documents of one collection in a single batch read.
    ///
    /// Missing documents are absent from the returned map.
    pub async fn get_many<T>(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<HashMap<String, T>, AppError>
    where
        T: Document + for<'de> Deserialize<'de> + Send,
    {
        let mut unique: Vec<&str> = ids.iter().map(String::as_str).collect();
        unique.sort_unstable();
        unique.dedup();

        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let found: Vec<(String, Option<T>)> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj::<T>()
            .batch(unique)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .collect()
            .await;

        Ok(found
            .into_iter()
            .filter_map(|(_, doc)| doc)
            .map(|doc| (doc.id().to_string(), doc))
            .collect())
    }

    // ─── Sequence Counters ──────────────────────────────────────

    /// Atomically increment the named counter and return the new value.
    ///
    /// The counter is created on first use, so the first value is 1. The
    /// increment is a server-side transform, so concurrent callers never
    /// hold a read lock on the counter; a failed commit is retried with
    /// backoff.
    pub async fn next_sequence(&self, name: &str) -> Result<u64, AppError> {
        let client = self.get_client()?;
        let mut attempt = 1;

        loop {
            match increment_counter(client, name).await {
                Ok(seq) => {
                    tracing::debug!(counter = name, seq, attempt, "Sequence assigned");
                    return Ok(seq);
                }
                Err(e) if attempt < MAX_COUNTER_ATTEMPTS => {
                    tracing::warn!(counter = name, attempt, error = %e, "Counter increment failed, retrying");
                    tokio::time::sleep(COUNTER_RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn transaction_options() -> FirestoreTransactionOptions {
    FirestoreTransactionOptions::new()
        .with_max_elapsed_time(chrono::Duration::seconds(TRANSACTION_DEADLINE_SECS))
}

/// Classify a Firestore failure inside a transaction body.
///
/// Contention and transport errors are retried; anything else ends the
/// transaction.
fn in_transaction(e: FirestoreError) -> BackoffError<AppError> {
    match e {
        FirestoreError::DatabaseError(ref db_err) if db_err.retry_possible => {
            BackoffError::transient(AppError::Database(e.to_string()))
        }
        other => BackoffError::permanent(AppError::Database(other.to_string())),
    }
}

/// Recover the `AppError` a transaction body gave up with.
fn from_transaction(e: FirestoreError) -> AppError {
    match e {
        FirestoreError::ErrorInTransaction(failed) => match failed.source.downcast::<AppError>() {
            Ok(app_error) => *app_error,
            Err(source) => AppError::Database(source.to_string()),
        },
        other => AppError::Database(other.to_string()),
    }
}

fn email_taken(email: &str) -> AppError {
    AppError::BadRequest(format!("El email {} ya está registrado", email))
}

/// Whether `id` can name a Firestore document.
pub fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty()
        && !id.contains('/')
        && id != "."
        && id != ".."
        && !(id.starts_with("__") && id.ends_with("__"))
        && id.len() <= 1500
}

/// Read the claim on `email` through a transaction-bound client.
async fn read_reservation(
    db: &firestore::FirestoreDb,
    email: &str,
) -> Result<Option<EmailReservation>, BackoffError<AppError>> {
    db.fluent()
        .select()
        .by_id_in(collections::USER_EMAILS)
        .obj()
        .one(email)
        .await
        .map_err(in_transaction)
}

/// Queue every document of `cascade` into `transaction`.
fn stage_cascade(
    client: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction<'_>,
    cascade: &ActivityCascade,
) -> Result<(), AppError> {
    for worker in &cascade.workers {
        stage_write(client, transaction, collections::WORKERS, worker)?;
    }
    for supervisor in &cascade.supervisors {
        stage_write(client, transaction, collections::SUPERVISORS, supervisor)?;
    }
    for owner in &cascade.energy_owners {
        stage_write(client, transaction, collections::ENERGY_OWNERS, owner)?;
    }
    for equipment in &cascade.equipments {
        stage_write(client, transaction, collections::EQUIPMENTS, equipment)?;
    }
    stage_write(client, transaction, collections::ACTIVITIES, &cascade.activity)
}

/// Queue an upsert of `object` into `transaction`.
fn stage_write<T>(
    client: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction<'_>,
    collection: &str,
    object: &T,
) -> Result<(), AppError>
where
    T: Document + Serialize + for<'de> Deserialize<'de> + Send + Sync,
{
    client
        .fluent()
        .update()
        .in_col(collection)
        .document_id(object.id())
        .object(object)
        .add_to_transaction(transaction)
        .map_err(|e| {
            AppError::Database(format!(
                "Failed to add {} write to transaction: {}",
                collection, e
            ))
        })?;
    Ok(())
}

/// One increment round against `counters/{name}`.
async fn increment_counter(client: &firestore::FirestoreDb, name: &str) -> Result<u64, AppError> {
    let mut transaction = client
        .begin_transaction()
        .await
        .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

    let staged = client
        .fluent()
        .update()
        .in_col(collections::COUNTERS)
        .document_id(name)
        .transforms(|t| t.fields([t.field("seq").increment(1)]))
        .only_transform()
        .add_to_transaction(&mut transaction)
        .map(|_| ());
    if let Err(e) = staged {
        let _ = transaction.rollback().await;
        return Err(AppError::Database(format!(
            "Failed to add counter to transaction: {}",
            e
        )));
    }

    let response = transaction
        .commit()
        .await
        .map_err(|e| AppError::Database(format!("Counter commit failed: {}", e)))?;

    // The transform result carries the post-increment value
    let value = response
        .write_results
        .first()
        .and_then(|write| write.transform_results.first())
        .and_then(|v| match &v.value.value_type {
            Some(ValueType::IntegerValue(n)) => u64::try_from(*n).ok(),
            _ => None,
        });

    value.ok_or_else(|| {
        AppError::Database(format!("Counter {} returned no integer value", name))
    })
}
