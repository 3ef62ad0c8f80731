//! Database layer (Firestore).

pub mod firestore;
pub mod populate;

pub use firestore::{is_valid_document_id, ActivityCascade, FirestoreDb};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email claims keyed by the email itself, one per user
    pub const USER_EMAILS: &str = "user_emails";
    pub const ACTIVITIES: &str = "activities";
    pub const ENERGY_OWNERS: &str = "energy_owners";
    pub const SUPERVISORS: &str = "supervisors";
    pub const WORKERS: &str = "workers";
    pub const EQUIPMENTS: &str = "equipments";
    /// Named sequences (keyed by sequence name)
    pub const COUNTERS: &str = "counters";
}

/// Counter that numbers activities.
pub const ACTIVITY_SEQUENCE: &str = "activityId";
