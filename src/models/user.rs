//! User directory model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Role a user plays in the lockout chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Profile {
    #[serde(rename = "trabajador")]
    Worker,
    #[serde(rename = "supervisor")]
    Supervisor,
    /// The only role allowed to block an activity.
    #[serde(rename = "duenoDeEnergia")]
    EnergyOwner,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Worker, Profile::Supervisor, Profile::EnergyOwner];

    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Worker => "trabajador",
            Profile::Supervisor => "supervisor",
            Profile::EnergyOwner => "duenoDeEnergia",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == raw)
    }
}

/// User account stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Document ID
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    /// Login identity, unique across the directory
    pub email: String,
    /// bcrypt hash; never leaves the service
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    /// Chilean national ID
    #[serde(default)]
    pub rut: Option<String>,
    #[serde(rename = "empresa", default)]
    pub company: Option<String>,
    #[serde(rename = "disciplina", default)]
    pub discipline: Option<String>,
    #[serde(rename = "perfil")]
    pub profile: Profile,
}

/// User as returned by the API (credential stripped).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    pub rut: Option<String>,
    #[serde(rename = "empresa")]
    pub company: Option<String>,
    #[serde(rename = "disciplina")]
    pub discipline: Option<String>,
    #[serde(rename = "perfil")]
    pub profile: Profile,
}

/// Claim on a login email, stored as `user_emails/{email}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailReservation {
    #[serde(rename = "_id")]
    pub email: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl EmailReservation {
    pub fn new(email: &str, user_id: &str) -> Self {
        Self {
            email: email.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            rut: user.rut,
            company: user.company,
            discipline: user.discipline,
            profile: user.profile,
        }
    }
}
