// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User directory service: account CRUD and credential hashing.

use serde::Deserialize;

use crate::db::{is_valid_document_id, FirestoreDb};
use crate::error::{AppError, Result};
use crate::models::{new_document_id, Profile, User, UserResponse};

/// Payload for `POST /users`.
///
/// Every field is optional at the serde level so a missing value reports
/// which field is required instead of a generic parse error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    pub rut: Option<String>,
    #[serde(rename = "empresa")]
    pub company: Option<String>,
    #[serde(rename = "disciplina")]
    pub discipline: Option<String>,
    #[serde(rename = "perfil")]
    pub profile: Option<String>,
}

/// Payload for `PUT /users/{id}`. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    pub email: Option<String>,
    /// New credential; older clients send it as `contraseña`
    #[serde(alias = "contraseña")]
    pub password: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    pub rut: Option<String>,
    #[serde(rename = "empresa")]
    pub company: Option<String>,
    #[serde(rename = "disciplina")]
    pub discipline: Option<String>,
}

impl UpdateUserRequest {
    /// Apply the profile fields to `user`. The credential is handled separately.
    pub fn apply_profile(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(rut) = &self.rut {
            user.rut = Some(rut.clone());
        }
        if let Some(company) = &self.company {
            user.company = Some(company.clone());
        }
        if let Some(discipline) = &self.discipline {
            user.discipline = Some(discipline.clone());
        }
    }
}

/// Require a non-empty value for `field`.
fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("El campo {} es requerido", field)))
}

/// Emails double as document IDs of their claim.
fn check_email(email: &str) -> Result<()> {
    if !is_valid_document_id(email) {
        return Err(AppError::BadRequest(format!("El email {} no es válido", email)));
    }
    Ok(())
}

/// Hash a plaintext credential off the async runtime.
pub async fn hash_password(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

/// Check a plaintext credential against a stored bcrypt hash.
pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Verification task failed: {}", e)))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password verification failed: {}", e)))
}

/// Directory operations backed by Firestore.
#[derive(Clone)]
pub struct UserService {
    db: FirestoreDb,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(db: FirestoreDb, bcrypt_cost: u32) -> Self {
        Self { db, bcrypt_cost }
    }

    pub async fn create(&self, request: CreateUserRequest) -> Result<UserResponse> {
        let name = required(request.name, "nombre")?;
        let email = required(request.email, "email")?;
        let password = required(request.password, "password")?;
        let raw_profile = required(request.profile, "perfil")?;

        let profile = Profile::parse(&raw_profile).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Perfil inválido: {} (valores permitidos: trabajador, supervisor, duenoDeEnergia)",
                raw_profile
            ))
        })?;

        check_email(&email)?;

        let user = User {
            id: new_document_id(),
            name,
            email,
            password_hash: hash_password(password, self.bcrypt_cost).await?,
            phone: request.phone,
            rut: request.rut,
            company: request.company,
            discipline: request.discipline,
            profile,
        };

        self.db.create_user(&user).await?;
        tracing::info!(user_id = %user.id, profile = profile.as_str(), "User created");

        Ok(user.into())
    }

    pub async fn list(&self) -> Result<Vec<UserResponse>> {
        let users = self.db.list_users().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn get(&self, id: &str) -> Result<UserResponse> {
        Ok(self.find(id).await?.into())
    }

    pub async fn update(&self, id: &str, request: UpdateUserRequest) -> Result<UserResponse> {
        let mut user = self.find(id).await?;

        if let Some(email) = request.email.as_deref() {
            check_email(email)?;
        }

        request.apply_profile(&mut user);

        if let Some(password) = request.password {
            if password.is_empty() {
                return Err(AppError::BadRequest(
                    "El campo password no puede estar vacío".to_string(),
                ));
            }
            user.password_hash = hash_password(password, self.bcrypt_cost).await?;
            tracing::info!(user_id = id, "User credential rotated");
        }

        self.db.update_user(&user).await?;
        tracing::debug!(user_id = id, "User updated");

        Ok(user.into())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.find(id).await?;
        self.db.delete_user(id).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<User> {
        self.db
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Usuario not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_user() -> User {
        User {
            id: "u-1".to_string(),
            name: "Carla".to_string(),
            email: "carla@example.com".to_string(),
            password_hash: "old-hash".to_string(),
            phone: None,
            rut: Some("11.111.111-1".to_string()),
            company: Some("Minera".to_string()),
            discipline: None,
            profile: Profile::Supervisor,
        }
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let mut user = stored_user();
        let request: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "nombre": "Carla P.",
            "telefono": "+56 2 2222 2222"
        }))
        .unwrap();

        request.apply_profile(&mut user);

        assert_eq!(user.name, "Carla P.");
        assert_eq!(user.phone.as_deref(), Some("+56 2 2222 2222"));
        assert_eq!(user.email, "carla@example.com");
        assert_eq!(user.company.as_deref(), Some("Minera"));
        assert_eq!(user.password_hash, "old-hash");
        assert_eq!(user.profile, Profile::Supervisor);
    }

    #[test]
    fn test_update_accepts_legacy_credential_key() {
        let request: UpdateUserRequest =
            serde_json::from_value(serde_json::json!({ "contraseña": "nueva" })).unwrap();
        assert_eq!(request.password.as_deref(), Some("nueva"));

        let request: UpdateUserRequest =
            serde_json::from_value(serde_json::json!({ "password": "otra" })).unwrap();
        assert_eq!(request.password.as_deref(), Some("otra"));
    }

    #[test]
    fn test_update_ignores_profile_changes() {
        let mut user = stored_user();
        let request: UpdateUserRequest =
            serde_json::from_value(serde_json::json!({ "perfil": "duenoDeEnergia" })).unwrap();
        request.apply_profile(&mut user);
        assert_eq!(user.profile, Profile::Supervisor);
    }

    #[test]
    fn test_required_treats_empty_as_missing() {
        let err = required(Some(String::new()), "nombre").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request: El campo nombre es requerido"
        );
        assert_eq!(required(Some("x".into()), "nombre").unwrap(), "x");
    }

    #[test]
    fn test_email_must_name_a_document() {
        assert!(check_email("ana@example.com").is_ok());
        let err = check_email("ana/ops@example.com").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("secreto".to_string(), 4).await.unwrap();
        assert_ne!(hash, "secreto");
        assert!(verify_password("secreto".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password("otro".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_validates_before_store_access() {
        let service = UserService::new(FirestoreDb::new_mock(), 4);

        let err = service
            .create(CreateUserRequest {
                name: Some("Ana".into()),
                email: Some("ana@example.com".into()),
                password: Some("x".into()),
                profile: None,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: El campo perfil es requerido");

        let err = service
            .create(CreateUserRequest {
                name: Some("Ana".into()),
                email: Some("ana@example.com".into()),
                password: Some("x".into()),
                profile: Some("jefe".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
