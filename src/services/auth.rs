// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential login and session token issuance.

use serde::Deserialize;
use validator::Validate;

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::middleware::auth::create_jwt;
use crate::models::User;
use crate::services::users::verify_password;

/// Payload for `POST /auth/login`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Successful login: the signed token and the user it was issued for.
#[derive(Debug)]
pub struct LoginResult {
    pub token: String,
    pub user: User,
}

#[derive(Clone)]
pub struct AuthService {
    db: FirestoreDb,
    signing_key: Vec<u8>,
    ttl_seconds: u64,
}

impl AuthService {
    pub fn new(db: FirestoreDb, signing_key: Vec<u8>, ttl_seconds: u64) -> Self {
        Self {
            db,
            signing_key,
            ttl_seconds,
        }
    }

    /// Verify credentials and issue a session token.
    ///
    /// Unknown email is `NotFound`, wrong password is `BadRequest`.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResult> {
        request.validate()?;

        let user = self
            .db
            .find_user_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))?;

        if !verify_password(request.password, user.password_hash.clone()).await? {
            tracing::warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AppError::BadRequest("Contraseña incorrecta".to_string()));
        }

        let token = create_jwt(&user.id, &self.signing_key, self.ttl_seconds)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

        tracing::info!(user_id = %user.id, "Login successful");

        Ok(LoginResult { token, user })
    }

    /// Session lifetime, used for the cookie max-age.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }
}
