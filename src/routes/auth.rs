// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential login and session routes.

use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::SESSION_COOKIE;
use crate::error::Result;
use crate::middleware::auth::{require_auth, AuthUser};
use crate::models::UserResponse;
use crate::services::auth::LoginRequest;
use crate::AppState;

/// Routes mounted under `/auth`. Only `/me` needs a session.
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/me",
            get(get_me).route_layer(middleware::from_fn_with_state(state, require_auth)),
        )
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LogoutResponse {
    pub message: String,
}

fn session_cookie(token: String, ttl_seconds: u64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(
            i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
        ))
        .build()
}

/// Exchange email and password for a session token.
///
/// The token is returned in the body for bearer use and also set as an
/// HttpOnly cookie.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let Json(request) = payload?;
    let result = state.auth_service.login(request).await?;

    let cookie = session_cookie(result.token.clone(), state.auth_service.ttl_seconds());

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token: result.token,
        }),
    ))
}

/// Sessions are stateless, so logout only expires the cookie.
async fn logout(jar: CookieJar) -> (CookieJar, Json<LogoutResponse>) {
    // Always emitted, even when the request carried no session cookie
    let expired = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    let jar = jar.add(expired);
    (
        jar,
        Json(LogoutResponse {
            message: "Logout exitoso".to_string(),
        }),
    )
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    Ok(Json(state.user_service.get(&user.user_id).await?))
}
