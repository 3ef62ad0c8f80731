// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity API integration tests.
//!
//! These tests require the Firestore emulator to be running.

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::collections::HashSet;
use tower::ServiceExt;

mod common;
use common::{body_json, create_emulator_app, empty_request, json_request, unique_suffix};

/// Activity with `owners` energy owners, each with `supervisors`
/// supervisors of `workers` workers, plus two pieces of equipment.
fn activity_body(owners: usize, supervisors: usize, workers: usize) -> Value {
    let energy_owners: Vec<Value> = (0..owners)
        .map(|o| {
            let sups: Vec<Value> = (0..supervisors)
                .map(|s| {
                    let ws: Vec<Value> = (0..workers)
                        .map(|w| json!({ "name": format!("Trabajador {o}.{s}.{w}") }))
                        .collect();
                    json!({ "name": format!("Supervisor {o}.{s}"), "workers": ws })
                })
                .collect();
            json!({ "name": format!("Dueño {o}"), "supervisors": sups })
        })
        .collect();

    json!({
        "name": "Mantención chancador",
        "description": "Cambio de revestimientos",
        "blockType": "electrico",
        "energyOwners": energy_owners,
        "equipments": [
            { "name": "Chancador 1", "type": "chancador", "status": "operativo" },
            { "name": "Correa 4", "type": "correa", "status": "detenido" }
        ]
    })
}

async fn create_activity(app: &axum::Router, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/activities", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn create_user(app: &axum::Router, profile: &str) -> Value {
    let suffix = unique_suffix();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/users",
            json!({
                "nombre": format!("Usuario {suffix}"),
                "email": format!("{suffix}@example.com"),
                "password": "secreto",
                "perfil": profile
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_create_activity_builds_full_chain() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let created = create_activity(&app, activity_body(2, 2, 3)).await;

    assert!(created["_id"].is_string());
    assert!(created.get("__v").is_none());
    assert!(created["activityId"].as_u64().unwrap() >= 1);
    assert_eq!(created["isBlocked"], false);
    assert!(created["createdAt"].is_string());

    let owners = created["energyOwners"].as_array().unwrap();
    assert_eq!(owners.len(), 2);
    for owner in owners {
        let sups = owner["supervisors"].as_array().unwrap();
        assert_eq!(sups.len(), 2);
        for sup in sups {
            assert_eq!(sup["workers"].as_array().unwrap().len(), 3);
        }
    }
    assert_eq!(created["equipments"].as_array().unwrap().len(), 2);
    assert_eq!(created["equipments"][0]["type"], "chancador");

    // Reading it back yields the same populated graph
    let id = created["_id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(empty_request("GET", &format!("/activities/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_list_contains_created_activity_in_sequence_order() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let first = create_activity(&app, activity_body(1, 1, 1)).await;
    let second = create_activity(&app, activity_body(1, 1, 1)).await;

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/activities"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list = body_json(response).await;
    let list = list.as_array().unwrap();
    let sequences: Vec<u64> = list
        .iter()
        .map(|a| a["activityId"].as_u64().unwrap())
        .collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));

    let position = |target: &Value| list.iter().position(|a| a["_id"] == target["_id"]);
    assert!(position(&first).unwrap() < position(&second).unwrap());
}

#[tokio::test]
async fn test_concurrent_creations_get_distinct_sequence_numbers() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    const CREATIONS: usize = 20;

    let handles: Vec<_> = (0..CREATIONS)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                let response = app
                    .oneshot(json_request("POST", "/activities", activity_body(1, 1, 1)))
                    .await
                    .unwrap();
                let status = response.status();
                (status, body_json(response).await)
            })
        })
        .collect();

    let mut sequences = HashSet::new();
    for handle in handles {
        let (status, created) = handle.await.unwrap();
        assert_eq!(status, StatusCode::CREATED, "creation failed: {created}");
        sequences.insert(created["activityId"].as_u64().unwrap());
    }
    assert_eq!(sequences.len(), CREATIONS);
}

#[tokio::test]
async fn test_missing_activity_is_not_found() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let response = app
        .oneshot(empty_request(
            "GET",
            &format!("/activities/missing-{}", unique_suffix()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Activity not found");
}

#[tokio::test]
async fn test_energy_owner_lookup() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let created = create_activity(&app, activity_body(2, 1, 1)).await;
    let id = created["_id"].as_str().unwrap();
    let owner = &created["energyOwners"][1];
    let owner_id = owner["_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/activities/{id}/energy-owners/{owner_id}"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, *owner);

    let response = app
        .clone()
        .oneshot(empty_request(
            "GET",
            &format!("/activities/{id}/energy-owners/nobody"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "EnergyOwner not found");

    let response = app
        .oneshot(empty_request(
            "GET",
            &format!("/activities/missing-{}/energy-owners/{owner_id}", unique_suffix()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Activity not found");
}

#[tokio::test]
async fn test_block_by_energy_owner() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let created = create_activity(&app, activity_body(1, 1, 1)).await;
    let id = created["_id"].as_str().unwrap();
    let original_owners = created["energyOwners"].as_array().unwrap().len();

    let user = create_user(&app, "duenoDeEnergia").await;
    let user_id = user["_id"].as_str().unwrap();
    let uri = format!("/activities/{id}/energyOwners/{user_id}");

    let response = app
        .clone()
        .oneshot(empty_request("PUT", &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let blocked = body_json(response).await;
    assert_eq!(blocked["isBlocked"], true);
    let refs = blocked["energyOwners"].as_array().unwrap();
    assert_eq!(refs.len(), original_owners + 1);
    assert_eq!(refs.last().unwrap(), user_id);
    // Unpopulated: references are plain identifiers
    assert!(refs[0].is_string());

    // A second block appends the same user again
    let response = app
        .clone()
        .oneshot(empty_request("PUT", &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let again = body_json(response).await;
    assert_eq!(
        again["energyOwners"].as_array().unwrap().len(),
        original_owners + 2
    );

    // The user reference does not resolve to an energy owner and is dropped
    let response = app
        .oneshot(empty_request("GET", &format!("/activities/{id}")))
        .await
        .unwrap();
    let populated = body_json(response).await;
    assert_eq!(populated["isBlocked"], true);
    assert_eq!(
        populated["energyOwners"].as_array().unwrap().len(),
        original_owners
    );
}

#[tokio::test]
async fn test_concurrent_blocks_all_persist() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let created = create_activity(&app, activity_body(1, 1, 1)).await;
    let id = created["_id"].as_str().unwrap().to_string();
    let original: Vec<String> = created["energyOwners"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["_id"].as_str().unwrap().to_string())
        .collect();

    let mut user_ids = Vec::new();
    for _ in 0..8 {
        let user = create_user(&app, "duenoDeEnergia").await;
        user_ids.push(user["_id"].as_str().unwrap().to_string());
    }

    let handles: Vec<_> = user_ids
        .iter()
        .map(|user_id| {
            let app = app.clone();
            let uri = format!("/activities/{id}/energyOwners/{user_id}");
            tokio::spawn(async move {
                app.oneshot(empty_request("PUT", &uri))
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let stored = state.db.get_activity(&id).await.unwrap().unwrap();
    assert!(stored.is_blocked);
    assert_eq!(stored.energy_owners.len(), original.len() + user_ids.len());
    assert_eq!(stored.energy_owners[..original.len()], original[..]);

    let appended: HashSet<&String> = stored.energy_owners[original.len()..].iter().collect();
    let expected: HashSet<&String> = user_ids.iter().collect();
    assert_eq!(appended, expected);
}

#[tokio::test]
async fn test_block_rejects_other_profiles() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let created = create_activity(&app, activity_body(1, 1, 1)).await;
    let id = created["_id"].as_str().unwrap();

    for profile in ["trabajador", "supervisor"] {
        let user = create_user(&app, profile).await;
        let user_id = user["_id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(empty_request(
                "PUT",
                &format!("/activities/{id}/energyOwners/{user_id}"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    // Rejections leave the activity untouched
    let response = app
        .oneshot(empty_request("GET", &format!("/activities/{id}")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["isBlocked"], false);
}

#[tokio::test]
async fn test_block_with_unknown_user_is_method_not_allowed() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let created = create_activity(&app, activity_body(1, 1, 1)).await;
    let id = created["_id"].as_str().unwrap();

    let response = app
        .oneshot(empty_request(
            "PUT",
            &format!("/activities/{id}/energyOwners/ghost-{}", unique_suffix()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_block_unknown_activity_is_not_found() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let user = create_user(&app, "duenoDeEnergia").await;
    let user_id = user["_id"].as_str().unwrap();

    let response = app
        .oneshot(empty_request(
            "PUT",
            &format!(
                "/activities/missing-{}/energyOwners/{user_id}",
                unique_suffix()
            ),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
