//! API integration tests
//!
//! Run against a live server with a migrated database and the default
//! bootstrap admin: `cargo test -- --ignored`

use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::task::JoinSet;

const BASE_URL: &str = "http://localhost:8000/api/v1";
const ADMIN_EMAIL: &str = "admin@lab.com";
const ADMIN_PASSWORD: &str = "Admin@123456";

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn login(client: &Client, email: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["access_token"].as_str().expect("No token in response").to_string()
}

async fn admin_token(client: &Client) -> String {
    login(client, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

/// Register a fresh account and return (user id, token)
async fn register(client: &Client, role: &str) -> (i64, String) {
    let email = format!("{}@lab.test", unique(role));
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "email": email,
            "full_name": "Test User",
            "password": "password123",
            "role": role,
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let id = body["id"].as_i64().expect("No id");
    (id, login(client, &email, "password123").await)
}

async fn create_equipment(client: &Client, token: &str, quantity: i32) -> i64 {
    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "name": unique("Centrifuge"),
            "category": "Separation",
            "quantity": quantity,
        }))
        .send()
        .await
        .expect("Failed to create equipment");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["available_quantity"], quantity);
    body["id"].as_i64().expect("No id")
}

async fn book(client: &Client, token: &str, equipment_id: i64, quantity: i32, from_h: i64, to_h: i64) -> reqwest::Response {
    let base = Utc::now() + Duration::days(30);
    client
        .post(format!("{}/bookings", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "equipment_id": equipment_id,
            "quantity": quantity,
            "start_time": base + Duration::hours(from_h),
            "end_time": base + Duration::hours(to_h),
        }))
        .send()
        .await
        .expect("Failed to send booking request")
}

async fn set_status(client: &Client, token: &str, booking_id: i64, status: &str) -> reqwest::Response {
    client
        .put(format!("{}/bookings/{}", BASE_URL, booking_id))
        .bearer_auth(token)
        .json(&json!({ "status": status }))
        .send()
        .await
        .expect("Failed to send update request")
}

async fn available_quantity(client: &Client, token: &str, equipment_id: i64) -> i64 {
    let body: Value = client
        .get(format!("{}/equipment/{}", BASE_URL, equipment_id))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["available_quantity"].as_i64().unwrap()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": ADMIN_EMAIL, "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/bookings", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_register_cannot_claim_admin() {
    let client = Client::new();
    let (_, token) = register(&client, "admin").await;

    let me: Value = client
        .get(format!("{}/users/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // the bootstrap admin already exists
    assert_eq!(me["role"], "student");
}

#[tokio::test]
#[ignore]
async fn test_partial_overlap_conflicts_and_adjacent_fits() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, student) = register(&client, "student").await;
    let equipment_id = create_equipment(&client, &admin, 5).await;

    // 3 units held 10:00-12:00
    let first = book(&client, &student, equipment_id, 3, 10, 12).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    // 3 more overlapping 11:00-13:00 would need 6 of 5
    let second = book(&client, &student, equipment_id, 3, 11, 13).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().starts_with("Booking conflict"));

    // 2 fit alongside
    let third = book(&client, &student, equipment_id, 2, 11, 13).await;
    assert_eq!(third.status(), StatusCode::CREATED);

    // touching endpoints do not overlap
    let adjacent = book(&client, &student, equipment_id, 5, 12, 14).await;
    assert_eq!(adjacent.status(), StatusCode::CONFLICT);
    let after = book(&client, &student, equipment_id, 3, 12, 14).await;
    assert_eq!(after.status(), StatusCode::CREATED);
}

#[tokio::test]
#[ignore]
async fn test_approve_then_cancel_restores_counter() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, student) = register(&client, "student").await;
    let equipment_id = create_equipment(&client, &admin, 4).await;

    let response = book(&client, &student, equipment_id, 3, 9, 10).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let booking: Value = response.json().await.unwrap();
    let booking_id = booking["id"].as_i64().unwrap();
    assert_eq!(booking["status"], "pending");

    // students cannot approve
    let denied = set_status(&client, &student, booking_id, "approved").await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let approved = set_status(&client, &admin, booking_id, "approved").await;
    assert_eq!(approved.status(), StatusCode::OK);
    assert_eq!(available_quantity(&client, &admin, equipment_id).await, 1);

    // pending cannot come back
    let back = set_status(&client, &admin, booking_id, "pending").await;
    assert_eq!(back.status(), StatusCode::BAD_REQUEST);

    let cancelled = set_status(&client, &student, booking_id, "cancelled").await;
    assert_eq!(cancelled.status(), StatusCode::OK);
    assert_eq!(available_quantity(&client, &admin, equipment_id).await, 4);

    // terminal
    let again = set_status(&client, &admin, booking_id, "approved").await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_students_only_see_own_bookings() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, alice) = register(&client, "student").await;
    let (_, bob) = register(&client, "student").await;
    let equipment_id = create_equipment(&client, &admin, 2).await;

    let booking: Value = book(&client, &alice, equipment_id, 1, 1, 2).await.json().await.unwrap();
    let booking_id = booking["id"].as_i64().unwrap();

    let response = client
        .get(format!("{}/bookings/{}", BASE_URL, booking_id))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let listed: Vec<Value> = client
        .get(format!("{}/bookings", BASE_URL))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.iter().all(|b| b["id"].as_i64() != Some(booking_id)));

    let cancel = set_status(&client, &bob, booking_id, "cancelled").await;
    assert_eq!(cancel.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_requests_never_oversubscribe() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let equipment_id = create_equipment(&client, &admin, 3).await;

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let client = client.clone();
        let (_, token) = register(&client, "researcher").await;
        tasks.spawn(async move { book(&client, &token, equipment_id, 1, 40, 42).await.status() });
    }

    let mut created = 0;
    let mut conflicts = 0;
    while let Some(status) = tasks.join_next().await {
        match status.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(created, 3);
    assert_eq!(conflicts, 7);

    let availability: Value = client
        .get(format!("{}/equipment/{}/availability", BASE_URL, equipment_id))
        .query(&[
            ("start_time", (Utc::now() + Duration::days(30) + Duration::hours(40)).to_rfc3339()),
            ("end_time", (Utc::now() + Duration::days(30) + Duration::hours(41)).to_rfc3339()),
        ])
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(availability["reserved_quantity"], 3);
    assert_eq!(availability["free_quantity"], 0);
}

#[tokio::test]
#[ignore]
async fn test_equipment_with_bookings_cannot_be_deleted() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, student) = register(&client, "student").await;
    let equipment_id = create_equipment(&client, &admin, 1).await;
    assert_eq!(book(&client, &student, equipment_id, 1, 5, 6).await.status(), StatusCode::CREATED);

    let response = client
        .delete(format!("{}/equipment/{}", BASE_URL, equipment_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_editing_pending_quantity_takes_the_freed_room() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, student) = register(&client, "student").await;
    let equipment_id = create_equipment(&client, &admin, 3).await;

    let booking: Value = book(&client, &student, equipment_id, 1, 20, 22).await.json().await.unwrap();
    let booking_id = booking["id"].as_i64().unwrap();

    // the booking's own unit is not counted against itself
    let grown = client
        .put(format!("{}/bookings/{}", BASE_URL, booking_id))
        .bearer_auth(&student)
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(grown.status(), StatusCode::OK);
    let body: Value = grown.json().await.unwrap();
    assert_eq!(body["quantity"], 3);

    let extra = book(&client, &student, equipment_id, 1, 20, 22).await;
    assert_eq!(extra.status(), StatusCode::CONFLICT);
    let body: Value = extra.json().await.unwrap();
    assert_eq!(body["error"], "InsufficientAvailability");
}

#[tokio::test]
#[ignore]
async fn test_stock_cannot_shrink_below_reservations() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, student) = register(&client, "student").await;
    let equipment_id = create_equipment(&client, &admin, 5).await;
    for _ in 0..4 {
        assert_eq!(book(&client, &student, equipment_id, 1, 50, 52).await.status(), StatusCode::CREATED);
    }

    let resize = |quantity: i32| {
        client
            .put(format!("{}/equipment/{}", BASE_URL, equipment_id))
            .bearer_auth(&admin)
            .json(&json!({ "quantity": quantity }))
            .send()
    };

    let refused = resize(2).await.unwrap();
    assert_eq!(refused.status(), StatusCode::CONFLICT);
    let body: Value = refused.json().await.unwrap();
    assert_eq!(body["error"], "InsufficientAvailability");

    let fits = resize(4).await.unwrap();
    assert_eq!(fits.status(), StatusCode::OK);
    let body: Value = fits.json().await.unwrap();
    assert_eq!(body["quantity"], 4);
    assert_eq!(body["available_quantity"], 4);
}
