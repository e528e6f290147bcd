//! API integration tests against a running server

use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};

use gearloan_server::models::caller::CallerClaims;

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Mint a bearer token the way the identity provider would
fn token_for(user_id: i64) -> String {
    let secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    let now = Utc::now();
    CallerClaims {
        sub: format!("member-{}", user_id),
        user_id,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    }
    .create_token(&secret)
    .expect("Failed to sign token")
}

async fn create_equipment(client: &Client, owner_token: &str) -> i64 {
    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .bearer_auth(owner_token)
        .json(&json!({ "name": "Kayak", "category": "water" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No equipment ID")
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
async fn test_missing_token() {
    let client = Client::new();

    let response = client
        .get(format!("{}/me/loans", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_request_approve_and_complete() {
    let client = Client::new();
    let owner = token_for(5001);
    let borrower = token_for(5002);
    let equipment_id = create_equipment(&client, &owner).await;

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&borrower)
        .json(&json!({
            "equipment_id": equipment_id,
            "start_date": "2099-06-01T00:00:00Z",
            "end_date": "2099-06-03T00:00:00Z"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    let loan_id = body["loan"]["id"].as_i64().expect("No loan ID");

    let response = client
        .post(format!("{}/loans/{}/approve", BASE_URL, loan_id))
        .bearer_auth(&owner)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/loans/{}/complete", BASE_URL, loan_id))
        .bearer_auth(&borrower)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["loan"]["status"], "COMPLETED");
}

#[tokio::test]
#[ignore]
async fn test_overlapping_request_conflicts() {
    let client = Client::new();
    let owner = token_for(5101);
    let equipment_id = create_equipment(&client, &owner).await;

    let request = |borrower: i64, start: &str, end: &str| {
        client
            .post(format!("{}/loans", BASE_URL))
            .bearer_auth(token_for(borrower))
            .json(&json!({
                "equipment_id": equipment_id,
                "start_date": start,
                "end_date": end
            }))
            .send()
    };

    let response = request(5102, "2099-07-01T00:00:00Z", "2099-07-05T00:00:00Z")
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    let loan_id = body["loan"]["id"].as_i64().expect("No loan ID");

    client
        .post(format!("{}/loans/{}/approve", BASE_URL, loan_id))
        .bearer_auth(&owner)
        .send()
        .await
        .expect("Failed to send request");

    let response = request(5103, "2099-07-03T00:00:00Z", "2099-07-09T00:00:00Z")
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    let response = request(5103, "2099-07-05T00:00:00Z", "2099-07-09T00:00:00Z")
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
}

#[tokio::test]
#[ignore]
async fn test_list_my_loans() {
    let client = Client::new();

    let response = client
        .get(format!("{}/me/loans?page_number=1&page_size=10", BASE_URL))
        .bearer_auth(token_for(5002))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert!(body["total_count"].is_number());
}
