use serde_json::{Value, json};

use crate::test::{
    error_message, login, seed_participant, seed_tournament, seed_user,
    server, test_pool,
};

#[tokio::test]
async fn create_requires_staff() {
    let pool = test_pool();
    let server = server(&pool);
    seed_user(&pool, "artist@example.com", "Artist", &["artist"]);
    login(&server, "artist@example.com").await;

    let res = server
        .post("/api/tournaments")
        .json(&json!({ "title": "Summer Clash", "maxBracketSize": 128 }))
        .await;
    assert_eq!(res.status_code(), 403);
}

#[tokio::test]
async fn create_validates_title_and_bracket_size() {
    let pool = test_pool();
    let server = server(&pool);
    seed_user(&pool, "mod@example.com", "Mod", &["moderator"]);
    login(&server, "mod@example.com").await;

    let res = server
        .post("/api/tournaments")
        .json(&json!({ "title": "ab", "maxBracketSize": 128 }))
        .await;
    assert_eq!(res.status_code(), 400);

    let res = server
        .post("/api/tournaments")
        .json(&json!({ "title": "Summer Clash", "maxBracketSize": 64 }))
        .await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(
        error_message(&res.json::<Value>()),
        "maxBracketSize must be 128 or 256"
    );

    let res = server
        .post("/api/tournaments")
        .json(&json!({ "title": "Summer Clash", "maxBracketSize": 256 }))
        .await;
    assert_eq!(res.status_code(), 201);
    assert_eq!(res.json::<Value>()["tournament"]["status"], "draft");
}

#[tokio::test]
async fn drafts_are_hidden_from_non_staff() {
    let pool = test_pool();
    let draft_id = seed_tournament(&pool, "Quiet Draft", "draft");
    seed_tournament(&pool, "Live One", "active");
    seed_user(&pool, "fan@example.com", "Fan", &["listener"]);
    seed_user(&pool, "admin@example.com", "Admin", &["admin"]);

    let server = server(&pool);
    login(&server, "fan@example.com").await;

    let res = server.get("/api/tournaments").await;
    assert_eq!(res.status_code(), 200);
    let listed = res.json::<Value>()["tournaments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(listed, vec!["Live One"]);

    // The id resolves, but the draft stays a 404 for non-staff.
    let res = server.get(&format!("/api/tournaments/{draft_id}")).await;
    assert_eq!(res.status_code(), 404);

    login(&server, "admin@example.com").await;
    let res = server.get("/api/tournaments").await;
    assert_eq!(
        res.json::<Value>()["tournaments"].as_array().unwrap().len(),
        2
    );
    let res = server.get(&format!("/api/tournaments/{draft_id}")).await;
    assert_eq!(res.status_code(), 200);
}

#[tokio::test]
async fn participant_emails_redacted_for_non_staff() {
    let pool = test_pool();
    let tid = seed_tournament(&pool, "Summer Clash", "active");
    let artist = seed_user(&pool, "artist@example.com", "Artist", &["artist"]);
    seed_participant(&pool, &tid, &artist);
    seed_user(&pool, "fan@example.com", "Fan", &["listener"]);
    seed_user(&pool, "admin@example.com", "Admin", &["admin"]);

    let server = server(&pool);
    login(&server, "fan@example.com").await;
    let res = server
        .get(&format!("/api/tournaments/{tid}/participants"))
        .await;
    assert_eq!(res.status_code(), 200);
    let participants = res.json::<Value>()["participants"].clone();
    assert_eq!(participants[0]["displayName"], "Artist");
    assert!(participants[0].get("email").is_none());

    login(&server, "admin@example.com").await;
    let res = server
        .get(&format!("/api/tournaments/{tid}/participants"))
        .await;
    let participants = res.json::<Value>()["participants"].clone();
    assert_eq!(participants[0]["email"], "artist@example.com");
}

#[tokio::test]
async fn self_registration_and_duplicates() {
    let pool = test_pool();
    let tid = seed_tournament(&pool, "Summer Clash", "active");
    let artist = seed_user(&pool, "artist@example.com", "Artist", &["artist"]);
    let other = seed_user(&pool, "other@example.com", "Other", &["artist"]);

    let server = server(&pool);
    login(&server, "artist@example.com").await;

    let res = server
        .post(&format!("/api/tournaments/{tid}/participants"))
        .json(&json!({ "userId": artist }))
        .await;
    assert_eq!(res.status_code(), 201);

    // Registering someone else requires staff.
    let res = server
        .post(&format!("/api/tournaments/{tid}/participants"))
        .json(&json!({ "userId": other }))
        .await;
    assert_eq!(res.status_code(), 403);

    let res = server
        .post(&format!("/api/tournaments/{tid}/participants"))
        .json(&json!({ "userId": artist }))
        .await;
    assert_eq!(res.status_code(), 409);
    assert_eq!(
        error_message(&res.json::<Value>()),
        "User already registered for tournament"
    );
}

#[tokio::test]
async fn status_updates_are_staff_only_and_validated() {
    let pool = test_pool();
    let tid = seed_tournament(&pool, "Summer Clash", "draft");
    seed_user(&pool, "admin@example.com", "Admin", &["admin"]);

    let server = server(&pool);
    login(&server, "admin@example.com").await;

    let res = server
        .patch(&format!("/api/tournaments/{tid}/status"))
        .json(&json!({ "status": "paused" }))
        .await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(error_message(&res.json::<Value>()), "Unsupported status: paused");

    let res = server
        .patch(&format!("/api/tournaments/{tid}/status"))
        .json(&json!({ "status": "active" }))
        .await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.json::<Value>()["tournament"]["status"], "active");
}
