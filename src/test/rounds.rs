use serde_json::{Value, json};

use crate::test::{
    create_round, error_message, login, seed_tournament, seed_user, server,
    test_pool,
};

#[tokio::test]
async fn rubric_round_gets_default_criteria() {
    let pool = test_pool();
    let tid = seed_tournament(&pool, "Summer Clash", "active");
    seed_user(&pool, "admin@example.com", "Admin", &["admin"]);

    let server = server(&pool);
    login(&server, "admin@example.com").await;

    let round = create_round(
        &server,
        &tid,
        "bracket",
        1,
        "rubric",
        // Duplicates and casing collapse into one normalized key set.
        Some(vec![" Flow ", "delivery", "FLOW", "stage_presence"]),
    )
    .await;
    assert_eq!(
        round["rubricKeys"],
        json!(["flow", "delivery", "stage_presence"])
    );

    let res = server
        .get(&format!("/api/rounds/{}/criteria", round["id"].as_str().unwrap()))
        .await;
    assert_eq!(res.status_code(), 200);
    let criteria = res.json::<Value>()["criteria"].clone();
    let criteria = criteria.as_array().unwrap();
    assert_eq!(criteria.len(), 3);
    // Listed in key order with default bounds and weight.
    assert_eq!(criteria[0]["key"], "delivery");
    assert_eq!(criteria[1]["key"], "flow");
    assert_eq!(criteria[2]["key"], "stage_presence");
    assert_eq!(criteria[2]["name"], "Stage Presence");
    for criterion in criteria {
        assert_eq!(criterion["minValue"], 0.0);
        assert_eq!(criterion["maxValue"], 100.0);
        assert_eq!(criterion["weight"], 1.0);
    }
}

#[tokio::test]
async fn rubric_round_requires_keys() {
    let pool = test_pool();
    let tid = seed_tournament(&pool, "Summer Clash", "active");
    seed_user(&pool, "admin@example.com", "Admin", &["admin"]);

    let server = server(&pool);
    login(&server, "admin@example.com").await;

    let res = server
        .post(&format!("/api/tournaments/{tid}/rounds"))
        .json(&json!({ "kind": "bracket", "number": 1, "scoring": "rubric" }))
        .await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(
        error_message(&res.json::<Value>()),
        "Rubric rounds require rubricKeys"
    );

    // Whitespace-only keys normalize away to nothing.
    let res = server
        .post(&format!("/api/tournaments/{tid}/rounds"))
        .json(&json!({
            "kind": "bracket",
            "number": 1,
            "scoring": "rubric",
            "rubricKeys": ["  ", ""],
        }))
        .await;
    assert_eq!(res.status_code(), 400);
}

#[tokio::test]
async fn rejects_unknown_kind_and_scoring() {
    let pool = test_pool();
    let tid = seed_tournament(&pool, "Summer Clash", "active");
    seed_user(&pool, "admin@example.com", "Admin", &["admin"]);

    let server = server(&pool);
    login(&server, "admin@example.com").await;

    let res = server
        .post(&format!("/api/tournaments/{tid}/rounds"))
        .json(&json!({ "kind": "freestyle", "number": 1, "scoring": "points" }))
        .await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(
        error_message(&res.json::<Value>()),
        "Unsupported round kind: freestyle"
    );

    let res = server
        .post(&format!("/api/tournaments/{tid}/rounds"))
        .json(&json!({ "kind": "bracket", "number": 1, "scoring": "stars" }))
        .await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(
        error_message(&res.json::<Value>()),
        "Unsupported scoring mode: stars"
    );
}

#[tokio::test]
async fn duplicate_kind_and_number_conflict() {
    let pool = test_pool();
    let tid = seed_tournament(&pool, "Summer Clash", "active");
    seed_user(&pool, "admin@example.com", "Admin", &["admin"]);

    let server = server(&pool);
    login(&server, "admin@example.com").await;

    create_round(&server, &tid, "qualifier1", 1, "pass_fail", None).await;
    // Same number under a different kind is fine.
    create_round(&server, &tid, "bracket", 1, "points", None).await;

    let res = server
        .post(&format!("/api/tournaments/{tid}/rounds"))
        .json(&json!({ "kind": "qualifier1", "number": 1, "scoring": "points" }))
        .await;
    assert_eq!(res.status_code(), 409);
    assert_eq!(
        error_message(&res.json::<Value>()),
        "Round with the same kind and number already exists"
    );
}

#[tokio::test]
async fn listing_follows_tournament_visibility() {
    let pool = test_pool();
    let tid = seed_tournament(&pool, "Hidden Draft", "draft");
    seed_user(&pool, "admin@example.com", "Admin", &["admin"]);
    seed_user(&pool, "fan@example.com", "Fan", &["listener"]);

    let server = server(&pool);
    login(&server, "admin@example.com").await;
    let round = create_round(&server, &tid, "qualifier1", 1, "points", None).await;
    let round_id = round["id"].as_str().unwrap().to_string();

    let res = server.get(&format!("/api/tournaments/{tid}/rounds")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.json::<Value>()["rounds"].as_array().unwrap().len(), 1);

    login(&server, "fan@example.com").await;
    let res = server.get(&format!("/api/tournaments/{tid}/rounds")).await;
    assert_eq!(res.status_code(), 404);
    let res = server.get(&format!("/api/rounds/{round_id}")).await;
    assert_eq!(res.status_code(), 404);
}
