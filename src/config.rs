//! Application wiring: every route, the tracing layer and the shared
//! state, assembled into one `Router`.

use axum::{
    Router,
    routing::{get, patch, post},
};
use axum_extra::extract::cookie::Key;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    admin, auth,
    state::{AppState, DbPool},
    tournaments::{self, evaluations, matches, rounds, submissions},
    users,
    util_resp::{JsonResult, ok},
};

async fn health() -> JsonResult {
    ok(json!({ "status": "ok" }))
}

async fn api_index() -> JsonResult {
    ok(json!({ "name": "cypher", "version": env!("CARGO_PKG_VERSION") }))
}

pub fn create_app(pool: DbPool, key: Key) -> Router {
    let state = AppState { pool, key };

    Router::new()
        .route("/health", get(health))
        .route("/api", get(api_index))
        .route("/api/auth/register", post(auth::register::register))
        .route("/api/auth/login", post(auth::login::login))
        .route("/api/users/me", get(users::me))
        .route("/api/users/:user_id", get(users::get_user))
        .route(
            "/api/users/:user_id/roles",
            post(users::add_roles).put(users::replace_roles),
        )
        .route(
            "/api/users/:user_id/artist-profile",
            get(users::get_artist_profile).put(users::put_artist_profile),
        )
        .route("/api/admin/dashboard", get(admin::dashboard))
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/submissions/:submission_id/moderation",
            patch(admin::moderate_submission),
        )
        .route(
            "/api/admin/media-assets",
            post(admin::create_media_asset).get(admin::list_media_assets),
        )
        .route(
            "/api/tournaments",
            get(tournaments::list).post(tournaments::create),
        )
        .route("/api/tournaments/:tournament_id", get(tournaments::show))
        .route(
            "/api/tournaments/:tournament_id/status",
            patch(tournaments::update_status),
        )
        .route(
            "/api/tournaments/:tournament_id/participants",
            post(tournaments::register_participant)
                .get(tournaments::list_participants),
        )
        .route(
            "/api/tournaments/:tournament_id/judges",
            post(tournaments::assign_judge).get(tournaments::list_judges),
        )
        .route(
            "/api/tournaments/:tournament_id/rounds",
            post(rounds::create).get(rounds::list),
        )
        .route("/api/rounds/:round_id", get(rounds::show))
        .route("/api/rounds/:round_id/criteria", get(rounds::list_criteria))
        .route(
            "/api/rounds/:round_id/submissions/draft",
            post(submissions::save_draft_handler),
        )
        .route(
            "/api/rounds/:round_id/submissions/submit",
            post(submissions::submit_handler),
        )
        .route(
            "/api/rounds/:round_id/submissions",
            get(submissions::list_handler),
        )
        .route(
            "/api/rounds/:round_id/matches",
            post(matches::create).get(matches::list),
        )
        .route(
            "/api/matches/:match_id/participants",
            post(matches::add_participant).get(matches::list_participants),
        )
        .route(
            "/api/matches/:match_id/tracks",
            post(matches::add_track).get(matches::list_tracks),
        )
        .route(
            "/api/evaluations/submission/:submission_id",
            post(evaluations::evaluate_submission)
                .get(evaluations::list_for_submission),
        )
        .route(
            "/api/evaluations/match/:match_id",
            post(evaluations::evaluate_match).get(evaluations::list_for_match),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
