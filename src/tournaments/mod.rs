use axum::{Json, extract::Path};
use chrono::{NaiveDateTime, Utc};
use diesel::{
    connection::LoadConnection, insert_into, prelude::*, sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::User,
    schema::{tournament_judges, tournament_participants, tournaments, users},
    state::Conn,
    tournaments::visibility::is_staff,
    util_resp::{ApiError, ApiResult, CreatedResult, JsonResult, created, ok},
};

pub mod evaluations;
pub mod matches;
pub mod rounds;
pub mod submissions;
pub mod visibility;

pub const TOURNAMENT_STATUSES: [&str; 3] = ["draft", "active", "finished"];
pub const BRACKET_SIZES: [i64; 2] = [128, 256];

#[derive(Debug, Clone, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: String,
    pub title: String,
    pub max_bracket_size: i64,
    pub status: String,
    pub created_at: NaiveDateTime,
}

impl Tournament {
    pub fn fetch(
        tournament_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Self> {
        tournaments::table
            .filter(tournaments::id.eq(tournament_id))
            .first::<Tournament>(conn)
            .optional()?
            .ok_or(ApiError::NotFound)
    }

    /// Fetches by id, with drafts excluded at the query level unless the
    /// caller may see them.
    pub fn fetch_visible(
        tournament_id: &str,
        include_drafts: bool,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Self> {
        let mut query = tournaments::table
            .filter(tournaments::id.eq(tournament_id))
            .into_boxed();
        if !include_drafts {
            query = query.filter(tournaments::status.ne("draft"));
        }
        query
            .first::<Tournament>(conn)
            .optional()?
            .ok_or(ApiError::NotFound)
    }
}

#[derive(Debug, Queryable)]
pub struct TournamentParticipant {
    pub id: String,
    pub tournament_id: String,
    pub user_id: String,
}

impl TournamentParticipant {
    pub fn fetch(
        participant_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Self> {
        tournament_participants::table
            .filter(tournament_participants::id.eq(participant_id))
            .first::<TournamentParticipant>(conn)
            .optional()?
            .ok_or(ApiError::NotFound)
    }
}

/// Participant/judge rows as shown to callers. `email` is only present
/// for staff; the field vanishes from the payload otherwise.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantView {
    id: String,
    user_id: String,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JudgeView {
    user_id: String,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

pub async fn list(user: Option<User>, mut conn: Conn) -> JsonResult {
    let mut query = tournaments::table
        .order_by(tournaments::created_at.desc())
        .into_boxed();
    if !is_staff(user.as_ref()) {
        query = query.filter(tournaments::status.ne("draft"));
    }
    let all = query.load::<Tournament>(&mut *conn)?;
    ok(json!({ "tournaments": all }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentBody {
    pub title: String,
    pub max_bracket_size: i64,
}

pub async fn create(
    user: User,
    mut conn: Conn,
    Json(body): Json<CreateTournamentBody>,
) -> CreatedResult {
    user.require_staff()?;

    if body.title.trim().chars().count() < 3 {
        return Err(ApiError::BadRequest(
            "title must be at least 3 characters".to_string(),
        ));
    }
    if !BRACKET_SIZES.contains(&body.max_bracket_size) {
        return Err(ApiError::BadRequest(
            "maxBracketSize must be 128 or 256".to_string(),
        ));
    }

    let tournament_id = Uuid::now_v7().to_string();
    insert_into(tournaments::table)
        .values((
            tournaments::id.eq(&tournament_id),
            tournaments::title.eq(body.title.trim()),
            tournaments::max_bracket_size.eq(body.max_bracket_size),
            tournaments::status.eq("draft"),
            tournaments::created_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut *conn)?;

    let tournament = Tournament::fetch(&tournament_id, &mut *conn)?;
    created(json!({ "tournament": tournament }))
}

pub async fn show(
    Path(tournament_id): Path<String>,
    user: Option<User>,
    mut conn: Conn,
) -> JsonResult {
    let staff = is_staff(user.as_ref());
    let tournament = Tournament::fetch(&tournament_id, &mut *conn)?;

    // The id resolved, but drafts stay indistinguishable from absence
    // for non-staff callers.
    if !staff && tournament.status == "draft" {
        return Err(ApiError::NotFound);
    }

    let participants = participant_views(&tournament.id, staff, &mut conn)?;
    let judges = judge_views(&tournament.id, staff, &mut conn)?;

    ok(json!({
        "tournament": tournament,
        "participants": participants,
        "judges": judges,
    }))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: String,
}

pub async fn update_status(
    Path(tournament_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<StatusBody>,
) -> JsonResult {
    user.require_staff()?;

    if !TOURNAMENT_STATUSES.contains(&body.status.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported status: {}",
            body.status
        )));
    }

    let updated = diesel::update(
        tournaments::table.filter(tournaments::id.eq(&tournament_id)),
    )
    .set(tournaments::status.eq(&body.status))
    .execute(&mut *conn)?;
    if updated == 0 {
        return Err(ApiError::NotFound);
    }

    let tournament = Tournament::fetch(&tournament_id, &mut *conn)?;
    ok(json!({ "tournament": tournament }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkUserBody {
    pub user_id: String,
}

pub async fn register_participant(
    Path(tournament_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<LinkUserBody>,
) -> CreatedResult {
    // Participants may register themselves; staff may register anyone.
    if body.user_id != user.id {
        user.require_staff()?;
    }

    visibility::ensure_tournament_visible(
        &tournament_id,
        Some(&user),
        &mut *conn,
    )?;
    User::fetch(&body.user_id, &mut *conn)?;

    let participant_id = Uuid::now_v7().to_string();
    insert_into(tournament_participants::table)
        .values((
            tournament_participants::id.eq(&participant_id),
            tournament_participants::tournament_id.eq(&tournament_id),
            tournament_participants::user_id.eq(&body.user_id),
        ))
        .execute(&mut *conn)
        .map_err(|err| {
            ApiError::from(err)
                .on_conflict("User already registered for tournament")
        })?;

    let participant =
        TournamentParticipant::fetch(&participant_id, &mut *conn)?;
    created(json!({ "participant": {
        "id": participant.id,
        "tournamentId": participant.tournament_id,
        "userId": participant.user_id,
    } }))
}

pub async fn assign_judge(
    Path(tournament_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<LinkUserBody>,
) -> CreatedResult {
    user.require_staff()?;

    Tournament::fetch(&tournament_id, &mut *conn)?;
    User::fetch(&body.user_id, &mut *conn)?;

    insert_into(tournament_judges::table)
        .values((
            tournament_judges::id.eq(Uuid::now_v7().to_string()),
            tournament_judges::tournament_id.eq(&tournament_id),
            tournament_judges::user_id.eq(&body.user_id),
        ))
        .execute(&mut *conn)
        .map_err(|err| {
            ApiError::from(err).on_conflict("Judge already assigned")
        })?;

    created(json!({ "judge": {
        "tournamentId": tournament_id,
        "userId": body.user_id,
    } }))
}

pub async fn list_participants(
    Path(tournament_id): Path<String>,
    user: User,
    mut conn: Conn,
) -> JsonResult {
    visibility::ensure_tournament_visible(
        &tournament_id,
        Some(&user),
        &mut *conn,
    )?;
    let participants =
        participant_views(&tournament_id, user.is_staff(), &mut conn)?;
    ok(json!({ "participants": participants }))
}

pub async fn list_judges(
    Path(tournament_id): Path<String>,
    user: User,
    mut conn: Conn,
) -> JsonResult {
    visibility::ensure_tournament_visible(
        &tournament_id,
        Some(&user),
        &mut *conn,
    )?;
    let judges = judge_views(&tournament_id, user.is_staff(), &mut conn)?;
    ok(json!({ "judges": judges }))
}

fn participant_views(
    tournament_id: &str,
    include_email: bool,
    conn: &mut Conn,
) -> ApiResult<Vec<ParticipantView>> {
    let rows = tournament_participants::table
        .filter(tournament_participants::tournament_id.eq(tournament_id))
        .load::<TournamentParticipant>(&mut **conn)?;

    let user_ids: Vec<String> =
        rows.iter().map(|row| row.user_id.clone()).collect();
    let linked = users::table
        .filter(users::id.eq_any(&user_ids))
        .load::<User>(&mut **conn)?;

    let mut views: Vec<ParticipantView> = rows
        .into_iter()
        .filter_map(|row| {
            let user = linked.iter().find(|user| user.id == row.user_id)?;
            Some(ParticipantView {
                id: row.id,
                user_id: row.user_id,
                display_name: user.display_name.clone(),
                email: include_email.then(|| user.email.clone()),
            })
        })
        .collect();
    views.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    Ok(views)
}

fn judge_views(
    tournament_id: &str,
    include_email: bool,
    conn: &mut Conn,
) -> ApiResult<Vec<JudgeView>> {
    let rows = tournament_judges::table
        .filter(tournament_judges::tournament_id.eq(tournament_id))
        .load::<(String, String, String)>(&mut **conn)?;

    let user_ids: Vec<String> =
        rows.iter().map(|(_, _, user_id)| user_id.clone()).collect();
    let linked = users::table
        .filter(users::id.eq_any(&user_ids))
        .load::<User>(&mut **conn)?;

    let mut views: Vec<JudgeView> = rows
        .into_iter()
        .filter_map(|(_, _, user_id)| {
            let user = linked.iter().find(|user| user.id == user_id)?;
            Some(JudgeView {
                user_id,
                display_name: user.display_name.clone(),
                email: include_email.then(|| user.email.clone()),
            })
        })
        .collect();
    views.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    Ok(views)
}
