use axum::{Json, extract::Path};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::{
    connection::LoadConnection, insert_into, prelude::*, sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{Role, User},
    schema::{match_participants, match_tracks, matches, users},
    state::Conn,
    tournaments::{
        TournamentParticipant, visibility::ensure_round_visible,
    },
    util_resp::{ApiError, ApiResult, CreatedResult, JsonResult, created, ok},
};

#[derive(Debug, Clone, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub round_id: String,
    pub starts_at: Option<NaiveDateTime>,
}

impl Match {
    pub fn fetch(
        match_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Self> {
        matches::table
            .filter(matches::id.eq(match_id))
            .first::<Match>(conn)
            .optional()?
            .ok_or(ApiError::NotFound)
    }
}

#[derive(Debug, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchParticipantRow {
    #[serde(skip)]
    pub id: String,
    pub match_id: String,
    pub participant_id: String,
    pub seed: Option<i64>,
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTrack {
    pub id: String,
    pub match_id: String,
    pub participant_id: String,
    pub audio_id: Option<String>,
    pub lyrics: Option<String>,
    pub submitted_at: Option<NaiveDateTime>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchBody {
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
}

pub async fn create(
    Path(round_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<CreateMatchBody>,
) -> CreatedResult {
    user.require_staff()?;
    ensure_round_visible(&round_id, Some(&user), &mut *conn)?;

    let match_id = Uuid::now_v7().to_string();
    insert_into(matches::table)
        .values((
            matches::id.eq(&match_id),
            matches::round_id.eq(&round_id),
            matches::starts_at
                .eq(body.starts_at.map(|starts| starts.naive_utc())),
        ))
        .execute(&mut *conn)?;

    let m = Match::fetch(&match_id, &mut *conn)?;
    created(json!({ "match": m }))
}

pub async fn list(
    Path(round_id): Path<String>,
    user: User,
    mut conn: Conn,
) -> JsonResult {
    ensure_round_visible(&round_id, Some(&user), &mut *conn)?;
    let all = matches::table
        .filter(matches::round_id.eq(&round_id))
        .order_by(matches::starts_at.asc())
        .load::<Match>(&mut *conn)?;
    ok(json!({ "matches": all }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchParticipantBody {
    pub participant_id: String,
    #[serde(default)]
    pub seed: Option<i64>,
}

pub async fn add_participant(
    Path(match_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<MatchParticipantBody>,
) -> CreatedResult {
    user.require_staff()?;

    Match::fetch(&match_id, &mut *conn)?;
    TournamentParticipant::fetch(&body.participant_id, &mut *conn)?;

    if body.seed.is_some_and(|seed| seed < 1) {
        return Err(ApiError::BadRequest(
            "seed must be a positive integer".to_string(),
        ));
    }

    insert_into(match_participants::table)
        .values((
            match_participants::id.eq(Uuid::now_v7().to_string()),
            match_participants::match_id.eq(&match_id),
            match_participants::participant_id.eq(&body.participant_id),
            match_participants::seed.eq(body.seed),
        ))
        .execute(&mut *conn)
        .map_err(|err| {
            ApiError::from(err).on_conflict(
                "Participant already assigned to match or duplicate seed",
            )
        })?;

    created(json!({ "participant": {
        "matchId": match_id,
        "participantId": body.participant_id,
        "seed": body.seed,
    } }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchParticipantView {
    match_id: String,
    participant_id: String,
    seed: Option<i64>,
    display_name: String,
}

pub async fn list_participants(
    Path(match_id): Path<String>,
    _user: User,
    mut conn: Conn,
) -> JsonResult {
    Match::fetch(&match_id, &mut *conn)?;

    let rows = match_participants::table
        .filter(match_participants::match_id.eq(&match_id))
        .load::<MatchParticipantRow>(&mut *conn)?;

    let participant_ids: Vec<String> = rows
        .iter()
        .map(|row| row.participant_id.clone())
        .collect();
    let participants = crate::schema::tournament_participants::table
        .filter(
            crate::schema::tournament_participants::id
                .eq_any(&participant_ids),
        )
        .load::<TournamentParticipant>(&mut *conn)?;
    let user_ids: Vec<String> = participants
        .iter()
        .map(|participant| participant.user_id.clone())
        .collect();
    let linked = users::table
        .filter(users::id.eq_any(&user_ids))
        .load::<User>(&mut *conn)?;

    let mut views: Vec<MatchParticipantView> = rows
        .into_iter()
        .filter_map(|row| {
            let participant = participants
                .iter()
                .find(|participant| participant.id == row.participant_id)?;
            let user = linked
                .iter()
                .find(|user| user.id == participant.user_id)?;
            Some(MatchParticipantView {
                match_id: row.match_id,
                participant_id: row.participant_id,
                seed: row.seed,
                display_name: user.display_name.clone(),
            })
        })
        .collect();
    // Seeded entries first in seed order, then the rest by name.
    views.sort_by(|a, b| match (a.seed, b.seed) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.display_name.cmp(&b.display_name),
    });
    ok(json!({ "participants": views }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTrackBody {
    pub participant_id: String,
    pub audio_id: Option<String>,
    pub lyrics: Option<String>,
}

/// Match tracks sit outside the submission state machine; recording one
/// is a plain insert stamped with the submission time.
pub async fn add_track(
    Path(match_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<MatchTrackBody>,
) -> CreatedResult {
    user.require_any_role(&[Role::Artist, Role::Admin, Role::Moderator])?;

    Match::fetch(&match_id, &mut *conn)?;
    TournamentParticipant::fetch(&body.participant_id, &mut *conn)?;

    let track_id = Uuid::now_v7().to_string();
    insert_into(match_tracks::table)
        .values((
            match_tracks::id.eq(&track_id),
            match_tracks::match_id.eq(&match_id),
            match_tracks::participant_id.eq(&body.participant_id),
            match_tracks::audio_id.eq(&body.audio_id),
            match_tracks::lyrics.eq(&body.lyrics),
            match_tracks::submitted_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut *conn)?;

    let track = match_tracks::table
        .filter(match_tracks::id.eq(&track_id))
        .first::<MatchTrack>(&mut *conn)?;
    created(json!({ "track": track }))
}

pub async fn list_tracks(
    Path(match_id): Path<String>,
    _user: User,
    mut conn: Conn,
) -> JsonResult {
    Match::fetch(&match_id, &mut *conn)?;
    let tracks = match_tracks::table
        .filter(match_tracks::match_id.eq(&match_id))
        .load::<MatchTrack>(&mut *conn)?;
    ok(json!({ "tracks": tracks }))
}
