use axum::{Json, extract::Path};
use chrono::{NaiveDateTime, Utc};
use diesel::{
    connection::LoadConnection, insert_into, prelude::*, sqlite::Sqlite,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::User,
    schema::rounds,
    state::Conn,
    tournaments::{
        Tournament,
        rounds::rubric::ensure_default_criteria_for_keys,
        visibility::{ensure_round_visible, ensure_tournament_visible},
    },
    util_resp::{ApiError, ApiResult, CreatedResult, JsonResult, created, ok},
};

pub mod rubric;

pub const ROUND_KINDS: [&str; 3] = ["qualifier1", "qualifier2", "bracket"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    PassFail,
    Points,
    Rubric,
}

impl ScoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMode::PassFail => "pass_fail",
            ScoringMode::Points => "points",
            ScoringMode::Rubric => "rubric",
        }
    }

    pub fn parse(raw: &str) -> Option<ScoringMode> {
        match raw {
            "pass_fail" => Some(ScoringMode::PassFail),
            "points" => Some(ScoringMode::Points),
            "rubric" => Some(ScoringMode::Rubric),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct Round {
    pub id: String,
    pub tournament_id: String,
    pub kind: String,
    pub number: i64,
    pub scoring: String,
    pub rubric_keys: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub id: String,
    pub tournament_id: String,
    pub kind: String,
    pub number: i64,
    pub scoring: String,
    pub rubric_keys: Option<Vec<String>>,
    pub created_at: NaiveDateTime,
}

impl Round {
    pub fn fetch(
        round_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Self> {
        rounds::table
            .filter(rounds::id.eq(round_id))
            .first::<Round>(conn)
            .optional()?
            .ok_or(ApiError::NotFound)
    }

    /// The round's scoring mode. The column is CHECK-constrained, so an
    /// unparseable value means the store is corrupt.
    pub fn scoring_mode(&self) -> ApiResult<ScoringMode> {
        ScoringMode::parse(&self.scoring).ok_or_else(|| {
            tracing::error!(round = %self.id, scoring = %self.scoring,
                "unknown scoring mode in store");
            ApiError::Internal
        })
    }

    pub fn to_view(&self) -> RoundView {
        RoundView {
            id: self.id.clone(),
            tournament_id: self.tournament_id.clone(),
            kind: self.kind.clone(),
            number: self.number,
            scoring: self.scoring.clone(),
            rubric_keys: self
                .rubric_keys
                .as_deref()
                .and_then(|keys| serde_json::from_str(keys).ok()),
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoundBody {
    pub kind: String,
    pub number: i64,
    pub scoring: String,
    #[serde(default)]
    pub rubric_keys: Option<Vec<String>>,
}

pub async fn create(
    Path(tournament_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<CreateRoundBody>,
) -> CreatedResult {
    user.require_staff()?;

    Tournament::fetch(&tournament_id, &mut *conn)?;

    if !ROUND_KINDS.contains(&body.kind.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported round kind: {}",
            body.kind
        )));
    }
    let scoring = ScoringMode::parse(&body.scoring).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Unsupported scoring mode: {}",
            body.scoring
        ))
    })?;
    if body.number < 1 {
        return Err(ApiError::BadRequest(
            "number must be a positive integer".to_string(),
        ));
    }

    // Keys are lowercased and de-duplicated before they ever reach the
    // store; criteria rows are created in the same transaction so a
    // rubric round can't exist without criteria.
    let normalized_keys: Option<Vec<String>> = match scoring {
        ScoringMode::Rubric => {
            let keys: Vec<String> = body
                .rubric_keys
                .unwrap_or_default()
                .iter()
                .map(|key| key.trim().to_lowercase())
                .filter(|key| !key.is_empty())
                .unique()
                .collect();
            if keys.is_empty() {
                return Err(ApiError::BadRequest(
                    "Rubric rounds require rubricKeys".to_string(),
                ));
            }
            Some(keys)
        }
        _ => None,
    };

    let round_id = Uuid::now_v7().to_string();
    conn.transaction::<_, ApiError, _>(|conn| {
        insert_into(rounds::table)
            .values((
                rounds::id.eq(&round_id),
                rounds::tournament_id.eq(&tournament_id),
                rounds::kind.eq(&body.kind),
                rounds::number.eq(body.number),
                rounds::scoring.eq(scoring.as_str()),
                rounds::rubric_keys.eq(normalized_keys
                    .as_ref()
                    .map(|keys| serde_json::to_string(keys))
                    .transpose()
                    .map_err(|err| {
                        tracing::error!(error = %err, "key serialization failed");
                        ApiError::Internal
                    })?),
                rounds::created_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)
            .map_err(|err| {
                ApiError::from(err).on_conflict(
                    "Round with the same kind and number already exists",
                )
            })?;

        if let Some(keys) = &normalized_keys {
            ensure_default_criteria_for_keys(conn, &round_id, keys)?;
        }
        Ok(())
    })?;

    let round = Round::fetch(&round_id, &mut *conn)?;
    created(json!({ "round": round.to_view() }))
}

pub async fn list(
    Path(tournament_id): Path<String>,
    user: Option<User>,
    mut conn: Conn,
) -> JsonResult {
    ensure_tournament_visible(&tournament_id, user.as_ref(), &mut *conn)?;

    let all = rounds::table
        .filter(rounds::tournament_id.eq(&tournament_id))
        .order_by(rounds::number.asc())
        .load::<Round>(&mut *conn)?;
    let views: Vec<RoundView> =
        all.iter().map(Round::to_view).collect();
    ok(json!({ "rounds": views }))
}

pub async fn show(
    Path(round_id): Path<String>,
    user: Option<User>,
    mut conn: Conn,
) -> JsonResult {
    let round = ensure_round_visible(&round_id, user.as_ref(), &mut *conn)?;
    ok(json!({ "round": round.to_view() }))
}

pub async fn list_criteria(
    Path(round_id): Path<String>,
    user: Option<User>,
    mut conn: Conn,
) -> JsonResult {
    ensure_round_visible(&round_id, user.as_ref(), &mut *conn)?;
    let criteria = rubric::list_criteria_by_round(&round_id, &mut *conn)?;
    ok(json!({ "criteria": criteria }))
}
