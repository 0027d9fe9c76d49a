//! The per-round submission lifecycle: draft → submitted → locked or
//! disqualified. One submission per (round, participant); the
//! check-then-write in `save_draft`/`submit_entry` runs inside an
//! immediate transaction, which takes SQLite's write lock at BEGIN so
//! concurrent submits for the same pair serialize.

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
    schema::submissions,
    state::Conn,
    tournaments::{
        TournamentParticipant, visibility::ensure_round_visible,
    },
    util_resp::{ApiError, ApiResult, JsonResult, ok},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Locked,
    Disqualified,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Locked => "locked",
            SubmissionStatus::Disqualified => "disqualified",
        }
    }

    pub fn parse(raw: &str) -> Option<SubmissionStatus> {
        match raw {
            "draft" => Some(SubmissionStatus::Draft),
            "submitted" => Some(SubmissionStatus::Submitted),
            "locked" => Some(SubmissionStatus::Locked),
            "disqualified" => Some(SubmissionStatus::Disqualified),
            _ => None,
        }
    }

    /// Statuses visible through the public listing path.
    pub fn is_public(raw: &str) -> bool {
        matches!(raw, "submitted" | "locked")
    }
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub round_id: String,
    pub participant_id: String,
    pub audio_id: Option<String>,
    pub lyrics: Option<String>,
    pub status: String,
    pub submitted_at: Option<NaiveDateTime>,
    pub locked_by_admin: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Submission {
    pub fn fetch(
        submission_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Self> {
        submissions::table
            .filter(submissions::id.eq(submission_id))
            .first::<Submission>(conn)
            .optional()?
            .ok_or(ApiError::NotFound)
    }

    fn of_pair(
        round_id: &str,
        participant_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> ApiResult<Option<Self>> {
        Ok(submissions::table
            .filter(
                submissions::round_id
                    .eq(round_id)
                    .and(submissions::participant_id.eq(participant_id)),
            )
            .first::<Submission>(conn)
            .optional()?)
    }

    pub fn is_editable(&self) -> bool {
        !self.locked_by_admin && self.status == "draft"
    }
}

pub fn save_draft(
    conn: &mut Conn,
    round_id: &str,
    participant_id: &str,
    audio_id: Option<&str>,
    lyrics: Option<&str>,
) -> ApiResult<Submission> {
    conn.immediate_transaction::<_, ApiError, _>(|conn| {
        match Submission::of_pair(round_id, participant_id, conn)? {
            Some(current) => {
                if !current.is_editable() {
                    return Err(ApiError::Conflict(
                        "Submission is locked and cannot be edited"
                            .to_string(),
                    ));
                }
                diesel::update(
                    submissions::table
                        .filter(submissions::id.eq(&current.id)),
                )
                .set((
                    submissions::audio_id.eq(audio_id),
                    submissions::lyrics.eq(lyrics),
                    submissions::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
                Submission::fetch(&current.id, conn)
            }
            None => insert_submission(
                conn,
                round_id,
                participant_id,
                audio_id,
                lyrics,
                SubmissionStatus::Draft,
            ),
        }
    })
}

pub fn submit_entry(
    conn: &mut Conn,
    round_id: &str,
    participant_id: &str,
    audio_id: Option<&str>,
    lyrics: Option<&str>,
) -> ApiResult<Submission> {
    conn.immediate_transaction::<_, ApiError, _>(|conn| {
        match Submission::of_pair(round_id, participant_id, conn)? {
            Some(current) => {
                if current.locked_by_admin {
                    return Err(ApiError::Conflict(
                        "Submission is locked by admin".to_string(),
                    ));
                }
                if current.status != "draft" {
                    return Err(ApiError::Conflict(
                        "Submission already submitted".to_string(),
                    ));
                }
                let now = Utc::now().naive_utc();
                diesel::update(
                    submissions::table
                        .filter(submissions::id.eq(&current.id)),
                )
                .set((
                    submissions::audio_id.eq(audio_id),
                    submissions::lyrics.eq(lyrics),
                    submissions::status
                        .eq(SubmissionStatus::Submitted.as_str()),
                    submissions::submitted_at.eq(now),
                    submissions::updated_at.eq(now),
                ))
                .execute(conn)?;
                Submission::fetch(&current.id, conn)
            }
            None => insert_submission(
                conn,
                round_id,
                participant_id,
                audio_id,
                lyrics,
                SubmissionStatus::Submitted,
            ),
        }
    })
}

fn insert_submission(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
    round_id: &str,
    participant_id: &str,
    audio_id: Option<&str>,
    lyrics: Option<&str>,
    status: SubmissionStatus,
) -> ApiResult<Submission> {
    let submission_id = Uuid::now_v7().to_string();
    let now = Utc::now().naive_utc();
    let submitted_at = match status {
        SubmissionStatus::Submitted => Some(now),
        _ => None,
    };
    insert_into(submissions::table)
        .values((
            submissions::id.eq(&submission_id),
            submissions::round_id.eq(round_id),
            submissions::participant_id.eq(participant_id),
            submissions::audio_id.eq(audio_id),
            submissions::lyrics.eq(lyrics),
            submissions::status.eq(status.as_str()),
            submissions::submitted_at.eq(submitted_at),
            submissions::locked_by_admin.eq(false),
            submissions::created_at.eq(now),
            submissions::updated_at.eq(now),
        ))
        .execute(conn)?;
    Submission::fetch(&submission_id, conn)
}

/// Administrative override; bypasses ownership and current-state checks.
/// The one combination rejected outright is a locked draft.
pub fn set_submission_lock(
    conn: &mut Conn,
    submission_id: &str,
    locked: bool,
    status: Option<&str>,
) -> ApiResult<Submission> {
    let status = match status {
        Some(raw) => Some(SubmissionStatus::parse(raw).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Unsupported submission status: {raw}"
            ))
        })?),
        None => None,
    };
    if locked && status == Some(SubmissionStatus::Draft) {
        return Err(ApiError::BadRequest(
            "Locked submissions cannot be in draft status".to_string(),
        ));
    }

    let updated = match status {
        Some(status) => diesel::update(
            submissions::table.filter(submissions::id.eq(submission_id)),
        )
        .set((
            submissions::locked_by_admin.eq(locked),
            submissions::status.eq(status.as_str()),
            submissions::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut **conn)?,
        None => diesel::update(
            submissions::table.filter(submissions::id.eq(submission_id)),
        )
        .set((
            submissions::locked_by_admin.eq(locked),
            submissions::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut **conn)?,
    };
    if updated == 0 {
        return Err(ApiError::NotFound);
    }
    Submission::fetch(submission_id, &mut **conn)
}

/// All submissions for a round, unfiltered. Audience filtering is the
/// visibility gate's job in the handlers.
pub fn list_submissions_by_round(
    round_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> ApiResult<Vec<Submission>> {
    Ok(submissions::table
        .filter(submissions::round_id.eq(round_id))
        .order_by(submissions::created_at.asc())
        .load::<Submission>(conn)?)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionBody {
    pub participant_id: String,
    pub audio_id: Option<String>,
    pub lyrics: Option<String>,
}

pub async fn save_draft_handler(
    Path(round_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<SubmissionBody>,
) -> JsonResult {
    ensure_round_visible(&round_id, Some(&user), &mut *conn)?;
    assert_can_edit_submission(&user, &body.participant_id, &mut conn)?;
    let submission = save_draft(
        &mut conn,
        &round_id,
        &body.participant_id,
        body.audio_id.as_deref(),
        body.lyrics.as_deref(),
    )?;
    ok(json!({ "submission": submission }))
}

pub async fn submit_handler(
    Path(round_id): Path<String>,
    user: User,
    mut conn: Conn,
    Json(body): Json<SubmissionBody>,
) -> JsonResult {
    ensure_round_visible(&round_id, Some(&user), &mut *conn)?;
    assert_can_edit_submission(&user, &body.participant_id, &mut conn)?;
    let submission = submit_entry(
        &mut conn,
        &round_id,
        &body.participant_id,
        body.audio_id.as_deref(),
        body.lyrics.as_deref(),
    )?;
    ok(json!({ "submission": submission }))
}

pub async fn list_handler(
    Path(round_id): Path<String>,
    user: User,
    mut conn: Conn,
) -> JsonResult {
    let round = ensure_round_visible(&round_id, Some(&user), &mut *conn)?;
    let mut all = list_submissions_by_round(&round.id, &mut *conn)?;
    if !user.is_staff() {
        all.retain(|submission| {
            SubmissionStatus::is_public(&submission.status)
        });
    }
    ok(json!({ "submissions": all }))
}

/// Staff may edit any submission; everyone else only their own
/// participant entry.
fn assert_can_edit_submission(
    user: &User,
    participant_id: &str,
    conn: &mut Conn,
) -> ApiResult<()> {
    if user.is_staff() {
        return Ok(());
    }
    let participant = TournamentParticipant::fetch(participant_id, &mut **conn)?;
    if participant.user_id != user.id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}
