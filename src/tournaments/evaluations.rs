//! Judge evaluations. One evaluation per (judge, target); resubmission
//! overwrites through a single-statement upsert, so the uniqueness
//! contract lives entirely in the store's conflict resolution. Validation
//! is a scoring-mode-specific step producing a `ScoreCard`, which one
//! shared routine then records.

use axum::{Json, extract::Path};
use axum_extra::extract::WithRejection;
use chrono::{NaiveDateTime, Utc};
use diesel::{
    connection::LoadConnection, insert_into, prelude::*, sqlite::Sqlite,
};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    auth::{Role, User},
    schema::evaluations,
    state::Conn,
    tournaments::{
        matches::Match,
        rounds::{Round, ScoringMode, rubric},
        submissions::Submission,
    },
    util_resp::{ApiError, ApiResult, CreatedResult, JsonResult, created, ok},
};

pub const MAX_POINTS_SCORE: f64 = 5.0;

#[derive(Debug, Clone, Queryable)]
pub struct Evaluation {
    pub id: String,
    pub judge_id: String,
    pub target_type: String,
    pub target_id: String,
    pub round_id: String,
    pub pass: Option<bool>,
    pub score: Option<f64>,
    pub rubric: Option<String>,
    pub total_score: Option<f64>,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationView {
    pub id: String,
    pub judge_id: String,
    pub target_type: String,
    pub target_id: String,
    pub round_id: String,
    pub pass: Option<bool>,
    pub score: Option<f64>,
    pub rubric: Option<Value>,
    pub total_score: Option<f64>,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Evaluation {
    pub fn to_view(&self) -> EvaluationView {
        EvaluationView {
            id: self.id.clone(),
            judge_id: self.judge_id.clone(),
            target_type: self.target_type.clone(),
            target_id: self.target_id.clone(),
            round_id: self.round_id.clone(),
            pass: self.pass,
            score: self.score,
            rubric: self
                .rubric
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            total_score: self.total_score,
            comment: self.comment.clone(),
            created_at: self.created_at,
        }
    }
}

/// The validated outcome of an evaluation, tagged by scoring mode.
/// Exactly one variant's data ends up populated on the stored row.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreCard {
    Pass(bool),
    Points(f64),
    Rubric {
        scores: IndexMap<String, f64>,
        total: f64,
    },
}

/// Validates a submission evaluation against the round's scoring mode.
/// Submissions are never evaluable in rubric rounds; only matches are.
fn submission_score_card(
    mode: ScoringMode,
    pass: Option<bool>,
    score: Option<f64>,
) -> ApiResult<ScoreCard> {
    match mode {
        ScoringMode::PassFail => {
            let pass = pass.ok_or_else(|| {
                ApiError::BadRequest(
                    "pass flag is required for pass/fail rounds".to_string(),
                )
            })?;
            Ok(ScoreCard::Pass(pass))
        }
        ScoringMode::Points => {
            let score = score.ok_or_else(|| {
                ApiError::BadRequest(
                    "score is required for points rounds".to_string(),
                )
            })?;
            if !score.is_finite()
                || !(0.0..=MAX_POINTS_SCORE).contains(&score)
            {
                return Err(ApiError::BadRequest(
                    "score must be between 0 and 5".to_string(),
                ));
            }
            Ok(ScoreCard::Points(score))
        }
        ScoringMode::Rubric => Err(ApiError::BadRequest(
            "Submissions cannot be evaluated in rubric rounds".to_string(),
        )),
    }
}

/// Validates a rubric payload against the round's criteria: every
/// criterion must be covered by a finite in-bounds number, and nothing
/// beyond the criterion set is accepted. Keys that collide after
/// normalization are rejected. The total is the flat sum;
/// criterion weights are stored but not applied.
fn rubric_score_card(
    criteria: &[rubric::RoundRubricCriterion],
    payload: &IndexMap<String, Value>,
) -> ApiResult<ScoreCard> {
    let mut supplied: IndexMap<String, Value> = IndexMap::new();
    for (key, value) in payload {
        let key = rubric::normalize_key(key);
        if supplied.insert(key.clone(), value.clone()).is_some() {
            return Err(ApiError::BadRequest(format!(
                "Duplicate rubric key: {key}"
            )));
        }
    }

    let mut scores = IndexMap::new();
    let mut total = 0.0;
    for criterion in criteria {
        let value =
            supplied.shift_remove(&criterion.key).ok_or_else(|| {
                ApiError::UnprocessableEntity(format!(
                    "Rubric value for {} is required",
                    criterion.key
                ))
            })?;
        let value = coerce_finite_number(&value).ok_or_else(|| {
            ApiError::UnprocessableEntity(format!(
                "Rubric value for {} must be a number",
                criterion.key
            ))
        })?;
        if !(criterion.min_value..=criterion.max_value).contains(&value) {
            return Err(ApiError::UnprocessableEntity(format!(
                "Rubric value for {} must be between {} and {}",
                criterion.key, criterion.min_value, criterion.max_value
            )));
        }
        scores.insert(criterion.key.clone(), value);
        total += value;
    }

    if !supplied.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Unknown rubric keys: {}",
            supplied.keys().join(", ")
        )));
    }

    Ok(ScoreCard::Rubric { scores, total })
}

fn coerce_finite_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()),
        Value::String(raw) => {
            raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Atomic insert-or-overwrite keyed by (judge, target type, target).
/// `created_at` is refreshed on overwrite and doubles as a last-updated
/// timestamp; no history of prior scores is kept.
fn record_evaluation(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
    judge_id: &str,
    target_type: &str,
    target_id: &str,
    round_id: &str,
    card: &ScoreCard,
    comment: Option<&str>,
) -> ApiResult<Evaluation> {
    let (pass, score, rubric_json, total_score) = match card {
        ScoreCard::Pass(pass) => (Some(*pass), None, None, None),
        ScoreCard::Points(score) => (None, Some(*score), None, None),
        ScoreCard::Rubric { scores, total } => (
            None,
            None,
            Some(serde_json::to_string(scores).map_err(|e| {
                tracing::error!("failed to serialize rubric scores: {e}");
                ApiError::Internal
            })?),
            Some(*total),
        ),
    };
    let now = Utc::now().naive_utc();

    insert_into(evaluations::table)
        .values((
            evaluations::id.eq(Uuid::now_v7().to_string()),
            evaluations::judge_id.eq(judge_id),
            evaluations::target_type.eq(target_type),
            evaluations::target_id.eq(target_id),
            evaluations::round_id.eq(round_id),
            evaluations::pass.eq(pass),
            evaluations::score.eq(score),
            evaluations::rubric.eq(&rubric_json),
            evaluations::total_score.eq(total_score),
            evaluations::comment.eq(comment),
            evaluations::created_at.eq(now),
        ))
        .on_conflict((
            evaluations::judge_id,
            evaluations::target_type,
            evaluations::target_id,
        ))
        .do_update()
        .set((
            evaluations::pass.eq(pass),
            evaluations::score.eq(score),
            evaluations::rubric.eq(&rubric_json),
            evaluations::total_score.eq(total_score),
            evaluations::comment.eq(comment),
            evaluations::created_at.eq(now),
        ))
        .execute(conn)?;

    evaluations::table
        .filter(
            evaluations::judge_id
                .eq(judge_id)
                .and(evaluations::target_type.eq(target_type))
                .and(evaluations::target_id.eq(target_id)),
        )
        .first::<Evaluation>(conn)
        .optional()?
        .ok_or(ApiError::Internal)
}

#[derive(Deserialize)]
pub struct SubmissionEvalBody {
    #[serde(default)]
    pub pass: Option<bool>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
}

pub async fn evaluate_submission(
    Path(submission_id): Path<String>,
    user: User,
    mut conn: Conn,
    WithRejection(Json(body), _): WithRejection<Json<SubmissionEvalBody>, ApiError>,
) -> CreatedResult {
    user.require_any_role(&[Role::Judge, Role::Admin, Role::Moderator])?;

    let submission = Submission::fetch(&submission_id, &mut *conn)?;
    let round = Round::fetch(&submission.round_id, &mut *conn)?;

    let card =
        submission_score_card(round.scoring_mode()?, body.pass, body.score)?;
    let evaluation = record_evaluation(
        &mut *conn,
        &user.id,
        "submission",
        &submission.id,
        &round.id,
        &card,
        body.comment.as_deref(),
    )?;
    created(json!({ "evaluation": evaluation.to_view() }))
}

#[derive(Deserialize)]
pub struct MatchEvalBody {
    pub rubric: IndexMap<String, Value>,
    #[serde(default)]
    pub comment: Option<String>,
}

pub async fn evaluate_match(
    Path(match_id): Path<String>,
    user: User,
    mut conn: Conn,
    WithRejection(Json(body), _): WithRejection<Json<MatchEvalBody>, ApiError>,
) -> CreatedResult {
    user.require_any_role(&[Role::Judge, Role::Admin, Role::Moderator])?;

    let m = Match::fetch(&match_id, &mut *conn)?;
    let round = Round::fetch(&m.round_id, &mut *conn)?;
    if round.scoring_mode()? != ScoringMode::Rubric {
        return Err(ApiError::BadRequest(
            "Only rubric rounds can be evaluated for matches".to_string(),
        ));
    }

    let criteria = rubric::list_criteria_by_round(&round.id, &mut *conn)?;
    if criteria.is_empty() {
        return Err(ApiError::BadRequest(
            "Rubric configuration missing for round".to_string(),
        ));
    }

    let card = rubric_score_card(&criteria, &body.rubric)?;
    let evaluation = record_evaluation(
        &mut *conn,
        &user.id,
        "match",
        &m.id,
        &round.id,
        &card,
        body.comment.as_deref(),
    )?;
    created(json!({ "evaluation": evaluation.to_view() }))
}

pub async fn list_for_submission(
    Path(submission_id): Path<String>,
    _user: User,
    mut conn: Conn,
) -> JsonResult {
    let all = list_for_target("submission", &submission_id, &mut *conn)?;
    ok(json!({ "evaluations": all }))
}

pub async fn list_for_match(
    Path(match_id): Path<String>,
    _user: User,
    mut conn: Conn,
) -> JsonResult {
    let all = list_for_target("match", &match_id, &mut *conn)?;
    ok(json!({ "evaluations": all }))
}

fn list_for_target(
    target_type: &str,
    target_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> ApiResult<Vec<EvaluationView>> {
    let all = evaluations::table
        .filter(
            evaluations::target_type
                .eq(target_type)
                .and(evaluations::target_id.eq(target_id)),
        )
        .order_by(evaluations::created_at.asc())
        .load::<Evaluation>(conn)?;
    Ok(all.iter().map(Evaluation::to_view).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(key: &str, min: f64, max: f64) -> rubric::RoundRubricCriterion {
        rubric::RoundRubricCriterion {
            id: format!("crit-{key}"),
            round_id: "round".to_string(),
            key: key.to_string(),
            name: key.to_string(),
            weight: 1.0,
            min_value: min,
            max_value: max,
        }
    }

    fn payload(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn rubric_total_is_flat_sum() {
        let criteria =
            vec![criterion("delivery", 0.0, 100.0), criterion("flow", 0.0, 100.0)];
        let card = rubric_score_card(
            &criteria,
            &payload(&[("flow", json!(90)), ("delivery", json!(80))]),
        )
        .unwrap();
        match card {
            ScoreCard::Rubric { scores, total } => {
                assert_eq!(total, 170.0);
                assert_eq!(scores.get("flow"), Some(&90.0));
                assert_eq!(scores.get("delivery"), Some(&80.0));
            }
            other => panic!("expected rubric card, got {other:?}"),
        }
    }

    #[test]
    fn rubric_bounds_are_inclusive() {
        let criteria = vec![criterion("flow", 0.0, 100.0)];
        assert!(
            rubric_score_card(&criteria, &payload(&[("flow", json!(100))]))
                .is_ok()
        );
        assert!(
            rubric_score_card(&criteria, &payload(&[("flow", json!(0))]))
                .is_ok()
        );
        assert_eq!(
            rubric_score_card(&criteria, &payload(&[("flow", json!(101))]))
                .unwrap_err(),
            ApiError::UnprocessableEntity(
                "Rubric value for flow must be between 0 and 100".to_string()
            )
        );
        assert!(matches!(
            rubric_score_card(&criteria, &payload(&[("flow", json!(-1))]))
                .unwrap_err(),
            ApiError::UnprocessableEntity(_)
        ));
    }

    #[test]
    fn rubric_missing_key_is_unprocessable() {
        let criteria = vec![criterion("flow", 0.0, 100.0)];
        assert_eq!(
            rubric_score_card(&criteria, &payload(&[])).unwrap_err(),
            ApiError::UnprocessableEntity(
                "Rubric value for flow is required".to_string()
            )
        );
    }

    #[test]
    fn rubric_unknown_keys_listed_comma_joined() {
        let criteria = vec![criterion("flow", 0.0, 100.0)];
        let err = rubric_score_card(
            &criteria,
            &payload(&[
                ("flow", json!(50)),
                ("extra", json!(1)),
                ("bogus", json!(2)),
            ]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ApiError::BadRequest(
                "Unknown rubric keys: extra, bogus".to_string()
            )
        );
    }

    #[test]
    fn rubric_payload_keys_are_normalized_before_matching() {
        let criteria = vec![criterion("flow", 0.0, 100.0)];
        let card = rubric_score_card(
            &criteria,
            &payload(&[("  FLOW ", json!("42.5"))]),
        )
        .unwrap();
        match card {
            ScoreCard::Rubric { scores, total } => {
                assert_eq!(scores.get("flow"), Some(&42.5));
                assert_eq!(total, 42.5);
            }
            other => panic!("expected rubric card, got {other:?}"),
        }
    }

    #[test]
    fn rubric_rejects_keys_colliding_after_normalization() {
        let criteria = vec![criterion("flow", 0.0, 100.0)];
        assert_eq!(
            rubric_score_card(
                &criteria,
                &payload(&[("Flow", json!(10)), ("flow", json!(20))]),
            )
            .unwrap_err(),
            ApiError::BadRequest("Duplicate rubric key: flow".to_string())
        );
    }

    #[test]
    fn rubric_rejects_non_numeric_values() {
        let criteria = vec![criterion("flow", 0.0, 100.0)];
        for bad in [json!("dope"), json!(null), json!(true), json!([1])] {
            assert_eq!(
                rubric_score_card(&criteria, &payload(&[("flow", bad)]))
                    .unwrap_err(),
                ApiError::UnprocessableEntity(
                    "Rubric value for flow must be a number".to_string()
                )
            );
        }
    }

    #[test]
    fn points_bounds_are_inclusive() {
        assert!(
            submission_score_card(ScoringMode::Points, None, Some(5.0))
                .is_ok()
        );
        assert!(
            submission_score_card(ScoringMode::Points, None, Some(0.0))
                .is_ok()
        );
        assert!(
            submission_score_card(ScoringMode::Points, None, Some(5.1))
                .is_err()
        );
        assert!(
            submission_score_card(ScoringMode::Points, None, Some(-0.1))
                .is_err()
        );
        assert!(
            submission_score_card(ScoringMode::Points, None, None).is_err()
        );
    }

    #[test]
    fn pass_fail_requires_the_flag() {
        assert_eq!(
            submission_score_card(ScoringMode::PassFail, Some(true), None)
                .unwrap(),
            ScoreCard::Pass(true)
        );
        assert!(
            submission_score_card(ScoringMode::PassFail, None, Some(3.0))
                .is_err()
        );
    }

    #[test]
    fn rubric_mode_rejects_submission_targets() {
        assert!(matches!(
            submission_score_card(ScoringMode::Rubric, Some(true), Some(1.0))
                .unwrap_err(),
            ApiError::BadRequest(_)
        ));
    }
}
