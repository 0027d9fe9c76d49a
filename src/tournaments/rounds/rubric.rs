//! Per-round scoring dimensions. Criteria are created lazily alongside a
//! rubric round and are immutable afterwards; there is deliberately no
//! update operation.

use diesel::{
    connection::LoadConnection, insert_into, prelude::*, sqlite::Sqlite,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{schema::round_rubric_criteria, util_resp::ApiResult};

pub const DEFAULT_WEIGHT: f64 = 1.0;
pub const DEFAULT_MIN_VALUE: f64 = 0.0;
pub const DEFAULT_MAX_VALUE: f64 = 100.0;

#[derive(Debug, Clone, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRubricCriterion {
    pub id: String,
    pub round_id: String,
    pub key: String,
    pub name: String,
    pub weight: f64,
    pub min_value: f64,
    pub max_value: f64,
}

/// Criteria for a round, ordered by key. Possibly empty for non-rubric
/// rounds.
pub fn list_criteria_by_round(
    round_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> ApiResult<Vec<RoundRubricCriterion>> {
    Ok(round_rubric_criteria::table
        .filter(round_rubric_criteria::round_id.eq(round_id))
        .order_by(round_rubric_criteria::key.asc())
        .load::<RoundRubricCriterion>(conn)?)
}

/// Inserts a default-bounded criterion for every key not already present
/// for the round. Idempotent; must run in the round-creation transaction.
pub fn ensure_default_criteria_for_keys(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
    round_id: &str,
    keys: &[String],
) -> ApiResult<()> {
    for key in keys {
        let key = normalize_key(key);
        insert_into(round_rubric_criteria::table)
            .values((
                round_rubric_criteria::id.eq(Uuid::now_v7().to_string()),
                round_rubric_criteria::round_id.eq(round_id),
                round_rubric_criteria::key.eq(&key),
                round_rubric_criteria::name.eq(name_from_key(&key)),
                round_rubric_criteria::weight.eq(DEFAULT_WEIGHT),
                round_rubric_criteria::min_value.eq(DEFAULT_MIN_VALUE),
                round_rubric_criteria::max_value.eq(DEFAULT_MAX_VALUE),
            ))
            .on_conflict((
                round_rubric_criteria::round_id,
                round_rubric_criteria::key,
            ))
            .do_nothing()
            .execute(conn)?;
    }
    Ok(())
}

/// Criterion keys are matched case-insensitively everywhere; this is the
/// single normalization both storage and lookups apply.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Derives a display name by title-casing words split on whitespace,
/// hyphens and underscores.
fn name_from_key(key: &str) -> String {
    normalize_key(key)
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>()
                        + chars.as_str()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_title_cased_per_word() {
        assert_eq!(name_from_key("flow"), "Flow");
        assert_eq!(name_from_key("stage_presence"), "Stage Presence");
        assert_eq!(name_from_key("crowd-control"), "Crowd Control");
        assert_eq!(name_from_key("  punch  lines "), "Punch Lines");
    }

    #[test]
    fn keys_normalize_to_trimmed_lowercase() {
        assert_eq!(normalize_key("  Flow "), "flow");
        assert_eq!(normalize_key("DELIVERY"), "delivery");
    }
}
