//! The staff/public visibility gate. All tournament, round and submission
//! reads that reach a non-staff caller pass through here first; visibility
//! failures surface as `NotFound` so drafts are indistinguishable from
//! absence.

use diesel::{connection::LoadConnection, sqlite::Sqlite};

use crate::{
    auth::User,
    tournaments::{Tournament, rounds::Round},
    util_resp::ApiResult,
};

/// An anonymous caller is never staff.
pub fn is_staff(user: Option<&User>) -> bool {
    user.is_some_and(User::is_staff)
}

pub fn ensure_tournament_visible(
    tournament_id: &str,
    user: Option<&User>,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> ApiResult<Tournament> {
    Tournament::fetch_visible(tournament_id, is_staff(user), conn)
}

/// A round is visible iff its parent tournament is.
pub fn ensure_round_visible(
    round_id: &str,
    user: Option<&User>,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> ApiResult<Round> {
    let round = Round::fetch(round_id, conn)?;
    ensure_tournament_visible(&round.tournament_id, user, conn)?;
    Ok(round)
}
