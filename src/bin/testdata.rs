//! Seeds a development database with a small but fully wired data set:
//! staff, judges, artists, a tournament with one round of each scoring
//! mode, participants, submissions and a bracket match.

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use clap::Parser;
use cypher::{MIGRATIONS, schema, state::build_pool};
use diesel::{insert_into, prelude::*};
use diesel_migrations::MigrationHarness;
use rand::seq::IndexedRandom;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(about = "Seed a development database")]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = "cypher.sqlite")]
    database_url: String,
    /// How many artist accounts to create.
    #[arg(long, default_value_t = 8)]
    artists: usize,
}

const ADJECTIVES: [&str; 8] = [
    "Smooth", "Grim", "Neon", "Silent", "Rapid", "Golden", "Crooked", "Wild",
];
const NOUNS: [&str; 8] = [
    "Cipher", "Vandal", "Prophet", "Servo", "Mantis", "Orbit", "Static", "Howl",
];

fn hash_password(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("failed to hash password")
        .to_string()
}

fn insert_user(
    conn: &mut SqliteConnection,
    email: &str,
    display_name: &str,
    roles: &str,
) -> String {
    let id = Uuid::now_v7().to_string();
    let now = Utc::now().naive_utc();
    insert_into(schema::users::table)
        .values((
            schema::users::id.eq(&id),
            schema::users::email.eq(email),
            schema::users::display_name.eq(display_name),
            schema::users::password_hash.eq(hash_password("password")),
            schema::users::roles.eq(roles),
            schema::users::created_at.eq(now),
            schema::users::updated_at.eq(now),
        ))
        .execute(conn)
        .expect("failed to insert user");
    id
}

fn main() {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let pool = build_pool(&args.database_url);
    let mut conn = pool.get().expect("failed to obtain a connection");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("failed to run migrations");

    let mut rng = rand::rng();
    let now = Utc::now().naive_utc();

    insert_user(&mut conn, "admin@cypher.dev", "Admin", r#"["admin"]"#);
    let judge_id = insert_user(
        &mut conn,
        "judge@cypher.dev",
        "Head Judge",
        r#"["judge"]"#,
    );

    let mut artist_ids = Vec::new();
    for n in 0..args.artists {
        let name = format!(
            "{} {}",
            ADJECTIVES.choose(&mut rng).unwrap(),
            NOUNS.choose(&mut rng).unwrap()
        );
        let id = insert_user(
            &mut conn,
            &format!("artist{n}@cypher.dev"),
            &name,
            r#"["artist"]"#,
        );
        artist_ids.push(id);
    }

    let tournament_id = Uuid::now_v7().to_string();
    insert_into(schema::tournaments::table)
        .values((
            schema::tournaments::id.eq(&tournament_id),
            schema::tournaments::title.eq("Summer Cypher Invitational"),
            schema::tournaments::max_bracket_size.eq(128_i64),
            schema::tournaments::status.eq("active"),
            schema::tournaments::created_at.eq(now),
        ))
        .execute(&mut *conn)
        .expect("failed to insert tournament");

    insert_into(schema::tournament_judges::table)
        .values((
            schema::tournament_judges::id.eq(Uuid::now_v7().to_string()),
            schema::tournament_judges::tournament_id.eq(&tournament_id),
            schema::tournament_judges::user_id.eq(&judge_id),
        ))
        .execute(&mut *conn)
        .expect("failed to insert judge");

    let mut participant_ids = Vec::new();
    for artist_id in &artist_ids {
        let id = Uuid::now_v7().to_string();
        insert_into(schema::tournament_participants::table)
            .values((
                schema::tournament_participants::id.eq(&id),
                schema::tournament_participants::tournament_id
                    .eq(&tournament_id),
                schema::tournament_participants::user_id.eq(artist_id),
            ))
            .execute(&mut *conn)
            .expect("failed to insert participant");
        participant_ids.push(id);
    }

    let rounds = [
        ("qualifier1", 1, "pass_fail", None),
        ("qualifier1", 2, "points", None),
        ("bracket", 1, "rubric", Some(r#"["flow","delivery","lyrics"]"#)),
    ];
    let mut round_ids = Vec::new();
    for (kind, number, scoring, keys) in rounds {
        let round_id = Uuid::now_v7().to_string();
        insert_into(schema::rounds::table)
            .values((
                schema::rounds::id.eq(&round_id),
                schema::rounds::tournament_id.eq(&tournament_id),
                schema::rounds::kind.eq(kind),
                schema::rounds::number.eq(number as i64),
                schema::rounds::scoring.eq(scoring),
                schema::rounds::rubric_keys.eq(keys),
                schema::rounds::created_at.eq(now),
            ))
            .execute(&mut *conn)
            .expect("failed to insert round");
        if scoring == "rubric" {
            for key in ["flow", "delivery", "lyrics"] {
                insert_into(schema::round_rubric_criteria::table)
                    .values((
                        schema::round_rubric_criteria::id
                            .eq(Uuid::now_v7().to_string()),
                        schema::round_rubric_criteria::round_id.eq(&round_id),
                        schema::round_rubric_criteria::key.eq(key),
                        schema::round_rubric_criteria::name.eq(key),
                        schema::round_rubric_criteria::weight.eq(1.0),
                        schema::round_rubric_criteria::min_value.eq(0.0),
                        schema::round_rubric_criteria::max_value.eq(100.0),
                    ))
                    .execute(&mut *conn)
                    .expect("failed to insert criterion");
            }
        }
        round_ids.push(round_id);
    }

    for (n, participant_id) in participant_ids.iter().enumerate() {
        let status = if n % 3 == 0 { "draft" } else { "submitted" };
        insert_into(schema::submissions::table)
            .values((
                schema::submissions::id.eq(Uuid::now_v7().to_string()),
                schema::submissions::round_id.eq(&round_ids[0]),
                schema::submissions::participant_id.eq(participant_id),
                schema::submissions::lyrics
                    .eq(format!("sixteen bars, take {n}")),
                schema::submissions::status.eq(status),
                schema::submissions::submitted_at
                    .eq((status == "submitted").then_some(now)),
                schema::submissions::locked_by_admin.eq(false),
                schema::submissions::created_at.eq(now),
                schema::submissions::updated_at.eq(now),
            ))
            .execute(&mut *conn)
            .expect("failed to insert submission");
    }

    let match_id = Uuid::now_v7().to_string();
    insert_into(schema::matches::table)
        .values((
            schema::matches::id.eq(&match_id),
            schema::matches::round_id.eq(&round_ids[2]),
            schema::matches::starts_at.eq(Some(now)),
        ))
        .execute(&mut *conn)
        .expect("failed to insert match");
    for (seed, participant_id) in participant_ids.iter().take(2).enumerate() {
        insert_into(schema::match_participants::table)
            .values((
                schema::match_participants::id.eq(Uuid::now_v7().to_string()),
                schema::match_participants::match_id.eq(&match_id),
                schema::match_participants::participant_id.eq(participant_id),
                schema::match_participants::seed.eq(Some((seed + 1) as i64)),
            ))
            .execute(&mut *conn)
            .expect("failed to insert match participant");
    }

    tracing::info!(
        "seeded {} artists, 3 rounds and 1 match into {}",
        args.artists,
        args.database_url
    );
}
