diesel::table! {
    users (id) {
        id -> Text,
        email -> Text,
        display_name -> Text,
        password_hash -> Text,
        roles -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    artist_profiles (user_id) {
        user_id -> Text,
        avatar_key -> Nullable<Text>,
        bio -> Nullable<Text>,
        socials -> Text,
    }
}

diesel::table! {
    media_assets (id) {
        id -> Text,
        kind -> Text,
        storage_key -> Text,
        mime -> Text,
        size_bytes -> BigInt,
        duration_sec -> Nullable<Double>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    tournaments (id) {
        id -> Text,
        title -> Text,
        max_bracket_size -> BigInt,
        status -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    tournament_participants (id) {
        id -> Text,
        tournament_id -> Text,
        user_id -> Text,
    }
}

diesel::table! {
    tournament_judges (id) {
        id -> Text,
        tournament_id -> Text,
        user_id -> Text,
    }
}

diesel::table! {
    rounds (id) {
        id -> Text,
        tournament_id -> Text,
        kind -> Text,
        number -> BigInt,
        scoring -> Text,
        rubric_keys -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    round_rubric_criteria (id) {
        id -> Text,
        round_id -> Text,
        key -> Text,
        name -> Text,
        weight -> Double,
        min_value -> Double,
        max_value -> Double,
    }
}

diesel::table! {
    submissions (id) {
        id -> Text,
        round_id -> Text,
        participant_id -> Text,
        audio_id -> Nullable<Text>,
        lyrics -> Nullable<Text>,
        status -> Text,
        submitted_at -> Nullable<Timestamp>,
        locked_by_admin -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    matches (id) {
        id -> Text,
        round_id -> Text,
        starts_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    match_participants (id) {
        id -> Text,
        match_id -> Text,
        participant_id -> Text,
        seed -> Nullable<BigInt>,
    }
}

diesel::table! {
    match_tracks (id) {
        id -> Text,
        match_id -> Text,
        participant_id -> Text,
        audio_id -> Nullable<Text>,
        lyrics -> Nullable<Text>,
        submitted_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    evaluations (id) {
        id -> Text,
        judge_id -> Text,
        target_type -> Text,
        target_id -> Text,
        round_id -> Text,
        pass -> Nullable<Bool>,
        score -> Nullable<Double>,
        rubric -> Nullable<Text>,
        total_score -> Nullable<Double>,
        comment -> Nullable<Text>,
        created_at -> Timestamp,
    }
}
