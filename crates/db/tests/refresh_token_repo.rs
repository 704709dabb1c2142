//! Postgres-backed tests for the refresh-token repository.
//!
//! These run against a real database through `PgExecutor`, so they need
//! `DATABASE_URL` and are ignored by default:
//! `cargo test -p jobtrail-db -- --ignored`.

use chrono::{Duration, Utc};
use jobtrail_core::retry::RetryPolicy;
use jobtrail_db::models::refresh_token::CreateRefreshToken;
use jobtrail_db::repositories::{IdentityRepo, RefreshTokenRepo};
use jobtrail_db::DataStore;
use sqlx::PgPool;

fn gateway(pool: PgPool) -> DataStore {
    DataStore::postgres(
        pool,
        RetryPolicy::fixed(3, std::time::Duration::from_millis(10)).unwrap(),
    )
}

async fn seed_user(pool: &PgPool, username: &str, is_admin: bool) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (username, password_hash, is_admin) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(username)
    .bind("$argon2id$placeholder")
    .bind(is_admin)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn identity_lookup_decodes_columns(pool: PgPool) {
    let id = seed_user(&pool, "admin", true).await;
    let db = gateway(pool);

    let identity = IdentityRepo::find_by_username(&db, "admin")
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(identity.id, id);
    assert!(identity.is_admin);

    assert!(IdentityRepo::find_by_username(&db, "ghost").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn conditional_rotate_succeeds_once(pool: PgPool) {
    let user_id = seed_user(&pool, "rotator", false).await;
    let db = gateway(pool);
    let now = Utc::now();

    RefreshTokenRepo::create(
        &db,
        &CreateRefreshToken {
            user_id,
            refresh_token_hash: "old-hash".into(),
            expires_at: now + Duration::days(30),
        },
    )
    .await
    .unwrap();

    let (a, b) = tokio::join!(
        RefreshTokenRepo::rotate(&db, "old-hash", "new-a", now + Duration::days(30), now),
        RefreshTokenRepo::rotate(&db, "old-hash", "new-b", now + Duration::days(30), now),
    );
    let winners = [a.unwrap(), b.unwrap()].into_iter().flatten().count();
    assert_eq!(winners, 1, "exactly one rotation may win");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn delete_without_returning_reports_affected_rows(pool: PgPool) {
    let user_id = seed_user(&pool, "leaver", false).await;
    let db = gateway(pool);

    for hash in ["h1", "h2"] {
        RefreshTokenRepo::create(
            &db,
            &CreateRefreshToken {
                user_id,
                refresh_token_hash: hash.into(),
                expires_at: Utc::now() + Duration::days(1),
            },
        )
        .await
        .unwrap();
    }

    assert!(RefreshTokenRepo::delete_by_hash(&db, "h1").await.unwrap());
    assert!(!RefreshTokenRepo::delete_by_hash(&db, "h1").await.unwrap());
    assert_eq!(RefreshTokenRepo::delete_for_user(&db, user_id).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn repeated_writes_return_the_committed_row(pool: PgPool) {
    let user_id = seed_user(&pool, "replayer", false).await;
    let db = gateway(pool);
    let now = Utc::now();
    let input = CreateRefreshToken {
        user_id,
        refresh_token_hash: "first-hash".into(),
        expires_at: now + Duration::days(30),
    };

    let created = RefreshTokenRepo::create(&db, &input).await.unwrap();
    let again = RefreshTokenRepo::create(&db, &input).await.unwrap();
    assert_eq!(again.id, created.id);

    let later = now + Duration::days(30);
    let rotated = RefreshTokenRepo::rotate(&db, "first-hash", "second-hash", later, now)
        .await
        .unwrap()
        .expect("first rotation should match");
    let replayed = RefreshTokenRepo::rotate(&db, "first-hash", "second-hash", later, now)
        .await
        .unwrap()
        .expect("replayed rotation should match its own row");
    assert_eq!(replayed.id, rotated.id);
    assert_eq!(replayed.refresh_token_hash, "second-hash");
}
