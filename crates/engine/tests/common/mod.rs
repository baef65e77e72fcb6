#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tempfile::TempDir;

use engine::{Budget, BudgetDraft, Engine, TelegramProfile, User};
use migration::MigratorTrait;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// Engine on a SQLite file with a real connection pool, so transactions can
/// interleave. The directory must outlive the engine.
pub async fn engine_with_file_db(max_connections: u32) -> (Engine, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("kazna.db").display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(max_connections);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    (engine, dir)
}

/// Fixed clock so expiry arithmetic is deterministic.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub async fn user(engine: &Engine, telegram_id: i64, username: &str) -> User {
    engine
        .ensure_user(
            &TelegramProfile {
                telegram_id,
                username: Some(username.to_string()),
                first_name: Some(username.to_uppercase()),
                last_name: None,
            },
            t0(),
        )
        .await
        .unwrap()
}

pub fn draft(name: &str, base: &str, aux1: Option<&str>, aux2: Option<&str>) -> BudgetDraft {
    BudgetDraft {
        name: name.to_string(),
        base_currency: base.to_string(),
        aux_currency_1: aux1.map(ToString::to_string),
        aux_currency_2: aux2.map(ToString::to_string),
        timezone: "Europe/Moscow".to_string(),
    }
}

pub async fn family_budget(engine: &Engine, owner: &User) -> Budget {
    engine
        .create_first_budget(owner.id, &draft("Family", "RUB", Some("USD"), None), t0())
        .await
        .unwrap()
}

/// Owner with a budget and one participant who joined through an invite.
pub async fn budget_with_participant(engine: &Engine) -> (User, User, Budget) {
    let owner = user(engine, 1, "alice").await;
    let participant = user(engine, 2, "bob").await;
    let budget = family_budget(engine, &owner).await;
    let invite = engine.create_invite(owner.id, t0()).await.unwrap();
    engine
        .accept_invite(&invite.token, participant.id, t0())
        .await
        .unwrap();
    (owner, participant, budget)
}
