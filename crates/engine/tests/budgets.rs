mod common;

use chrono::Duration;
use sea_orm::{ConnectionTrait, Statement};

use engine::{EngineError, MembershipRole, TelegramProfile};
use uuid::Uuid;

use common::{draft, engine_with_db, family_budget, t0, user};

#[tokio::test]
async fn ensure_user_is_idempotent_and_refreshes_names() {
    let (engine, _db) = engine_with_db().await;

    let first = user(&engine, 10, "anna").await;
    let again = user(&engine, 10, "anna").await;
    assert_eq!(first.id, again.id);

    let renamed = engine
        .ensure_user(
            &TelegramProfile {
                telegram_id: 10,
                username: Some("anna_new".to_string()),
                first_name: Some("Anna".to_string()),
                last_name: Some("  ".to_string()),
            },
            t0() + Duration::days(1),
        )
        .await
        .unwrap();
    assert_eq!(renamed.id, first.id);
    assert_eq!(renamed.username.as_deref(), Some("anna_new"));
    assert_eq!(renamed.last_name, None);
    assert_eq!(renamed.created_at, first.created_at);
}

#[tokio::test]
async fn create_first_budget_makes_creator_owner() {
    let (engine, db) = engine_with_db().await;
    let alice = user(&engine, 1, "alice").await;

    let budget = engine
        .create_first_budget(
            alice.id,
            &draft("  Семья ", "rub", Some("usd"), Some("eur")),
            t0(),
        )
        .await
        .unwrap();
    assert_eq!(budget.name, "Семья");
    let codes: Vec<&str> = budget.currencies().map(|c| c.code()).collect();
    assert_eq!(codes, ["RUB", "USD", "EUR"]);
    assert_eq!(budget.created_by, alice.id);

    let listed = engine.list_user_budgets(alice.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].role, MembershipRole::Owner);
    assert!(listed[0].is_default);
    assert_eq!(
        engine.active_budget_id(alice.id).await.unwrap(),
        Some(budget.id)
    );

    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT next_seq_no FROM budget_counters WHERE budget_id = ?",
            vec![budget.id.to_string().into()],
        ))
        .await
        .unwrap()
        .unwrap();
    let next: i64 = row.try_get("", "next_seq_no").unwrap();
    assert_eq!(next, 1);
}

#[tokio::test]
async fn duplicate_currencies_are_rejected_without_writing() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, 1, "alice").await;

    for (aux1, aux2) in [(Some("RUB"), None), (Some("USD"), Some("USD")), (None, Some("rub"))] {
        let err = engine
            .create_first_budget(alice.id, &draft("Family", "RUB", aux1, aux2), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailure(_)), "{aux1:?} {aux2:?}");
    }
    assert!(engine.list_user_budgets(alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn storage_rejects_duplicate_currencies() {
    let (engine, db) = engine_with_db().await;
    let alice = user(&engine, 1, "alice").await;

    let result = db
        .execute(Statement::from_sql_and_values(
            db.get_database_backend(),
            "INSERT INTO budgets (id, name, base_currency, aux_currency_1, timezone, created_by_user_id, created_at, is_archived) \
             VALUES (?, 'Raw', 'RUB', 'RUB', 'UTC', ?, '2026-03-01 12:00:00', 0)",
            vec![Uuid::new_v4().to_string().into(), alice.id.to_string().into()],
        ))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn invalid_drafts_are_rejected() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, 1, "alice").await;

    let mut blank = draft("   ", "RUB", None, None);
    assert!(matches!(
        engine.create_first_budget(alice.id, &blank, t0()).await,
        Err(EngineError::ValidationFailure(_))
    ));

    blank.name = "Family".to_string();
    blank.base_currency = "RUBL".to_string();
    assert!(matches!(
        engine.create_first_budget(alice.id, &blank, t0()).await,
        Err(EngineError::ValidationFailure(_))
    ));

    let mut tz = draft("Family", "RUB", None, None);
    tz.timezone = "Moon/Base".to_string();
    assert!(matches!(
        engine.create_first_budget(alice.id, &tz, t0()).await,
        Err(EngineError::ValidationFailure(_))
    ));
}

#[tokio::test]
async fn user_with_a_budget_cannot_create_another() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, 1, "alice").await;
    let bob = user(&engine, 2, "bob").await;
    family_budget(&engine, &alice).await;

    let err = engine
        .create_first_budget(alice.id, &draft("Second", "USD", None, None), t0())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::AlreadyHasBudget);

    let invite = engine.create_invite(alice.id, t0()).await.unwrap();
    engine.accept_invite(&invite.token, bob.id, t0()).await.unwrap();
    let err = engine
        .create_first_budget(bob.id, &draft("Bob's", "USD", None, None), t0())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::AlreadyHasBudget);
}

#[tokio::test]
async fn unknown_owner_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let err = engine
        .create_first_budget(Uuid::new_v4(), &draft("Family", "RUB", None, None), t0())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::UserNotFound);
}

#[tokio::test]
async fn archive_hides_budget_and_clears_pointers() {
    let (engine, _db) = engine_with_db().await;
    let (alice, bob, budget) = common::budget_with_participant(&engine).await;
    let pending = engine.create_invite(alice.id, t0()).await.unwrap();

    let err = engine.archive_budget(bob.id, budget.id).await.unwrap_err();
    assert_eq!(err, EngineError::NotOwner);

    engine.archive_budget(alice.id, budget.id).await.unwrap();

    assert!(engine.list_user_budgets(alice.id).await.unwrap().is_empty());
    assert!(engine.list_user_budgets(bob.id).await.unwrap().is_empty());
    assert_eq!(engine.active_budget_id(alice.id).await.unwrap(), None);
    assert_eq!(engine.active_budget_id(bob.id).await.unwrap(), None);
    assert_eq!(
        engine.budget_detail(alice.id, budget.id).await.unwrap_err(),
        EngineError::BudgetUnavailable
    );
    assert_eq!(
        engine.archive_budget(alice.id, budget.id).await.unwrap_err(),
        EngineError::BudgetUnavailable
    );
    assert_eq!(
        engine.preview_invite(&pending.token, t0()).await.unwrap_err(),
        EngineError::InviteNotFound
    );
    assert_eq!(
        engine.create_invite(alice.id, t0()).await.unwrap_err(),
        EngineError::BudgetUnavailable
    );
    assert_eq!(
        engine
            .create_invite_for_budget(alice.id, budget.id, t0())
            .await
            .unwrap_err(),
        EngineError::BudgetUnavailable
    );
    // Memberships survive archiving, but the budget can no longer be selected.
    assert_eq!(
        engine.set_active_budget(bob.id, budget.id).await.unwrap_err(),
        EngineError::BudgetUnavailable
    );
    assert_eq!(engine.active_budget_id(bob.id).await.unwrap(), None);

    // The owner may start over once the old budget is archived.
    let fresh = engine
        .create_first_budget(alice.id, &draft("Fresh", "EUR", None, None), t0())
        .await
        .unwrap();
    assert_eq!(engine.active_budget_id(alice.id).await.unwrap(), Some(fresh.id));
}

#[tokio::test]
async fn create_invite_without_pointer_uses_oldest_live_owned_budget() {
    let (engine, db) = engine_with_db().await;
    let alice = user(&engine, 1, "alice").await;
    let old = family_budget(&engine, &alice).await;
    engine.archive_budget(alice.id, old.id).await.unwrap();
    let fresh = engine
        .create_first_budget(alice.id, &draft("Fresh", "EUR", None, None), t0())
        .await
        .unwrap();

    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "UPDATE users SET active_budget_id = NULL WHERE id = ?",
        vec![alice.id.to_string().into()],
    ))
    .await
    .unwrap();

    let invite = engine.create_invite(alice.id, t0()).await.unwrap();
    assert_eq!(invite.budget_id, fresh.id);
}

#[tokio::test]
async fn budget_detail_requires_membership() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, 1, "alice").await;
    let mallory = user(&engine, 3, "mallory").await;
    let budget = family_budget(&engine, &alice).await;

    let detail = engine.budget_detail(alice.id, budget.id).await.unwrap();
    assert_eq!(detail, budget);
    assert_eq!(
        engine.budget_detail(mallory.id, budget.id).await.unwrap_err(),
        EngineError::NotMember
    );
}

#[tokio::test]
async fn user_lookup_reflects_the_active_budget() {
    let (engine, _db) = engine_with_db().await;
    let alice = user(&engine, 1, "alice").await;
    let budget = family_budget(&engine, &alice).await;

    let stored = engine.user(alice.id).await.unwrap();
    assert_eq!(stored.telegram_id, 1);
    assert_eq!(stored.handle().as_deref(), Some("@alice"));
    assert_eq!(stored.active_budget_id, Some(budget.id));

    assert_eq!(
        engine.user(Uuid::new_v4()).await.unwrap_err(),
        EngineError::UserNotFound
    );
}
