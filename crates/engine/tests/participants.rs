mod common;

use engine::{EngineError, MembershipRole};

use common::{budget_with_participant, draft, engine_with_db, t0, user};

#[tokio::test]
async fn removal_clears_active_budget() {
    let (engine, _db) = engine_with_db().await;
    let (alice, bob, budget) = budget_with_participant(&engine).await;
    assert_eq!(engine.active_budget_id(bob.id).await.unwrap(), Some(budget.id));

    engine
        .remove_participant_from_budget(alice.id, budget.id, bob.id)
        .await
        .unwrap();

    assert_eq!(engine.active_budget_id(bob.id).await.unwrap(), None);
    assert!(engine.list_user_budgets(bob.id).await.unwrap().is_empty());
    assert_eq!(
        engine.set_active_budget(bob.id, budget.id).await.unwrap_err(),
        EngineError::NotMember
    );
    // The owner's pointer is untouched.
    assert_eq!(
        engine.active_budget_id(alice.id).await.unwrap(),
        Some(budget.id)
    );
}

#[tokio::test]
async fn second_removal_reports_missing_participant() {
    let (engine, _db) = engine_with_db().await;
    let (alice, bob, _budget) = budget_with_participant(&engine).await;

    engine.remove_participant(alice.id, bob.id).await.unwrap();
    assert_eq!(
        engine.remove_participant(alice.id, bob.id).await.unwrap_err(),
        EngineError::ParticipantNotFound
    );
}

#[tokio::test]
async fn owner_cannot_be_removed() {
    let (engine, _db) = engine_with_db().await;
    let (alice, _bob, budget) = budget_with_participant(&engine).await;

    assert_eq!(
        engine.remove_participant(alice.id, alice.id).await.unwrap_err(),
        EngineError::CannotRemoveOwner
    );
    assert_eq!(
        engine
            .remove_participant_from_budget(alice.id, budget.id, alice.id)
            .await
            .unwrap_err(),
        EngineError::CannotRemoveOwner
    );
}

#[tokio::test]
async fn participants_cannot_manage_members() {
    let (engine, _db) = engine_with_db().await;
    let (alice, bob, budget) = budget_with_participant(&engine).await;

    assert_eq!(
        engine.list_participants(bob.id).await.unwrap_err(),
        EngineError::NotOwner
    );
    assert_eq!(
        engine
            .list_participants_for_budget(bob.id, budget.id)
            .await
            .unwrap_err(),
        EngineError::NotOwner
    );
    assert_eq!(
        engine.remove_participant(bob.id, alice.id).await.unwrap_err(),
        EngineError::NotOwner
    );
}

#[tokio::test]
async fn participant_lookup_for_confirmation() {
    let (engine, _db) = engine_with_db().await;
    let (alice, bob, budget) = budget_with_participant(&engine).await;

    let found = engine.participant(alice.id, budget.id, bob.id).await.unwrap();
    assert_eq!(found.user.id, bob.id);
    assert_eq!(found.role, MembershipRole::Participant);

    engine.remove_participant(alice.id, bob.id).await.unwrap();
    assert_eq!(
        engine
            .participant(alice.id, budget.id, bob.id)
            .await
            .unwrap_err(),
        EngineError::ParticipantNotFound
    );
}

#[tokio::test]
async fn set_active_budget_requires_membership() {
    let (engine, _db) = engine_with_db().await;
    let (alice, bob, budget) = budget_with_participant(&engine).await;
    let carol = user(&engine, 3, "carol").await;
    let own = engine
        .create_first_budget(carol.id, &draft("Carol", "EUR", None, None), t0())
        .await
        .unwrap();

    assert_eq!(
        engine.set_active_budget(carol.id, budget.id).await.unwrap_err(),
        EngineError::NotMember
    );
    assert_eq!(
        engine.set_active_budget(alice.id, own.id).await.unwrap_err(),
        EngineError::NotMember
    );

    let chosen = engine.set_active_budget(bob.id, budget.id).await.unwrap();
    assert_eq!(chosen.id, budget.id);
    assert_eq!(engine.active_budget_id(bob.id).await.unwrap(), Some(budget.id));
}

#[tokio::test]
async fn home_budget_prefers_active_then_oldest() {
    let (engine, _db) = engine_with_db().await;
    let (_alice, bob, budget) = budget_with_participant(&engine).await;
    let loner = user(&engine, 9, "loner").await;

    assert_eq!(engine.home_budget(loner.id).await.unwrap(), None);

    let home = engine.home_budget(bob.id).await.unwrap().unwrap();
    assert_eq!(home.id, budget.id);
    assert!(home.is_default);
    assert_eq!(home.role, MembershipRole::Participant);
}

#[tokio::test]
async fn member_of_two_budgets_lists_both_in_creation_order() {
    let (engine, _db) = engine_with_db().await;
    let (_alice, bob, family) = budget_with_participant(&engine).await;
    let dan = user(&engine, 4, "dan").await;
    let trip = engine
        .create_first_budget(
            dan.id,
            &draft("Trip", "GEL", None, None),
            t0() + chrono::Duration::hours(1),
        )
        .await
        .unwrap();
    let invite = engine.create_invite(dan.id, t0()).await.unwrap();
    engine.accept_invite(&invite.token, bob.id, t0()).await.unwrap();

    let listed = engine.list_user_budgets(bob.id).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|b| b.id).collect();
    assert_eq!(ids, [family.id, trip.id]);
    // Joining a second budget keeps the existing pointer.
    assert!(listed[0].is_default);
    assert!(!listed[1].is_default);

    engine.set_active_budget(bob.id, trip.id).await.unwrap();
    let home = engine.home_budget(bob.id).await.unwrap().unwrap();
    assert_eq!(home.id, trip.id);
}
